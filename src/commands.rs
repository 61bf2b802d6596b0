use crate::persistence::FogStore;
use crate::prelude::*;
use crate::render::reveal_entire_map;

/// 运行时切换迷雾总开关。关闭时网格进入旁路模式（一切按可见处理），
/// 底层状态数组保持不变，重新开启后立即恢复原样。
/// Toggle fog at runtime. While disabled the grid runs in bypass mode
/// (everything reads as visible); the underlying state arrays are untouched
/// and come back intact on re-enable.
#[derive(Event, Debug, Clone, Copy)]
pub struct SetFogEnabled(pub bool);

/// 重置范围 / Reset scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetScope {
    /// 仅当前地图 / The current map only
    #[default]
    CurrentMap,
    /// 所有已持久化的地图 / Every persisted map
    AllMaps,
}

/// 把迷雾清回全未见状态并丢弃对应的持久化快照
/// Clear fog back to fully unseen and drop the matching persisted snapshots
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ResetFog {
    pub scope: ResetScope,
}

/// 以径向波浪把整张地图照亮（调试/剧情用）
/// Reveal the whole map with a radial wave (debug / scripted moments)
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct RevealEntireMap;

pub(crate) fn handle_set_fog_enabled(
    mut events: EventReader<SetFogEnabled>,
    mut settings: ResMut<FogMapSettings>,
    mut grid: ResMut<FogGrid>,
    active: Res<ActiveFogMap>,
) {
    for SetFogEnabled(enabled) in events.read() {
        if settings.enabled == *enabled {
            continue;
        }
        settings.enabled = *enabled;
        // 地图级禁用优先于全局开关 / Per-map disable wins over the global switch
        grid.bypass = active.descriptor.fog_disabled || !*enabled;
        grid.mark_all_dirty();
        info!("fog of war {}", if *enabled { "enabled" } else { "disabled" });
    }
}

pub(crate) fn handle_reset_fog(
    mut events: EventReader<ResetFog>,
    mut grid: ResMut<FogGrid>,
    mut store: ResMut<FogStore>,
    active: Res<ActiveFogMap>,
) {
    for event in events.read() {
        grid.reset();
        match event.scope {
            ResetScope::CurrentMap => {
                store.maps.remove(&active.descriptor.id);
            }
            ResetScope::AllMaps => store.maps.clear(),
        }
        info!("fog reset ({:?})", event.scope);
    }
}

pub(crate) fn handle_reveal_entire_map(
    mut events: EventReader<RevealEntireMap>,
    mut grid: ResMut<FogGrid>,
) {
    if events.is_empty() {
        return;
    }
    events.clear();
    reveal_entire_map(&mut grid);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_scope_defaults_to_current_map() {
        assert_eq!(ResetFog::default().scope, ResetScope::CurrentMap);
    }
}
