use crate::prelude::*;

/// 阻挡视线的实体标记，由宿主游戏附加。
/// 缺失时按“不阻挡”处理（fail open：射线照常穿过）。
/// Marker for entities that block line of sight, attached by the host game.
/// Absence means "not blocking" (fail open: rays pass through).
#[derive(Component, Default, Clone, Debug, Reflect)]
#[reflect(Component)]
pub struct VisionBlocker;

/// 敌对实体标记。缺失时按“非敌对”处理（fail closed：不会被隐藏规则淡出）。
/// Marker for hostile entities. Absence means "not hostile" (fail closed:
/// the entity is never faded out by the hide rule).
#[derive(Component, Default, Clone, Debug, Reflect)]
#[reflect(Component)]
pub struct Hostile;

/// 豁免标记：无论分类如何都不受“离开视野即隐藏”规则影响。
/// 缺失时按“不豁免”处理（fail closed）。
/// Exemption marker: never subject to the hide-when-out-of-vision rule
/// regardless of classification. Absence means "not exempt" (fail closed).
#[derive(Component, Default, Clone, Debug, Reflect)]
#[reflect(Component)]
pub struct FogExempt;

/// 实体的显示状态机
/// Display state machine per tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Default)]
pub enum EntityDisplayState {
    /// 完全可见 / Fully visible
    #[default]
    Visible,
    /// 不透明但去饱和渲染 / Fully opaque but rendered desaturated
    GrayscaleHidden,
    /// 淡出中，剩余 tick 数 / Fading out, remaining ticks
    FadingOut(u16),
    /// 完全隐藏 / Fully hidden
    FullyHidden,
}

impl EntityDisplayState {
    /// 当前不透明度（0.0 - 1.0）
    /// Current opacity in 0.0 - 1.0
    pub fn opacity(self, fade_duration: u16) -> f32 {
        match self {
            EntityDisplayState::Visible | EntityDisplayState::GrayscaleHidden => 1.0,
            EntityDisplayState::FadingOut(t) => t as f32 / fade_duration.max(1) as f32,
            EntityDisplayState::FullyHidden => 0.0,
        }
    }
}

/// 被迷雾系统跟踪/重新着色的实体
/// An entity tracked and restyled by the fog system
#[derive(Component, Clone, Debug, Default, Reflect)]
#[reflect(Component)]
pub struct FogTracked {
    /// 实体所在地块 / Tile the entity occupies
    pub tile: IVec2,
    pub display: EntityDisplayState,
}

/// 单步推进显示状态机（纯函数，系统与测试共用）
/// Advance the display state machine one tick (pure, shared by the system
/// and tests)
pub fn next_display_state(
    current: EntityDisplayState,
    visible: bool,
    hostile: bool,
    exempt: bool,
    bordering: bool,
    fade_duration: u16,
) -> EntityDisplayState {
    if visible {
        // 进入视野：取消任何淡出，恢复完全可见
        // In vision: cancel any fade in progress, restore full visibility
        return EntityDisplayState::Visible;
    }
    if hostile && !exempt && !bordering {
        return match current {
            EntityDisplayState::FadingOut(t) if t > 1 => EntityDisplayState::FadingOut(t - 1),
            EntityDisplayState::FadingOut(_) | EntityDisplayState::FullyHidden => {
                EntityDisplayState::FullyHidden
            }
            _ => EntityDisplayState::FadingOut(fade_duration),
        };
    }
    EntityDisplayState::GrayscaleHidden
}

/// 逐帧的实体可见性处理：查询网格、边界覆盖与地图覆盖，
/// 推进状态机并把结果映射到精灵颜色。
/// Per-frame entity visibility pass: query the grid, border override and map
/// override, advance the state machine and map the result onto sprite color.
pub(crate) fn update_entity_visibility(
    grid: Res<FogGrid>,
    map: Res<ActiveFogMap>,
    settings: Res<FogMapSettings>,
    sources: Query<&VisionSource>,
    mut tracked: Query<(&mut FogTracked, Has<Hostile>, Has<FogExempt>, Option<&mut Sprite>)>,
) {
    if grid.is_empty() {
        return;
    }
    let observer_tiles: Vec<IVec2> = sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.tile())
        .collect();

    for (mut entity, hostile, exempt, sprite) in tracked.iter_mut() {
        let bordering = observer_tiles.iter().any(|o| {
            let d = (*o - entity.tile).abs();
            d.x <= 1 && d.y <= 1
        });
        // 紧邻观察者的实体强制可见，与视距无关（边界覆盖）
        // Entities bordering the observer are forced visible regardless of
        // range (border override)
        let visible = grid.is_position_visible(entity.tile)
            || bordering
            || map.descriptor.always_visible;

        let next = next_display_state(
            entity.display,
            visible,
            hostile,
            exempt,
            bordering,
            settings.entity_fade_duration,
        );
        if next != entity.display {
            entity.display = next;
        }

        if let Some(mut sprite) = sprite {
            sprite.color = match entity.display {
                EntityDisplayState::Visible => Color::WHITE,
                EntityDisplayState::GrayscaleHidden => settings.grayscale_tint,
                state @ EntityDisplayState::FadingOut(_) => {
                    Color::WHITE.with_alpha(state.opacity(settings.entity_fade_duration))
                }
                EntityDisplayState::FullyHidden => Color::NONE,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostile_out_of_vision_fades_then_hides() {
        // 敌对实体离开视野：不透明度单调下降，计时器走完后完全隐藏
        // A hostile leaving vision fades monotonically and is fully hidden
        // once its timer runs out
        let fade = 4;
        let mut state = EntityDisplayState::Visible;
        let mut last_opacity = state.opacity(fade);

        for _ in 0..(fade + 1) {
            state = next_display_state(state, false, true, false, false, fade);
            let opacity = state.opacity(fade);
            assert!(opacity <= last_opacity, "opacity must decrease monotonically");
            last_opacity = opacity;
        }
        assert_eq!(state, EntityDisplayState::FullyHidden);
        assert_eq!(state.opacity(fade), 0.0);
    }

    #[test]
    fn vision_cancels_fade() {
        let state = next_display_state(EntityDisplayState::FadingOut(2), true, true, false, false, 10);
        assert_eq!(state, EntityDisplayState::Visible);
        assert_eq!(state.opacity(10), 1.0);
    }

    #[test]
    fn non_hostile_goes_grayscale() {
        let state = next_display_state(EntityDisplayState::Visible, false, false, false, false, 10);
        assert_eq!(state, EntityDisplayState::GrayscaleHidden);
        assert_eq!(state.opacity(10), 1.0);
    }

    #[test]
    fn exempt_hostile_goes_grayscale() {
        let state = next_display_state(EntityDisplayState::Visible, false, true, true, false, 10);
        assert_eq!(state, EntityDisplayState::GrayscaleHidden);
    }

    #[test]
    fn bordering_hostile_is_not_faded() {
        let state = next_display_state(EntityDisplayState::Visible, false, true, false, true, 10);
        assert_eq!(state, EntityDisplayState::GrayscaleHidden);
    }
}
