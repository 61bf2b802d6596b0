//! 基于区块的 2D 瓦片战争迷雾：CPU 端网格状态、锥形射线视野、
//! 按区块缓存的覆盖层渲染、实体显隐与跨地图持久化。
//! Chunk-based 2D tile fog of war: CPU-side grid state, cone-restricted ray
//! vision, per-chunk cached overlay rendering, entity visibility and
//! cross-map persistence.

use crate::prelude::*;

pub mod commands;
pub mod grid;
pub mod map;
pub mod persistence;
pub mod prelude;
pub mod render;
pub mod settings;
pub mod vision;
pub mod visibility;

/// 每帧固定的迷雾处理顺序。命令与地图切换先行，然后是（节流的）
/// 视野重算、过渡动画推进、脏区块纹理刷新，最后是实体显示与持久化。
/// The fixed per-frame fog processing order. Commands and map switches come
/// first, then the (throttled) vision recompute, transition ticking, dirty
/// chunk texture flushes, and finally entity display and persistence.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogSystems {
    Commands,
    MapLifecycle,
    Vision,
    Tick,
    Flush,
    EntityVisibility,
    Persistence,
}

/// 基于区块的 2D 瓦片战争迷雾插件
/// Chunk-based 2D tile fog of war plugin
pub struct TileFogPlugin;

impl Plugin for TileFogPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<FogMapSettings>()
            .register_type::<TileVisibility>()
            .register_type::<FadePhase>()
            .register_type::<FogTile>()
            .register_type::<Facing>()
            .register_type::<VisionSource>()
            .register_type::<VisionBlocker>()
            .register_type::<Hostile>()
            .register_type::<FogExempt>()
            .register_type::<EntityDisplayState>()
            .register_type::<FogTracked>()
            .register_type::<FogCameraOffset>()
            .init_resource::<FogMapSettings>()
            .init_resource::<FogGrid>()
            .init_resource::<ActiveFogMap>()
            .init_resource::<FogStore>()
            .init_resource::<VisionRecomputeState>()
            .init_resource::<ChunkOverlayIndex>()
            .init_resource::<FogCameraOffset>()
            .add_event::<EnterMap>()
            .add_event::<VisionRecomputed>()
            .add_event::<SetFogEnabled>()
            .add_event::<ResetFog>()
            .add_event::<RevealEntireMap>()
            .add_event::<SaveFogRequest>()
            .add_event::<LoadFogRequest>()
            .add_event::<FogSaved>()
            .add_event::<FogLoaded>()
            .configure_sets(
                Update,
                (
                    FogSystems::Commands,
                    FogSystems::MapLifecycle,
                    FogSystems::Vision,
                    FogSystems::Tick,
                    FogSystems::Flush,
                    FogSystems::EntityVisibility,
                    FogSystems::Persistence,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    commands::handle_set_fog_enabled,
                    commands::handle_reset_fog,
                    commands::handle_reveal_entire_map,
                )
                    .in_set(FogSystems::Commands),
            )
            .add_systems(
                Update,
                map::handle_enter_map.in_set(FogSystems::MapLifecycle),
            )
            .add_systems(Update, vision::recompute_vision.in_set(FogSystems::Vision))
            .add_systems(Update, tick_fog_grid.in_set(FogSystems::Tick))
            .add_systems(
                Update,
                (
                    render::refresh_on_settings_change,
                    render::sync_chunk_overlays,
                    render::flush_dirty_chunks,
                    render::position_chunk_overlays,
                )
                    .chain()
                    .in_set(FogSystems::Flush),
            )
            .add_systems(
                Update,
                visibility::update_entity_visibility.in_set(FogSystems::EntityVisibility),
            )
            .add_systems(
                Update,
                (
                    persistence::snapshot_after_recompute,
                    persistence::save_fog_store,
                    persistence::load_fog_store,
                )
                    .in_set(FogSystems::Persistence),
            );
    }
}

/// 每帧推进所有过渡计时器。旁路模式下网格不变，系统天然为空转。
/// Advance every transition timer once per frame. In bypass mode the grid is
/// untouched so this is naturally a no-op.
fn tick_fog_grid(mut grid: ResMut<FogGrid>) {
    grid.tick();
}
