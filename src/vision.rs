use crate::prelude::*;
use crate::visibility::{FogTracked, VisionBlocker};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// 射线自适应步进：起步小，按倍率增长到上限。
/// 近处精确、远处快速，把成本压在 O(rayCount × range) 以内。
/// Adaptive ray stepping: starts small and grows multiplicatively up to a
/// cap. Precise near the observer, fast far away, bounding the cost at
/// O(rayCount × range).
const RAY_STEP_INITIAL: f32 = 0.2;
const RAY_STEP_GROWTH: f32 = 1.2;
const RAY_STEP_MAX: f32 = 0.9;

/// 射线起点沿朝向向后偏移量，扩大有效覆盖范围
/// Backward shift of the ray origin along the facing, enlarging effective
/// coverage
const ORIGIN_BACKSHIFT: f32 = 0.5;

/// 朝向背后的照亮行程（地块数），避免转身时边缘地块闪烁
/// Reveal run behind the facing in tiles, so peripheral tiles don't pop when
/// the observer turns
const BACK_REVEAL_RUN: i32 = 2;

/// 四个基本朝向。不支持连续角度朝向。
/// The four cardinal facings. Continuous-angle facing is not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
#[reflect(Default)]
pub enum Facing {
    North,
    #[default]
    East,
    South,
    West,
}

impl Facing {
    /// 视锥中心的基准角（弧度，Y 轴向上）
    /// Base angle of the vision cone in radians, Y-up
    pub fn base_angle(self) -> f32 {
        match self {
            Facing::East => 0.0,
            Facing::North => FRAC_PI_2,
            Facing::West => PI,
            Facing::South => -FRAC_PI_2,
        }
    }

    pub fn vector(self) -> Vec2 {
        match self {
            Facing::East => Vec2::X,
            Facing::North => Vec2::Y,
            Facing::West => Vec2::NEG_X,
            Facing::South => Vec2::NEG_Y,
        }
    }

    fn tile_vector(self) -> IVec2 {
        match self {
            Facing::East => IVec2::X,
            Facing::North => IVec2::Y,
            Facing::West => IVec2::NEG_X,
            Facing::South => IVec2::NEG_Y,
        }
    }
}

/// 视野源组件：网格中的观察者
/// Vision source component: the observer on the grid
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct VisionSource {
    /// 地块空间位置，允许小数
    /// Position in tile space, fractional allowed
    pub position: Vec2,
    /// 当前朝向 / Current facing
    pub facing: Facing,
    /// 视距（地块数）；None 使用地图覆盖值或全局默认
    /// Vision range in tiles; None uses the map override or global default
    pub range: Option<f32>,
    /// 视锥半角（弧度）/ Cone half-angle in radians
    pub cone_half_angle: f32,
    /// 投射的射线数量，精度与成本的调节旋钮
    /// Number of rays cast, the accuracy vs cost knob
    pub ray_count: u32,
    /// 是否启用 / Enabled
    pub enabled: bool,
}

impl Default for VisionSource {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            facing: Facing::East,
            range: None,
            cone_half_angle: FRAC_PI_4,
            ray_count: 60,
            enabled: true,
        }
    }
}

impl VisionSource {
    /// 观察者所在地块 / Tile the observer stands on
    pub fn tile(&self) -> IVec2 {
        self.position.floor().as_ivec2()
    }
}

/// 节流状态：只有观察者地块/朝向变化或间隔到期才触发完整重算
/// Throttle state: a full recompute only triggers when the observer
/// tile/facing changed or the interval elapsed
#[derive(Resource, Debug, Default)]
pub struct VisionRecomputeState {
    last_signature: Vec<(IVec2, Facing)>,
    since_last: f32,
}

/// 一次完整可见性重算完成后发出；持久化快照挂在此事件上
/// Emitted after a full visibility recompute completes; the persistence
/// snapshot hangs off this event
#[derive(Event, Debug, Default)]
pub struct VisionRecomputed;

/// 对单个视野源执行视锥射线照亮，原地修改网格。
/// Cast the vision cone for a single source, mutating the grid in place.
pub fn compute_visibility(
    grid: &mut FogGrid,
    terrain: &TerrainFlags,
    blockers: &HashSet<IVec2>,
    source: &VisionSource,
    range: f32,
    edge_feather_ratio: f32,
) {
    let origin_tile = source.tile();

    // 1. 原点及其 8 邻域必亮，抑制斜向移动时的抖动
    // 1. Always reveal the origin and its 8 neighbors, stabilizing diagonal
    //    movement jitter
    for dy in -1..=1 {
        for dx in -1..=1 {
            grid.set(origin_tile.x + dx, origin_tile.y + dy, TileVisibility::Visible);
        }
    }

    // 2. 头顶遮挡地形的可读性补偿：正上方是阻挡地形时向上多照亮最多两格，
    //    并带上其左右邻格
    // 2. Wall reveal heuristic: blocking terrain directly above stays legible
    //    by revealing up to two tiles further, plus laterals
    if let Some(above) = grid.wrap_tile(origin_tile + IVec2::Y) {
        if terrain.is_vision_blocking(above) {
            grid.set(origin_tile.x, origin_tile.y + 1, TileVisibility::Visible);
            grid.set(origin_tile.x - 1, origin_tile.y + 1, TileVisibility::Visible);
            grid.set(origin_tile.x + 1, origin_tile.y + 1, TileVisibility::Visible);
            for dy in 2..=3 {
                match grid.wrap_tile(origin_tile + IVec2::new(0, dy)) {
                    Some(w) if terrain.is_vision_blocking(w) => {
                        grid.set(origin_tile.x, origin_tile.y + dy, TileVisibility::Visible);
                    }
                    _ => break,
                }
            }
        }
    }

    // 3. 背后短行程照亮（含侧向邻格）
    // 3. Short reveal run behind the facing, plus lateral neighbors
    let back = -source.facing.tile_vector();
    let lateral = back.perp();
    for step in 1..=BACK_REVEAL_RUN {
        let t = origin_tile + back * step;
        grid.set(t.x, t.y, TileVisibility::Visible);
        grid.set(t.x + lateral.x, t.y + lateral.y, TileVisibility::Visible);
        grid.set(t.x - lateral.x, t.y - lateral.y, TileVisibility::Visible);
    }

    // 4/5. 视锥射线步进 / Cone ray marching
    let base = source.facing.base_angle();
    let half = source.cone_half_angle;
    let ray_origin = source.position - source.facing.vector() * ORIGIN_BACKSHIFT;
    let feather_from = range * (1.0 - edge_feather_ratio.clamp(0.0, 1.0));
    let ray_count = source.ray_count.max(1);

    for i in 0..ray_count {
        let angle = if ray_count == 1 {
            base
        } else {
            base - half + (i as f32 / (ray_count - 1) as f32) * 2.0 * half
        };
        let dir = Vec2::from_angle(angle);

        let mut dist = 0.0_f32;
        let mut step = RAY_STEP_INITIAL;
        let mut last_tile: Option<IVec2> = None;
        while dist <= range {
            let tile = (ray_origin + dir * dist).floor().as_ivec2();
            if last_tile != Some(tile) {
                last_tile = Some(tile);
                let Some(wrapped) = grid.wrap_tile(tile) else {
                    // 回绕后仍在地图外：射线离开网格
                    // Still off-map after wrapping: the ray left the grid
                    break;
                };
                grid.set(tile.x, tile.y, TileVisibility::Visible);

                // 射线终止条件：阻挡地形、阻挡实体或（兜底）不可通行地块。
                // 终止地块本身仍被照亮。
                // Ray halt: blocking terrain, a blocker entity, or (fallback)
                // an impassable tile. The halting tile is still revealed.
                let blocking = terrain.is_vision_blocking(wrapped)
                    || blockers.contains(&wrapped.as_ivec2())
                    || terrain.is_impassable(wrapped);
                if blocking && tile != origin_tile {
                    feather_neighbors(grid, tile);
                    break;
                }
                // 6. 视距末段羽化 / Feather the final fraction of the range
                if dist >= feather_from {
                    feather_neighbors(grid, tile);
                }
            }
            dist += step;
            step = (step * RAY_STEP_GROWTH).min(RAY_STEP_MAX);
        }
    }
}

/// 对四个正交邻格做边缘羽化（仅影响仍为 Unseen 的地块）
/// Feather the four cardinal neighbors (only tiles still Unseen are touched)
fn feather_neighbors(grid: &mut FogGrid, tile: IVec2) {
    grid.nudge_feathered(tile.x + 1, tile.y);
    grid.nudge_feathered(tile.x - 1, tile.y);
    grid.nudge_feathered(tile.x, tile.y + 1);
    grid.nudge_feathered(tile.x, tile.y - 1);
}

/// 节流的逐帧重算系统。先把所有 Visible 降级，再对每个启用的视野源投射，
/// 仍在视野内的地块会取消降级。
/// Throttled per-frame recompute. Demotes every Visible tile, then casts for
/// each enabled source; tiles still in vision cancel the demotion.
pub(crate) fn recompute_vision(
    time: Res<Time>,
    settings: Res<FogMapSettings>,
    map: Res<ActiveFogMap>,
    mut state: ResMut<VisionRecomputeState>,
    mut grid: ResMut<FogGrid>,
    sources: Query<&VisionSource>,
    blockers: Query<&FogTracked, With<VisionBlocker>>,
    mut recomputed: EventWriter<VisionRecomputed>,
) {
    if grid.is_empty() || grid.bypass {
        return;
    }
    state.since_last += time.delta_secs();

    let signature: Vec<(IVec2, Facing)> = sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| (s.tile(), s.facing))
        .collect();
    if signature.is_empty() {
        return;
    }
    let due =
        signature != state.last_signature || state.since_last >= settings.recompute_interval;
    if !due {
        return;
    }
    state.last_signature = signature;
    state.since_last = 0.0;

    let blocker_tiles: HashSet<IVec2> = blockers
        .iter()
        .filter_map(|t| grid.wrap_tile(t.tile).map(|w| w.as_ivec2()))
        .collect();

    grid.begin_recompute();
    for source in sources.iter().filter(|s| s.enabled) {
        let range = source.range.unwrap_or_else(|| map.vision_range(&settings));
        compute_visibility(
            &mut grid,
            &map.terrain,
            &blocker_tiles,
            source,
            range,
            settings.edge_feather_ratio,
        );
    }
    grid.end_recompute();

    recomputed.write(VisionRecomputed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::FadePhase;

    fn open_grid() -> (FogGrid, TerrainFlags) {
        (
            FogGrid::new(20, 20, false, false, 8, 10, 10),
            TerrainFlags::new(20, 20),
        )
    }

    fn east_source(position: Vec2) -> VisionSource {
        VisionSource {
            position,
            facing: Facing::East,
            ray_count: 90,
            cone_half_angle: FRAC_PI_4,
            ..Default::default()
        }
    }

    #[test]
    fn origin_and_neighbors_always_revealed() {
        let (mut grid, terrain) = open_grid();
        let source = east_source(Vec2::new(10.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 6.0, 0.0);
        for dy in -1..=1 {
            for dx in -1..=1 {
                assert_eq!(grid.get(10 + dx, 10 + dy), TileVisibility::Visible);
            }
        }
    }

    #[test]
    fn unobstructed_ray_is_monotonic() {
        let (mut grid, terrain) = open_grid();
        let source = east_source(Vec2::new(2.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 10.0, 0.0);
        // 正前方一行在视距内连续可见 / The straight-ahead row is contiguously
        // visible within range
        for x in 3..=11 {
            assert_eq!(grid.get(x, 10), TileVisibility::Visible, "tile ({x}, 10)");
        }
        // 远超视距的地块保持未探索 / Tiles far past the range stay unseen
        assert_eq!(grid.get(16, 10), TileVisibility::Unseen);
    }

    #[test]
    fn blocking_terrain_halts_ray() {
        let (mut grid, mut terrain) = open_grid();
        terrain.set_vision_blocking(6, 10, true);
        let source = east_source(Vec2::new(2.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 10.0, 0.0);
        // 终止地块被照亮，其后的不再可见
        // The halting tile is revealed, nothing beyond it on the ray is
        assert_eq!(grid.get(6, 10), TileVisibility::Visible);
        assert_ne!(grid.get(8, 10), TileVisibility::Visible);
        assert_ne!(grid.get(9, 10), TileVisibility::Visible);
    }

    #[test]
    fn blocker_entity_halts_ray_and_feathers() {
        // 阻挡实体终止射线：其身后不可见，未见邻格被羽化
        // A blocker entity halts the ray: nothing behind it is revealed and
        // its unseen neighbors get feathered
        let (mut grid, terrain) = open_grid();
        let mut blockers = HashSet::default();
        blockers.insert(IVec2::new(6, 10));
        let source = east_source(Vec2::new(2.5, 10.5));
        compute_visibility(&mut grid, &terrain, &blockers, &source, 10.0, 0.0);
        assert_eq!(grid.get(6, 10), TileVisibility::Visible);
        assert_ne!(grid.get(9, 10), TileVisibility::Visible);
        // 终止地块的未见邻格被羽化 / Unseen neighbors of the halting tile get
        // feathered
        assert_eq!(grid.get(7, 10), TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(7, 10), FadePhase::FadingOut(5));
    }

    #[test]
    fn impassable_fallback_blocks() {
        let (mut grid, mut terrain) = open_grid();
        terrain.set_impassable(6, 10, true);
        let source = east_source(Vec2::new(2.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 10.0, 0.0);
        assert_ne!(grid.get(9, 10), TileVisibility::Visible);
    }

    #[test]
    fn cone_excludes_far_rear_tiles() {
        let (mut grid, terrain) = open_grid();
        let source = east_source(Vec2::new(10.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 8.0, 0.0);
        // 背后行程之外、朝向反方向的地块不可见
        // Tiles behind the observer past the back run stay unrevealed
        assert_eq!(grid.get(4, 10), TileVisibility::Unseen);
    }

    #[test]
    fn wall_above_origin_is_revealed() {
        let (mut grid, mut terrain) = open_grid();
        terrain.set_vision_blocking(10, 11, true);
        terrain.set_vision_blocking(10, 12, true);
        let source = VisionSource {
            position: Vec2::new(10.5, 10.5),
            facing: Facing::South,
            ray_count: 30,
            ..Default::default()
        };
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 6.0, 0.0);
        assert_eq!(grid.get(10, 11), TileVisibility::Visible);
        assert_eq!(grid.get(10, 12), TileVisibility::Visible);
    }

    #[test]
    fn edge_feathering_softens_range_boundary() {
        let (mut grid, terrain) = open_grid();
        let source = east_source(Vec2::new(2.5, 10.5));
        compute_visibility(&mut grid, &terrain, &HashSet::default(), &source, 8.0, 0.25);
        // 视距末端之外至少有一圈被推成 PreviouslySeen
        // At least one rim of tiles just past the range ends up PreviouslySeen
        let feathered = (0..20)
            .flat_map(|y| (0..20).map(move |x| (x, y)))
            .filter(|&(x, y)| grid.get(x, y) == TileVisibility::PreviouslySeen)
            .count();
        assert!(feathered > 0);
    }
}
