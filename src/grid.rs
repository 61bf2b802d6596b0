use crate::prelude::*;

/// 区块坐标类型，用于标识区块的二维坐标
/// Chunk coordinate type, used to identify the 2D coordinates of a chunk
pub type ChunkCoord = IVec2;

/// 默认区块大小，单位为地块数量
/// Default chunk size in tiles
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// 单个地块的可见性状态
/// Visibility state of a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Default)]
pub enum TileVisibility {
    /// 未探索 - 完全不可见
    /// Unseen - never revealed
    #[default]
    Unseen,
    /// 已探索 - 曾经可见，现在仅显示静态内容
    /// Previously seen - revealed before, not currently in vision
    PreviouslySeen,
    /// 可见 - 当前正被观察者照亮
    /// Visible - currently revealed by the observer
    Visible,
}

impl TileVisibility {
    pub fn to_u8(self) -> u8 {
        match self {
            TileVisibility::Unseen => 0,
            TileVisibility::PreviouslySeen => 1,
            TileVisibility::Visible => 2,
        }
    }

    /// 无效字节退化为 Unseen，而不是报错
    /// Invalid bytes degrade to Unseen instead of erroring
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TileVisibility::PreviouslySeen,
            2 => TileVisibility::Visible,
            _ => TileVisibility::Unseen,
        }
    }
}

/// 地块过渡动画阶段。带标签的编码替代了正负号复用的计时器：
/// 正数=淡出，负数=淡入的编码只在持久化边界出现。
/// Fade phase of a tile. The tagged encoding replaces the sign-overloaded
/// timer; the signed form (positive = fading out, negative = fading in)
/// only appears at the persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Default)]
pub enum FadePhase {
    /// 无过渡 / No transition in progress
    #[default]
    Stable,
    /// 正在淡入（刚被照亮），剩余 tick 数
    /// Fading in after a reveal, remaining ticks
    FadingIn(u16),
    /// 正在淡出（刚离开视野），剩余 tick 数
    /// Fading out after leaving vision, remaining ticks
    FadingOut(u16),
}

impl FadePhase {
    /// 编码为带符号计时器（持久化格式）
    /// Encode as the signed timer used by the persisted format
    pub fn to_signed(self) -> i16 {
        match self {
            FadePhase::Stable => 0,
            FadePhase::FadingIn(t) => -(t as i16),
            FadePhase::FadingOut(t) => t as i16,
        }
    }

    /// 从带符号计时器解码。符号与状态不匹配时回退为 Stable，
    /// 保证不变量：正计时器只属于 PreviouslySeen，负计时器只属于 Visible。
    /// Decode from a signed timer. A sign that does not match the state falls
    /// back to Stable, keeping the invariant: positive timers belong to
    /// PreviouslySeen only, negative timers to Visible only.
    pub fn from_signed(timer: i16, state: TileVisibility) -> Self {
        match (timer, state) {
            (t, TileVisibility::PreviouslySeen) if t > 0 => FadePhase::FadingOut(t as u16),
            (t, TileVisibility::Visible) if t < 0 => FadePhase::FadingIn(t.unsigned_abs()),
            _ => FadePhase::Stable,
        }
    }

    /// 零 tick 的过渡直接落为 Stable；活动计时器永不为 0
    /// A zero-tick transition collapses straight to Stable; a live timer is
    /// never 0
    pub fn fading_in(ticks: u16) -> Self {
        if ticks == 0 {
            FadePhase::Stable
        } else {
            FadePhase::FadingIn(ticks)
        }
    }

    pub fn fading_out(ticks: u16) -> Self {
        if ticks == 0 {
            FadePhase::Stable
        } else {
            FadePhase::FadingOut(ticks)
        }
    }
}

/// 单个地块：可见性状态 + 过渡阶段
/// A single tile: visibility state plus fade phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub struct FogTile {
    pub state: TileVisibility,
    pub phase: FadePhase,
}

/// 当前地图的战争迷雾网格。由活动地图上下文独占拥有，
/// 尺寸在其生命周期内固定；地图切换时整体替换。
/// Fog of war grid for the current map. Owned exclusively by the active map
/// context, with fixed dimensions for its lifetime; swapped wholesale on map
/// switch.
#[derive(Resource, Debug, Clone, Default)]
pub struct FogGrid {
    width: u32,
    height: u32,
    wrap_x: bool,
    wrap_y: bool,
    chunk_size: u32,
    chunks_x: u32,
    chunks_y: u32,
    tiles: Vec<FogTile>,
    /// 脏区块标记，以扁平整数区块索引记录
    /// Dirty chunk flags, indexed by flat integer chunk id
    dirty: Vec<bool>,
    /// 全局或本地图禁用迷雾时为真；get 无条件返回 Visible
    /// True when fog is disabled globally or per-map; get returns Visible
    /// unconditionally
    pub bypass: bool,
    fade_out_duration: u16,
    reveal_duration: u16,
    /// 重算开始时被降级地块的旧相位，用于取消仍在视野内地块的淡出
    /// Prior phases of tiles demoted at recompute start, used to cancel the
    /// fade-out of tiles that turn out to still be in vision
    demoted: HashMap<usize, FadePhase>,
}

impl FogGrid {
    pub fn new(
        width: u32,
        height: u32,
        wrap_x: bool,
        wrap_y: bool,
        chunk_size: u32,
        fade_out_duration: u16,
        reveal_duration: u16,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunks_x = width.div_ceil(chunk_size);
        let chunks_y = height.div_ceil(chunk_size);
        Self {
            width,
            height,
            wrap_x,
            wrap_y,
            chunk_size,
            chunks_x,
            chunks_y,
            tiles: vec![FogTile::default(); (width * height) as usize],
            dirty: vec![true; (chunks_x * chunks_y) as usize],
            bypass: false,
            fade_out_duration,
            reveal_duration,
            demoted: HashMap::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn chunks_x(&self) -> u32 {
        self.chunks_x
    }

    pub fn chunks_y(&self) -> u32 {
        self.chunks_y
    }

    /// 地图加载前的空网格 / Empty placeholder grid before the first map loads
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn fade_out_duration(&self) -> u16 {
        self.fade_out_duration
    }

    pub fn reveal_duration(&self) -> u16 {
        self.reveal_duration
    }

    /// 应用地图循环回绕后返回网格内坐标；回绕后仍越界则为 None
    /// Apply map-loop wrapping and return in-grid coordinates; None when the
    /// coordinate is still out of bounds after wrapping
    pub fn wrap_tile(&self, tile: IVec2) -> Option<UVec2> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x = if self.wrap_x {
            tile.x.rem_euclid(self.width as i32)
        } else {
            tile.x
        };
        let y = if self.wrap_y {
            tile.y.rem_euclid(self.height as i32)
        } else {
            tile.y
        };
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            None
        } else {
            Some(UVec2::new(x as u32, y as u32))
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// 地块所属区块的坐标 / Chunk coordinate owning the given tile
    pub fn chunk_of(&self, x: u32, y: u32) -> ChunkCoord {
        ChunkCoord::new((x / self.chunk_size) as i32, (y / self.chunk_size) as i32)
    }

    fn chunk_index(&self, coord: ChunkCoord) -> usize {
        (coord.y as u32 * self.chunks_x + coord.x as u32) as usize
    }

    /// 读取地块可见性。回绕后越界返回 Unseen；旁路模式下无条件返回 Visible。
    /// Read tile visibility. Out of bounds after wrapping returns Unseen;
    /// bypass mode returns Visible unconditionally.
    pub fn get(&self, x: i32, y: i32) -> TileVisibility {
        if self.bypass {
            return TileVisibility::Visible;
        }
        match self.wrap_tile(IVec2::new(x, y)) {
            Some(p) => self.tiles[self.index(p.x, p.y)].state,
            None => TileVisibility::Unseen,
        }
    }

    /// 读取地块过渡阶段（测试与渲染用）
    /// Read the fade phase of a tile (for rendering and tests)
    pub fn phase_at(&self, x: i32, y: i32) -> FadePhase {
        match self.wrap_tile(IVec2::new(x, y)) {
            Some(p) => self.tiles[self.index(p.x, p.y)].phase,
            None => FadePhase::Stable,
        }
    }

    pub fn tile_at(&self, x: u32, y: u32) -> FogTile {
        self.tiles[self.index(x, y)]
    }

    pub fn is_position_visible(&self, pos: IVec2) -> bool {
        self.get(pos.x, pos.y) == TileVisibility::Visible
    }

    /// 写入地块状态并应用过渡表。与当前状态相同时为空操作，
    /// 不改动计时器也不标脏。
    /// Write a tile state applying the transition table. A no-op when the
    /// state is unchanged: timers and the dirty set stay untouched.
    pub fn set(&mut self, x: i32, y: i32, new_state: TileVisibility) {
        let Some(p) = self.wrap_tile(IVec2::new(x, y)) else {
            return;
        };
        let idx = self.index(p.x, p.y);
        let tile = self.tiles[idx];
        if tile.state == new_state {
            return;
        }

        // 重算中被降级的地块重新进入视野：恢复旧相位，取消淡出
        // A tile demoted during this recompute re-enters vision: restore its
        // prior phase instead of replaying the reveal animation
        if new_state == TileVisibility::Visible {
            if let Some(prev_phase) = self.demoted.remove(&idx) {
                self.tiles[idx] = FogTile {
                    state: TileVisibility::Visible,
                    phase: prev_phase,
                };
                let chunk = self.chunk_of(p.x, p.y);
                self.mark_chunk_dirty(chunk);
                return;
            }
        }

        let phase = match (tile.state, new_state) {
            (TileVisibility::Visible, TileVisibility::PreviouslySeen) => {
                FadePhase::fading_out(self.fade_out_duration)
            }
            (TileVisibility::Unseen, TileVisibility::Visible)
            | (TileVisibility::PreviouslySeen, TileVisibility::Visible) => {
                FadePhase::fading_in(self.reveal_duration)
            }
            _ => FadePhase::Stable,
        };
        self.tiles[idx] = FogTile {
            state: new_state,
            phase,
        };
        let chunk = self.chunk_of(p.x, p.y);
        self.mark_chunk_dirty(chunk);
    }

    /// 照亮地块并指定淡入剩余 tick 数（径向波浪式照亮用）
    /// Reveal a tile with an explicit fade-in tick count (radial wave reveal)
    pub fn reveal_timed(&mut self, x: i32, y: i32, ticks: u16) {
        let Some(p) = self.wrap_tile(IVec2::new(x, y)) else {
            return;
        };
        let idx = self.index(p.x, p.y);
        self.demoted.remove(&idx);
        self.tiles[idx] = FogTile {
            state: TileVisibility::Visible,
            phase: FadePhase::fading_in(ticks),
        };
        let chunk = self.chunk_of(p.x, p.y);
        self.mark_chunk_dirty(chunk);
    }

    /// 边缘羽化：仍为 Unseen 的地块被推到 PreviouslySeen 并带半程淡出计时器，
    /// 渲染为部分透明后缓动到基础透明度，形成柔和的视野边界。
    /// Edge feathering: a tile still Unseen is nudged to PreviouslySeen with a
    /// half fade timer, rendering partially transparent and easing to the base
    /// alpha for a soft vision boundary.
    pub fn nudge_feathered(&mut self, x: i32, y: i32) {
        let Some(p) = self.wrap_tile(IVec2::new(x, y)) else {
            return;
        };
        let idx = self.index(p.x, p.y);
        if self.tiles[idx].state != TileVisibility::Unseen {
            return;
        }
        self.tiles[idx] = FogTile {
            state: TileVisibility::PreviouslySeen,
            phase: FadePhase::fading_out(self.fade_out_duration / 2),
        };
        let chunk = self.chunk_of(p.x, p.y);
        self.mark_chunk_dirty(chunk);
    }

    /// 可见性重算的开始：所有 Visible 地块降级为 PreviouslySeen 并开始淡出。
    /// 本轮重算中再次照亮的地块会取消降级（见 set）。
    /// Start of a visibility recompute: every Visible tile is demoted to
    /// PreviouslySeen and starts fading out. Tiles revealed again within the
    /// same pass cancel the demotion (see set).
    pub fn begin_recompute(&mut self) {
        self.demoted.clear();
        let fade = self.fade_out_duration;
        for idx in 0..self.tiles.len() {
            if self.tiles[idx].state == TileVisibility::Visible {
                self.demoted.insert(idx, self.tiles[idx].phase);
                self.tiles[idx] = FogTile {
                    state: TileVisibility::PreviouslySeen,
                    phase: FadePhase::fading_out(fade),
                };
                let x = idx as u32 % self.width;
                let y = idx as u32 / self.width;
                let chunk = self.chunk_of(x, y);
                self.mark_chunk_dirty(chunk);
            }
        }
    }

    /// 可见性重算的结束：清空降级记录，剩余地块保持淡出
    /// End of a recompute: drop the demotion record, remaining tiles keep
    /// fading out
    pub fn end_recompute(&mut self) {
        self.demoted.clear();
    }

    /// 推进所有过渡计时器一步，并标脏发生变化的区块。
    /// 每帧无条件运行，观察者静止时动画依然平滑。
    /// Advance all fade timers one step, marking owning chunks dirty on
    /// change. Runs every frame so animations stay smooth while the observer
    /// is stationary.
    pub fn tick(&mut self) {
        // 旁路模式下状态数组冻结 / State arrays are frozen in bypass mode
        if self.bypass {
            return;
        }
        for idx in 0..self.tiles.len() {
            let next = match self.tiles[idx].phase {
                FadePhase::Stable => continue,
                FadePhase::FadingIn(0 | 1) | FadePhase::FadingOut(0 | 1) => FadePhase::Stable,
                FadePhase::FadingIn(t) => FadePhase::FadingIn(t - 1),
                FadePhase::FadingOut(t) => FadePhase::FadingOut(t - 1),
            };
            self.tiles[idx].phase = next;
            let x = idx as u32 % self.width;
            let y = idx as u32 / self.width;
            let chunk = self.chunk_of(x, y);
            self.mark_chunk_dirty(chunk);
        }
    }

    /// 清空为全 Unseen、零计时器，并标脏所有区块
    /// Clear to all-Unseen with zero timers, marking every chunk dirty
    pub fn reset(&mut self) {
        self.tiles.fill(FogTile::default());
        self.demoted.clear();
        self.mark_all_dirty();
    }

    pub fn mark_chunk_dirty(&mut self, coord: ChunkCoord) {
        let idx = self.chunk_index(coord);
        if let Some(flag) = self.dirty.get_mut(idx) {
            *flag = true;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    pub fn is_chunk_dirty(&self, coord: ChunkCoord) -> bool {
        self.dirty
            .get(self.chunk_index(coord))
            .copied()
            .unwrap_or(false)
    }

    /// 取走并清空脏区块集合，供渲染刷新使用
    /// Drain the dirty chunk set for the render flush
    pub fn take_dirty_chunks(&mut self) -> Vec<ChunkCoord> {
        let mut out = Vec::new();
        for cy in 0..self.chunks_y {
            for cx in 0..self.chunks_x {
                let idx = (cy * self.chunks_x + cx) as usize;
                if self.dirty[idx] {
                    self.dirty[idx] = false;
                    out.push(ChunkCoord::new(cx as i32, cy as i32));
                }
            }
        }
        out
    }

    /// 编码为状态/计时器数组（持久化格式）
    /// Encode to the states/timers arrays of the persisted format
    pub fn encode(&self) -> (Vec<u8>, Vec<i16>) {
        let states = self.tiles.iter().map(|t| t.state.to_u8()).collect();
        let timers = self.tiles.iter().map(|t| t.phase.to_signed()).collect();
        (states, timers)
    }

    /// 从状态/计时器数组恢复。长度与 width*height 不符时回退为全新网格，
    /// 绝不报错。成功与否都会标脏所有区块。
    /// Restore from states/timers arrays. A length mismatch against
    /// width*height falls back to a fresh reset grid and never errors. All
    /// chunks are marked dirty either way.
    pub fn apply_encoded(&mut self, states: &[u8], timers: &[i16]) -> bool {
        let expected = (self.width * self.height) as usize;
        if states.len() != expected || timers.len() != expected {
            warn!(
                "fog snapshot size mismatch (expected {}, got {}/{}), resetting grid",
                expected,
                states.len(),
                timers.len()
            );
            self.reset();
            return false;
        }
        for (idx, (&s, &t)) in states.iter().zip(timers.iter()).enumerate() {
            let state = TileVisibility::from_u8(s);
            self.tiles[idx] = FogTile {
                state,
                phase: FadePhase::from_signed(t, state),
            };
        }
        self.demoted.clear();
        self.mark_all_dirty();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_10x10() -> FogGrid {
        FogGrid::new(10, 10, false, false, 4, 10, 10)
    }

    #[test]
    fn reveal_sets_fade_in_timer() {
        // 照亮的地块带满额淡入计时器，走完后落稳
        // A revealed tile carries the full fade-in timer and settles after it
        // runs down
        let mut grid = grid_10x10();
        grid.take_dirty_chunks();
        grid.set(5, 5, TileVisibility::Visible);
        assert_eq!(grid.get(5, 5), TileVisibility::Visible);
        assert_eq!(grid.phase_at(5, 5), FadePhase::FadingIn(10));

        for _ in 0..10 {
            grid.tick();
        }
        assert_eq!(grid.phase_at(5, 5), FadePhase::Stable);
        assert_eq!(grid.get(5, 5), TileVisibility::Visible);
    }

    #[test]
    fn set_is_idempotent() {
        let mut grid = grid_10x10();
        grid.set(3, 3, TileVisibility::Visible);
        let phase = grid.phase_at(3, 3);
        grid.take_dirty_chunks();

        grid.set(3, 3, TileVisibility::Visible);
        assert_eq!(grid.phase_at(3, 3), phase);
        assert!(grid.take_dirty_chunks().is_empty());
    }

    #[test]
    fn fade_out_on_demotion() {
        let mut grid = grid_10x10();
        grid.set(2, 2, TileVisibility::Visible);
        grid.set(2, 2, TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(2, 2), FadePhase::FadingOut(10));
    }

    #[test]
    fn wrap_correctness() {
        let mut grid = FogGrid::new(8, 8, true, false, 4, 10, 10);
        grid.set(7, 3, TileVisibility::Visible);
        assert_eq!(grid.get(-1, 3), grid.get(7, 3));
        // 垂直方向未开启回绕 / vertical wrapping stays off
        assert_eq!(grid.get(3, -1), TileVisibility::Unseen);
    }

    #[test]
    fn out_of_bounds_reads_unseen() {
        let grid = grid_10x10();
        assert_eq!(grid.get(-1, 0), TileVisibility::Unseen);
        assert_eq!(grid.get(10, 0), TileVisibility::Unseen);
    }

    #[test]
    fn bypass_returns_visible() {
        let mut grid = grid_10x10();
        grid.bypass = true;
        assert_eq!(grid.get(0, 0), TileVisibility::Visible);
        assert_eq!(grid.get(-50, 99), TileVisibility::Visible);
    }

    #[test]
    fn encode_round_trip() {
        let mut grid = grid_10x10();
        grid.set(1, 1, TileVisibility::Visible);
        grid.set(2, 2, TileVisibility::Visible);
        grid.set(2, 2, TileVisibility::PreviouslySeen);
        grid.tick();

        let (states, timers) = grid.encode();
        let mut restored = grid_10x10();
        assert!(restored.apply_encoded(&states, &timers));
        assert_eq!(restored.encode(), (states, timers));
    }

    #[test]
    fn restore_resets_on_length_mismatch() {
        let mut grid = grid_10x10();
        grid.set(4, 4, TileVisibility::Visible);
        assert!(!grid.apply_encoded(&[2u8; 7], &[0i16; 7]));
        assert_eq!(grid.get(4, 4), TileVisibility::Unseen);
    }

    #[test]
    fn sign_invariant_enforced_on_restore() {
        // 符号与状态冲突的计时器退化为 Stable
        // Timers whose sign conflicts with the state degrade to Stable
        let mut grid = FogGrid::new(2, 1, false, false, 4, 10, 10);
        let states = vec![2u8, 1u8];
        let timers = vec![5i16, -5i16]; // Visible+positive, PreviouslySeen+negative
        assert!(grid.apply_encoded(&states, &timers));
        assert_eq!(grid.phase_at(0, 0), FadePhase::Stable);
        assert_eq!(grid.phase_at(1, 0), FadePhase::Stable);
    }

    #[test]
    fn dirty_tracking_drains() {
        let mut grid = grid_10x10();
        grid.take_dirty_chunks();
        grid.set(0, 0, TileVisibility::Visible);
        grid.set(9, 9, TileVisibility::Visible);
        assert!(grid.is_chunk_dirty(ChunkCoord::new(0, 0)));
        assert!(!grid.is_chunk_dirty(ChunkCoord::new(1, 1)));
        let dirty = grid.take_dirty_chunks();
        assert!(dirty.contains(&ChunkCoord::new(0, 0)));
        assert!(dirty.contains(&ChunkCoord::new(2, 2)));
        assert_eq!(dirty.len(), 2);
        assert!(!grid.is_chunk_dirty(ChunkCoord::new(0, 0)));
        assert!(grid.take_dirty_chunks().is_empty());
    }

    #[test]
    fn recompute_demotes_and_restores() {
        let mut grid = grid_10x10();
        grid.set(5, 5, TileVisibility::Visible);
        for _ in 0..10 {
            grid.tick();
        }
        grid.begin_recompute();
        assert_eq!(grid.get(5, 5), TileVisibility::PreviouslySeen);

        // 仍在视野内：恢复 Stable 相位，不重播淡入
        // Still in vision: prior Stable phase restored, no reveal replay
        grid.set(5, 5, TileVisibility::Visible);
        grid.end_recompute();
        assert_eq!(grid.get(5, 5), TileVisibility::Visible);
        assert_eq!(grid.phase_at(5, 5), FadePhase::Stable);
    }

    #[test]
    fn zero_durations_skip_transitions() {
        // 时长为 0 时状态切换直接落稳，tick 不得下溢
        // With zero durations transitions settle immediately and tick must
        // not underflow
        let mut grid = FogGrid::new(4, 4, false, false, 4, 0, 0);
        grid.set(1, 1, TileVisibility::Visible);
        assert_eq!(grid.phase_at(1, 1), FadePhase::Stable);
        grid.set(1, 1, TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(1, 1), FadePhase::Stable);
        grid.begin_recompute();
        grid.end_recompute();
        grid.tick();
        assert_eq!(grid.get(1, 1), TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(1, 1), FadePhase::Stable);
    }

    #[test]
    fn one_tick_fade_feather_stays_stable() {
        // fade_out 为 1 时半程羽化计时器取整到 0，必须落为 Stable
        // With fade_out 1 the half feather timer rounds to 0 and must land on
        // Stable
        let mut grid = FogGrid::new(4, 4, false, false, 4, 1, 1);
        grid.nudge_feathered(2, 2);
        assert_eq!(grid.get(2, 2), TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(2, 2), FadePhase::Stable);

        grid.set(3, 3, TileVisibility::Visible);
        assert_eq!(grid.phase_at(3, 3), FadePhase::FadingIn(1));
        grid.tick();
        grid.tick();
        assert_eq!(grid.phase_at(3, 3), FadePhase::Stable);
    }

    #[test]
    fn feathering_only_touches_unseen() {
        let mut grid = grid_10x10();
        grid.set(1, 1, TileVisibility::Visible);
        grid.nudge_feathered(1, 1);
        assert_eq!(grid.get(1, 1), TileVisibility::Visible);

        grid.nudge_feathered(6, 6);
        assert_eq!(grid.get(6, 6), TileVisibility::PreviouslySeen);
        assert_eq!(grid.phase_at(6, 6), FadePhase::FadingOut(5));
    }
}
