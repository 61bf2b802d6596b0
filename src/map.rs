use crate::persistence::{FogStore, PersistedFogMap};
use crate::prelude::*;
use crate::render::reveal_circular_area;

/// 地图的只读迷雾元数据，进入地图时消费一次
/// Read-only fog metadata for a map, consumed once at map entry
#[derive(Clone, Debug, Reflect)]
pub struct MapDescriptor {
    /// 持久化存储的键 / Key into the persistence store
    pub id: String,
    /// 网格尺寸（地块数）/ Grid size in tiles
    pub size: UVec2,
    /// 水平/垂直循环地图 / Horizontally / vertically looping map
    pub wrap_x: bool,
    pub wrap_y: bool,
    /// 每张地图的视距覆盖值（地块数）
    /// Per-map vision range override in tiles
    pub vision_range: Option<f32>,
    /// 本地图禁用迷雾（旁路模式）
    /// Fog disabled for this map (bypass mode)
    pub fog_disabled: bool,
    /// 本地图所有实体始终可见（只影响实体显示，不影响网格）
    /// All entities always visible on this map (affects entity display only,
    /// not the grid)
    pub always_visible: bool,
    /// 进场径向照亮半径与视距之比
    /// Entry reveal radius as a ratio of the vision range
    pub entry_reveal_ratio: f32,
}

impl Default for MapDescriptor {
    fn default() -> Self {
        Self {
            id: String::new(),
            size: UVec2::ZERO,
            wrap_x: false,
            wrap_y: false,
            vision_range: None,
            fog_disabled: false,
            always_visible: false,
            entry_reveal_ratio: 0.5,
        }
    }
}

/// 地形的视线标志位图，由宿主在进入地图时提供
/// Terrain sight flags as bitmaps, supplied by the host at map entry
#[derive(Clone, Debug, Default, Reflect)]
pub struct TerrainFlags {
    width: u32,
    height: u32,
    vision_blocking: Vec<bool>,
    impassable: Vec<bool>,
}

impl TerrainFlags {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width * height) as usize;
        Self {
            width,
            height,
            vision_blocking: vec![false; len],
            impassable: vec![false; len],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn set_vision_blocking(&mut self, x: u32, y: u32, blocking: bool) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.vision_blocking[idx] = blocking;
        }
    }

    pub fn set_impassable(&mut self, x: u32, y: u32, impassable: bool) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.impassable[idx] = impassable;
        }
    }

    /// 越界读取返回 false（不阻挡）
    /// Out-of-bounds reads return false (not blocking)
    pub fn is_vision_blocking(&self, tile: UVec2) -> bool {
        if tile.x < self.width && tile.y < self.height {
            self.vision_blocking[self.index(tile.x, tile.y)]
        } else {
            false
        }
    }

    pub fn is_impassable(&self, tile: UVec2) -> bool {
        if tile.x < self.width && tile.y < self.height {
            self.impassable[self.index(tile.x, tile.y)]
        } else {
            false
        }
    }
}

/// 当前活动地图的迷雾上下文
/// Fog context of the currently active map
#[derive(Resource, Clone, Debug, Default)]
pub struct ActiveFogMap {
    pub descriptor: MapDescriptor,
    pub terrain: TerrainFlags,
}

impl ActiveFogMap {
    /// 地图生效的视距 / Effective vision range for this map
    pub fn vision_range(&self, settings: &FogMapSettings) -> f32 {
        self.descriptor
            .vision_range
            .unwrap_or(settings.default_vision_range)
    }
}

/// 进入（或切换到）一张地图。网格被整体替换：从持久化快照恢复，
/// 或在尺寸不匹配/首次进入时重置。
/// Enter (or switch to) a map. The grid is replaced wholesale: restored from
/// the persisted snapshot, or reset on first visit / dimension mismatch.
#[derive(Event, Clone, Debug)]
pub struct EnterMap {
    pub descriptor: MapDescriptor,
    pub terrain: TerrainFlags,
}

pub(crate) fn handle_enter_map(
    mut events: EventReader<EnterMap>,
    mut grid: ResMut<FogGrid>,
    mut active: ResMut<ActiveFogMap>,
    mut store: ResMut<FogStore>,
    settings: Res<FogMapSettings>,
    sources: Query<&VisionSource>,
) {
    for event in events.read() {
        // 离开旧地图前快照一次 / Snapshot the old map before leaving it
        if !grid.is_empty() && !active.descriptor.id.is_empty() {
            store
                .maps
                .insert(active.descriptor.id.clone(), PersistedFogMap::capture(&grid));
        }

        let desc = &event.descriptor;
        let mut next = FogGrid::new(
            desc.size.x,
            desc.size.y,
            desc.wrap_x,
            desc.wrap_y,
            settings.chunk_size,
            settings.fade_out_duration,
            settings.reveal_duration,
        );
        next.bypass = desc.fog_disabled || !settings.enabled;

        let restored = match store.maps.get(&desc.id) {
            Some(saved) => saved.restore_into(&mut next),
            None => false,
        };

        if restored {
            info!("fog grid for map {:?} restored from snapshot", desc.id);
        } else {
            info!("fog grid for map {:?} starts fresh", desc.id);
            // 进场径向波浪照亮 / Radial wave reveal on first entry
            let range = desc.vision_range.unwrap_or(settings.default_vision_range);
            let radius = range * desc.entry_reveal_ratio;
            let center = sources
                .iter()
                .find(|s| s.enabled)
                .map(|s| s.position)
                .unwrap_or_else(|| desc.size.as_vec2() * 0.5);
            reveal_circular_area(&mut next, center, radius);
        }

        *grid = next;
        active.descriptor = event.descriptor.clone();
        active.terrain = event.terrain.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_flags_out_of_bounds_are_clear() {
        let mut terrain = TerrainFlags::new(4, 4);
        terrain.set_vision_blocking(2, 2, true);
        assert!(terrain.is_vision_blocking(UVec2::new(2, 2)));
        assert!(!terrain.is_vision_blocking(UVec2::new(9, 9)));
        assert!(!terrain.is_impassable(UVec2::new(9, 9)));
    }

    #[test]
    fn effective_vision_range_prefers_override() {
        let settings = FogMapSettings::default();
        let mut map = ActiveFogMap::default();
        assert_eq!(map.vision_range(&settings), settings.default_vision_range);
        map.descriptor.vision_range = Some(7.0);
        assert_eq!(map.vision_range(&settings), 7.0);
    }
}
