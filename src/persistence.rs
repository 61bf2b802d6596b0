use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap as StdHashMap;
use std::path::Path;

#[cfg(not(any(feature = "format-json", feature = "format-bincode")))]
compile_error!("enable at least one of the `format-json` / `format-bincode` features");

/// 序列化格式
/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationFormat {
    /// JSON格式 - 人类可读但体积较大
    /// JSON format - human readable but larger
    #[cfg(feature = "format-json")]
    Json,
    /// Bincode格式 - Rust原生二进制格式
    /// Bincode format - Rust native binary format
    #[cfg(feature = "format-bincode")]
    Bincode,
}

#[allow(clippy::derivable_impls)]
impl Default for SerializationFormat {
    fn default() -> Self {
        // 优先使用高效的二进制格式
        // Prefer the efficient binary format
        #[cfg(feature = "format-bincode")]
        return SerializationFormat::Bincode;

        #[cfg(all(not(feature = "format-bincode"), feature = "format-json"))]
        SerializationFormat::Json
    }
}

impl SerializationFormat {
    pub fn extension(self) -> &'static str {
        match self {
            #[cfg(feature = "format-json")]
            SerializationFormat::Json => "json",
            #[cfg(feature = "format-bincode")]
            SerializationFormat::Bincode => "bincode",
        }
    }

    /// 从文件扩展名推断格式 / Infer the format from a file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            #[cfg(feature = "format-json")]
            "json" => Some(SerializationFormat::Json),
            #[cfg(feature = "format-bincode")]
            "bincode" | "bin" => Some(SerializationFormat::Bincode),
            _ => None,
        }
    }
}

/// 雾效持久化错误
/// Fog of war persistence error
#[derive(Debug, Clone)]
pub enum PersistenceError {
    /// 序列化失败 / Serialization failed
    SerializationFailed(String),
    /// 反序列化失败 / Deserialization failed
    DeserializationFailed(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::SerializationFailed(msg) => {
                write!(f, "Serialization failed: {msg}")
            }
            PersistenceError::DeserializationFailed(msg) => {
                write!(f, "Deserialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

/// 单张地图的持久化迷雾快照：状态数组 + 带符号计时器数组
/// Persisted fog snapshot for one map: the states array plus the signed
/// timers array
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersistedFogMap {
    pub width: u32,
    pub height: u32,
    pub states: Vec<u8>,
    pub timers: Vec<i16>,
}

impl PersistedFogMap {
    /// 同步深拷贝当前网格 / Synchronous deep copy of the current grid
    pub fn capture(grid: &FogGrid) -> Self {
        let (states, timers) = grid.encode();
        Self {
            width: grid.width(),
            height: grid.height(),
            states,
            timers,
        }
    }

    /// 仅含状态数组的旧版格式，计时器按零填充
    /// Legacy states-only format, timers zero-filled
    pub fn from_legacy(states: Vec<u8>) -> Self {
        let timers = vec![0; states.len()];
        Self {
            width: 0,
            height: 0,
            states,
            timers,
        }
    }

    /// 恢复进网格。尺寸不匹配时重置为全新网格并返回 false，绝不报错。
    /// 旧版快照（无尺寸信息）只按数组长度校验。
    /// Restore into a grid. On dimension mismatch the grid is reset and false
    /// is returned; never errors. Legacy snapshots (no dimensions) are
    /// validated by array length only.
    pub fn restore_into(&self, grid: &mut FogGrid) -> bool {
        if self.width != 0
            && (self.width != grid.width() || self.height != grid.height())
        {
            warn!(
                "persisted fog is {}x{} but the map is {}x{}, resetting",
                self.width,
                self.height,
                grid.width(),
                grid.height()
            );
            grid.reset();
            return false;
        }
        grid.apply_encoded(&self.states, &self.timers)
    }
}

/// 持久化存储：地图 id → 迷雾快照。独立于活动网格拥有其数据。
/// Persistence store: map id → fog snapshot. Owns its data independently of
/// the active grid.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, Default)]
pub struct FogStore {
    pub maps: StdHashMap<String, PersistedFogMap>,
}

/// 请求把持久化存储序列化成一段字节
/// Request serializing the persistence store to bytes
#[derive(Event, Debug, Clone, Default)]
pub struct SaveFogRequest {
    /// 序列化格式（None使用默认格式）
    /// Serialization format (None uses the default)
    pub format: Option<SerializationFormat>,
}

/// 请求从一段字节恢复持久化存储
/// Request restoring the persistence store from bytes
#[derive(Event, Debug, Clone)]
pub struct LoadFogRequest {
    /// 要加载的序列化数据 / Serialized data to load
    pub data: Vec<u8>,
    /// 数据格式（None会尝试自动检测）
    /// Data format (None will try auto-detection)
    pub format: Option<SerializationFormat>,
}

/// 雾效数据保存完成事件
/// Event emitted when fog of war data is saved
#[derive(Event, Debug, Clone)]
pub struct FogSaved {
    pub data: Vec<u8>,
    pub format: SerializationFormat,
    pub map_count: usize,
}

/// 雾效数据加载完成事件
/// Event emitted when fog of war data is loaded
#[derive(Event, Debug, Clone)]
pub struct FogLoaded {
    pub map_count: usize,
    /// 加载过程中的任何警告 / Any warnings during loading
    pub warnings: Vec<String>,
}

pub fn encode_store(
    store: &FogStore,
    format: SerializationFormat,
) -> Result<Vec<u8>, PersistenceError> {
    match format {
        #[cfg(feature = "format-json")]
        SerializationFormat::Json => serde_json::to_vec(store)
            .map_err(|e| PersistenceError::SerializationFailed(e.to_string())),
        #[cfg(feature = "format-bincode")]
        SerializationFormat::Bincode => {
            bincode::serde::encode_to_vec(store, bincode::config::standard())
                .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
        }
    }
}

pub fn decode_store(
    data: &[u8],
    format: Option<SerializationFormat>,
) -> Result<FogStore, PersistenceError> {
    let format = format.unwrap_or_else(|| detect_format(data));
    match format {
        #[cfg(feature = "format-json")]
        SerializationFormat::Json => decode_store_json(data),
        #[cfg(feature = "format-bincode")]
        SerializationFormat::Bincode => {
            bincode::serde::decode_from_slice::<FogStore, _>(data, bincode::config::standard())
                .map(|(store, _)| store)
                .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))
        }
    }
}

fn detect_format(data: &[u8]) -> SerializationFormat {
    // JSON 以 '{' 或 '[' 开头；其余按二进制处理
    // JSON starts with '{' or '['; anything else is treated as binary
    #[cfg(feature = "format-json")]
    if data.starts_with(b"{") || data.starts_with(b"[") {
        return SerializationFormat::Json;
    }
    let _ = data;
    SerializationFormat::default()
}

/// JSON 解码，失败后回退尝试旧版“单数组”存档
/// JSON decode, falling back to the legacy states-only archive on failure
#[cfg(feature = "format-json")]
fn decode_store_json(data: &[u8]) -> Result<FogStore, PersistenceError> {
    if let Ok(store) = serde_json::from_slice::<FogStore>(data) {
        return Ok(store);
    }
    serde_json::from_slice::<StdHashMap<String, Vec<u8>>>(data)
        .map(|legacy| FogStore {
            maps: legacy
                .into_iter()
                .map(|(id, states)| (id, PersistedFogMap::from_legacy(states)))
                .collect(),
        })
        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))
}

/// 便利函数：把持久化存储写入文件
/// Utility: write the persistence store to a file
pub fn save_store_to_file(
    store: &FogStore,
    path: impl AsRef<Path>,
    format: Option<SerializationFormat>,
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let format = format
        .or_else(|| SerializationFormat::from_extension(path))
        .unwrap_or_default();
    let data = encode_store(store, format)?;
    std::fs::write(path, data).map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
}

/// 便利函数：从文件读取持久化存储
/// Utility: read the persistence store from a file
pub fn load_store_from_file(
    path: impl AsRef<Path>,
    format: Option<SerializationFormat>,
) -> Result<FogStore, PersistenceError> {
    let path = path.as_ref();
    let format = format.or_else(|| SerializationFormat::from_extension(path));
    let data = std::fs::read(path)
        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
    decode_store(&data, format)
}

/// 每次完整重算结束后快照一次活动地图，而不是每帧快照，
/// 限制 I/O 与分配抖动。
/// Snapshot the active map once per completed recompute rather than per
/// frame, limiting I/O and allocation churn.
pub(crate) fn snapshot_after_recompute(
    mut recomputed: EventReader<VisionRecomputed>,
    grid: Res<FogGrid>,
    active: Res<ActiveFogMap>,
    mut store: ResMut<FogStore>,
) {
    if recomputed.is_empty() {
        return;
    }
    recomputed.clear();
    if grid.is_empty() || active.descriptor.id.is_empty() {
        return;
    }
    store
        .maps
        .insert(active.descriptor.id.clone(), PersistedFogMap::capture(&grid));
}

/// 系统：处理保存请求
/// System: handle save requests
pub(crate) fn save_fog_store(
    mut requests: EventReader<SaveFogRequest>,
    store: Res<FogStore>,
    mut saved: EventWriter<FogSaved>,
) {
    for request in requests.read() {
        let format = request.format.unwrap_or_default();
        match encode_store(&store, format) {
            Ok(data) => {
                info!(
                    "fog store saved using {:?}: {} maps, {} bytes",
                    format,
                    store.maps.len(),
                    data.len()
                );
                saved.write(FogSaved {
                    data,
                    format,
                    map_count: store.maps.len(),
                });
            }
            Err(e) => error!("failed to serialize fog store: {e}"),
        }
    }
}

/// 系统：处理加载请求。替换整个存储；若含活动地图且尺寸匹配则立即恢复网格。
/// System: handle load requests. Replaces the whole store; the active map is
/// restored into the grid immediately when dimensions match.
pub(crate) fn load_fog_store(
    mut requests: EventReader<LoadFogRequest>,
    mut store: ResMut<FogStore>,
    mut grid: ResMut<FogGrid>,
    active: Res<ActiveFogMap>,
    mut loaded: EventWriter<FogLoaded>,
) {
    for request in requests.read() {
        match decode_store(&request.data, request.format) {
            Ok(next) => {
                let mut warnings = Vec::new();
                *store = next;
                if !grid.is_empty() && !active.descriptor.id.is_empty() {
                    match store.maps.get(&active.descriptor.id) {
                        Some(snapshot) => {
                            if !snapshot.restore_into(&mut grid) {
                                warnings.push(format!(
                                    "snapshot for map {:?} did not match, grid reset",
                                    active.descriptor.id
                                ));
                            }
                        }
                        None => warnings.push(format!(
                            "no snapshot for active map {:?}",
                            active.descriptor.id
                        )),
                    }
                }
                info!("fog store loaded: {} maps", store.maps.len());
                loaded.write(FogLoaded {
                    map_count: store.maps.len(),
                    warnings,
                });
            }
            Err(e) => error!("failed to deserialize fog store: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> FogStore {
        let mut grid = FogGrid::new(6, 4, false, false, 4, 10, 10);
        grid.set(1, 1, TileVisibility::Visible);
        grid.set(2, 2, TileVisibility::Visible);
        grid.set(2, 2, TileVisibility::PreviouslySeen);
        let mut store = FogStore::default();
        store.maps.insert("overworld".into(), PersistedFogMap::capture(&grid));
        store
    }

    #[test]
    fn capture_restore_round_trip() {
        let mut grid = FogGrid::new(6, 4, false, false, 4, 10, 10);
        grid.set(3, 2, TileVisibility::Visible);
        grid.tick();
        let snapshot = PersistedFogMap::capture(&grid);

        let mut restored = FogGrid::new(6, 4, false, false, 4, 10, 10);
        assert!(snapshot.restore_into(&mut restored));
        assert_eq!(PersistedFogMap::capture(&restored), snapshot);
    }

    #[test]
    fn restore_resets_on_dimension_mismatch() {
        let grid = FogGrid::new(6, 4, false, false, 4, 10, 10);
        let snapshot = PersistedFogMap::capture(&grid);

        let mut other = FogGrid::new(8, 8, false, false, 4, 10, 10);
        other.set(1, 1, TileVisibility::Visible);
        assert!(!snapshot.restore_into(&mut other));
        assert_eq!(other.get(1, 1), TileVisibility::Unseen);
    }

    #[cfg(feature = "format-bincode")]
    #[test]
    fn bincode_store_round_trip() {
        let store = sample_store();
        let data = encode_store(&store, SerializationFormat::Bincode).unwrap();
        let decoded = decode_store(&data, None).unwrap();
        assert_eq!(decoded.maps["overworld"], store.maps["overworld"]);
    }

    #[cfg(feature = "format-json")]
    #[test]
    fn json_store_round_trip_and_detection() {
        let store = sample_store();
        let data = encode_store(&store, SerializationFormat::Json).unwrap();
        // 无格式提示时按前导字节自动检测
        // Auto-detected from the leading byte when no format hint is given
        let decoded = decode_store(&data, None).unwrap();
        assert_eq!(decoded.maps["overworld"], store.maps["overworld"]);
    }

    #[cfg(feature = "format-json")]
    #[test]
    fn legacy_single_array_format_is_accepted() {
        let legacy = br#"{"cavern": [0, 1, 2, 0]}"#;
        let decoded = decode_store(legacy, Some(SerializationFormat::Json)).unwrap();
        let map = &decoded.maps["cavern"];
        assert_eq!(map.states, vec![0, 1, 2, 0]);
        assert_eq!(map.timers, vec![0, 0, 0, 0]);

        // 长度匹配的旧版快照可直接恢复 / A legacy snapshot with a matching
        // length restores directly
        let mut grid = FogGrid::new(2, 2, false, false, 2, 10, 10);
        assert!(map.restore_into(&mut grid));
        assert_eq!(grid.get(0, 1), TileVisibility::Visible);
    }

    #[test]
    fn extension_inference() {
        #[cfg(feature = "format-json")]
        assert_eq!(
            SerializationFormat::from_extension(Path::new("save.json")),
            Some(SerializationFormat::Json)
        );
        #[cfg(feature = "format-bincode")]
        assert_eq!(
            SerializationFormat::from_extension(Path::new("save.bincode")),
            Some(SerializationFormat::Bincode)
        );
        assert_eq!(SerializationFormat::from_extension(Path::new("save.xyz")), None);
    }
}
