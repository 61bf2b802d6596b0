use crate::grid::DEFAULT_CHUNK_SIZE;
use crate::prelude::*;

/// 未探索区域的默认雾颜色，也是颜色解析失败时的回退值
/// Default fog color for unseen areas, also the fallback for unparsable
/// color strings
pub const DEFAULT_UNSEEN_COLOR: Color = Color::BLACK;

/// 已探索区域的默认雾颜色；alpha 通道即覆盖层的基础透明度
/// Default fog color for previously seen areas; the alpha channel is the
/// overlay's base alpha
pub const DEFAULT_EXPLORED_COLOR: Color = Color::srgba(0.0, 0.0, 0.0, 0.55);

/// 视野外非敌对实体的去饱和色调
/// Desaturation tint for out-of-vision, non-hostile entities
pub const DEFAULT_GRAYSCALE_TINT: Color = Color::srgb(0.45, 0.45, 0.5);

/// 战争迷雾系统的全局设置
/// Global settings for the tile fog of war system
#[derive(Resource, Clone, Debug, Reflect)]
#[reflect(Resource)]
pub struct FogMapSettings {
    /// 整个迷雾系统的总开关
    /// Master switch for the entire fog system
    pub enabled: bool,

    /// 区块边长（地块数）。覆盖层按区块缓存并按脏标记重绘。
    /// Chunk side length in tiles. Overlays are cached per chunk and redrawn
    /// only when dirty.
    pub chunk_size: u32,

    /// 单个地块的像素尺寸，仅用于摆放覆盖层
    /// Pixel size of one tile, used only to position overlays
    pub tile_pixel_size: Vec2,

    /// Visible → PreviouslySeen 淡出持续 tick 数
    /// Fade-out duration in ticks for Visible → PreviouslySeen
    pub fade_out_duration: u16,

    /// 照亮时的淡入持续 tick 数
    /// Fade-in duration in ticks on reveal
    pub reveal_duration: u16,

    /// 最大视距中触发边缘羽化的末段比例
    /// Final fraction of max range that triggers edge feathering
    pub edge_feather_ratio: f32,

    /// 视距默认值（地块数），可被地图或视野源覆盖
    /// Default vision range in tiles, overridable per map or per source
    pub default_vision_range: f32,

    /// 无观察者移动时两次完整重算的最小间隔（秒）
    /// Minimum interval in seconds between full recomputes absent observer
    /// movement
    pub recompute_interval: f32,

    /// 敌对实体离开视野后的淡出持续 tick 数
    /// Fade-out duration in ticks for hostile entities leaving vision
    pub entity_fade_duration: u16,

    /// 未探索区域的雾颜色 / Fog color for unseen areas
    pub fog_color_unseen: Color,

    /// 已探索区域的雾颜色，alpha 即基础透明度
    /// Fog color for previously seen areas, alpha is the base overlay alpha
    pub fog_color_explored: Color,

    /// 视野外实体的去饱和色调 / Desaturation tint for hidden entities
    pub grayscale_tint: Color,
}

impl Default for FogMapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tile_pixel_size: Vec2::splat(16.0),
            fade_out_duration: 30,
            reveal_duration: 20,
            edge_feather_ratio: 0.15,
            default_vision_range: 12.0,
            recompute_interval: 0.5,
            entity_fade_duration: 45,
            fog_color_unseen: DEFAULT_UNSEEN_COLOR,
            fog_color_explored: DEFAULT_EXPLORED_COLOR,
            grayscale_tint: DEFAULT_GRAYSCALE_TINT,
        }
    }
}

/// 解析十六进制颜色串；解析失败时回退到给定默认值而不是报错
/// Parse a hex color string; unparsable input falls back to the given
/// default instead of erroring
pub fn parse_fog_color(value: &str, fallback: Color) -> Color {
    match Srgba::hex(value.trim().trim_start_matches('#')) {
        Ok(srgba) => srgba.into(),
        Err(_) => {
            warn!("unparsable fog color {value:?}, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_hex_color() {
        let color = parse_fog_color("#202833", Color::WHITE);
        let srgba = color.to_srgba();
        assert!((srgba.red - 0x20 as f32 / 255.0).abs() < 1e-4);
        assert!((srgba.blue - 0x33 as f32 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn parse_bad_color_falls_back() {
        assert_eq!(
            parse_fog_color("not-a-color", DEFAULT_UNSEEN_COLOR),
            DEFAULT_UNSEEN_COLOR
        );
        assert_eq!(parse_fog_color("", Color::WHITE), Color::WHITE);
    }
}
