use crate::grid::{FadePhase, FogTile};
use crate::prelude::*;
use bevy::asset::RenderAssetUsages;
use bevy::image::ImageSampler;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::sprite::Anchor;

/// 迷雾覆盖层的 Z 高度，置于地形与实体之上
/// Z height of fog overlays, above terrain and entities
const FOG_OVERLAY_Z: f32 = 900.0;

/// 单个区块的覆盖层实体：一张按地块逐像素填充的缓存位图
/// Overlay entity for one chunk: a cached bitmap filled one texel per tile
#[derive(Component, Clone, Debug)]
pub struct FogChunkOverlay {
    pub coord: ChunkCoord,
    pub image: Handle<Image>,
}

/// 区块坐标到覆盖层实体的索引
/// Index from chunk coordinates to overlay entities
#[derive(Resource, Debug, Clone, Default)]
pub struct ChunkOverlayIndex {
    pub map: HashMap<ChunkCoord, Entity>,
    grid_size: UVec2,
    chunk_size: u32,
}

/// 相机滚动偏移，由宿主每帧写入；仅用于摆放覆盖层
/// Camera scroll offset, written by the host each frame; used only to
/// position overlays
#[derive(Resource, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Resource)]
pub struct FogCameraOffset(pub Vec2);

/// 单地块的覆盖层合成规则（纯函数）
/// Overlay composition rule for one tile (pure)
pub fn overlay_texel(
    tile: FogTile,
    unseen: Srgba,
    explored: Srgba,
    fade_out_duration: u16,
    reveal_duration: u16,
) -> [u8; 4] {
    match (tile.state, tile.phase) {
        // 从未见过：完整雾色 / Never seen: full fog color
        (TileVisibility::Unseen, _) => srgba_bytes(unseen, unseen.alpha),
        // 稳定已探索：基础透明度 / Stable previously seen: base alpha
        (TileVisibility::PreviouslySeen, FadePhase::Stable) => {
            srgba_bytes(explored, explored.alpha)
        }
        // 正在淡出：从透明缓动到基础透明度
        // Fading out: eases from transparent to the base alpha
        (TileVisibility::PreviouslySeen, FadePhase::FadingOut(t)) => {
            let ratio = 1.0 - t as f32 / fade_out_duration.max(1) as f32;
            srgba_bytes(explored, explored.alpha * ratio)
        }
        // 正在淡入：从基础透明度缓动到全透明
        // Fading in: eases from the base alpha down to fully clear
        (TileVisibility::Visible, FadePhase::FadingIn(t)) => {
            let ratio = t as f32 / reveal_duration.max(1) as f32;
            srgba_bytes(explored, explored.alpha * ratio)
        }
        // 稳定可见：不画覆盖层 / Stable visible: no overlay drawn
        _ => [0, 0, 0, 0],
    }
}

fn srgba_bytes(color: Srgba, alpha: f32) -> [u8; 4] {
    [
        (color.red.clamp(0.0, 1.0) * 255.0) as u8,
        (color.green.clamp(0.0, 1.0) * 255.0) as u8,
        (color.blue.clamp(0.0, 1.0) * 255.0) as u8,
        (alpha.clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

/// 以平方距离测试批量照亮圆形区域，按离圆心的距离分配淡入计时器，
/// 形成进场时的径向波浪效果。
/// Bulk-reveal a circular area with a squared-distance test, assigning each
/// tile a reveal timer proportional to its distance from the center for the
/// radial entry wave.
pub fn reveal_circular_area(grid: &mut FogGrid, center: Vec2, radius: f32) {
    if radius <= 0.0 || grid.is_empty() {
        return;
    }
    let reveal = grid.reveal_duration();
    let r2 = radius * radius;
    let min = (center - radius).floor().as_ivec2();
    let max = (center + radius).ceil().as_ivec2();
    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let tile_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let d2 = tile_center.distance_squared(center);
            if d2 > r2 {
                continue;
            }
            let dist = d2.sqrt();
            let ticks =
                (reveal as i32 - (dist / radius * reveal as f32).round() as i32).max(1) as u16;
            grid.reveal_timed(x, y, ticks);
        }
    }
}

/// 照亮整张地图，计时器按与地图中心的距离分布
/// Reveal the entire map with timers spread by distance from the map center
pub fn reveal_entire_map(grid: &mut FogGrid) {
    if grid.is_empty() {
        return;
    }
    let center = Vec2::new(grid.width() as f32, grid.height() as f32) * 0.5;
    let radius = center.length() + 1.0;
    reveal_circular_area(grid, center, radius);
    grid.mark_all_dirty();
}

/// 网格替换后重建覆盖层实体：丢弃所有缓存位图并重新分配
/// Rebuild overlay entities after a grid swap: all cached bitmaps are
/// discarded and re-allocated
pub(crate) fn sync_chunk_overlays(
    mut commands: Commands,
    mut grid: ResMut<FogGrid>,
    settings: Res<FogMapSettings>,
    mut index: ResMut<ChunkOverlayIndex>,
    mut images: ResMut<Assets<Image>>,
) {
    let grid_size = UVec2::new(grid.width(), grid.height());
    if index.grid_size == grid_size && index.chunk_size == grid.chunk_size() {
        return;
    }

    for (_, entity) in index.map.drain() {
        commands.entity(entity).despawn();
    }
    index.grid_size = grid_size;
    index.chunk_size = grid.chunk_size();
    if grid.is_empty() {
        return;
    }

    let cs = grid.chunk_size();
    let chunk_px = Vec2::new(cs as f32, cs as f32) * settings.tile_pixel_size;
    for cy in 0..grid.chunks_y() {
        for cx in 0..grid.chunks_x() {
            let coord = ChunkCoord::new(cx as i32, cy as i32);
            let mut image = Image::new_fill(
                Extent3d {
                    width: cs,
                    height: cs,
                    depth_or_array_layers: 1,
                },
                TextureDimension::D2,
                &[0, 0, 0, 0],
                TextureFormat::Rgba8UnormSrgb,
                RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
            );
            // 一地块一像素，靠最近邻放大保持硬边
            // One texel per tile, nearest-neighbor upscale keeps edges crisp
            image.sampler = ImageSampler::nearest();
            let handle = images.add(image);

            let entity = commands
                .spawn((
                    Sprite {
                        image: handle.clone(),
                        custom_size: Some(chunk_px),
                        anchor: Anchor::BottomLeft,
                        ..default()
                    },
                    Transform::from_translation(
                        (coord.as_vec2() * chunk_px).extend(FOG_OVERLAY_Z),
                    ),
                    FogChunkOverlay {
                        coord,
                        image: handle,
                    },
                    Name::new(format!("FogChunk ({cx}, {cy})")),
                ))
                .id();
            index.map.insert(coord, entity);
        }
    }
    grid.mark_all_dirty();
    debug!(
        "spawned {} fog chunk overlays for {}x{} grid",
        index.map.len(),
        grid_size.x,
        grid_size.y
    );
}

/// 按地块像素尺寸与相机滚动偏移摆放覆盖层
/// Position overlays from the tile pixel size and camera scroll offset
pub(crate) fn position_chunk_overlays(
    grid: Res<FogGrid>,
    settings: Res<FogMapSettings>,
    offset: Res<FogCameraOffset>,
    mut overlays: Query<(&FogChunkOverlay, &mut Transform)>,
) {
    let chunk_px = Vec2::splat(grid.chunk_size() as f32) * settings.tile_pixel_size;
    for (overlay, mut transform) in overlays.iter_mut() {
        let world = overlay.coord.as_vec2() * chunk_px - offset.0;
        transform.translation = world.extend(FOG_OVERLAY_Z);
    }
}

/// 只重绘脏区块的覆盖层位图，完成后清脏标记
/// Redraw only the dirty chunks' overlay bitmaps, clearing the dirty flags
/// on completion
pub(crate) fn flush_dirty_chunks(
    mut grid: ResMut<FogGrid>,
    settings: Res<FogMapSettings>,
    index: Res<ChunkOverlayIndex>,
    overlays: Query<&FogChunkOverlay>,
    mut images: ResMut<Assets<Image>>,
) {
    if grid.is_empty() {
        return;
    }
    let dirty = grid.take_dirty_chunks();
    if dirty.is_empty() {
        return;
    }

    let unseen = settings.fog_color_unseen.to_srgba();
    let explored = settings.fog_color_explored.to_srgba();
    let fade_out = grid.fade_out_duration();
    let reveal = grid.reveal_duration();
    let cs = grid.chunk_size();

    for coord in dirty {
        let Some(&entity) = index.map.get(&coord) else {
            continue;
        };
        let Ok(overlay) = overlays.get(entity) else {
            continue;
        };
        let Some(image) = images.get_mut(&overlay.image) else {
            continue;
        };

        let mut texels = vec![[0u8; 4]; (cs * cs) as usize];
        for ty in 0..cs {
            for tx in 0..cs {
                let gx = coord.x as u32 * cs + tx;
                let gy = coord.y as u32 * cs + ty;
                if gx >= grid.width() || gy >= grid.height() {
                    continue; // 边缘区块的越界部分保持透明 / partial edge chunks stay clear
                }
                let texel = overlay_texel(grid.tile_at(gx, gy), unseen, explored, fade_out, reveal);
                // 纹理行自上而下，网格 y 轴向上
                // Texture rows run top-down, grid y runs up
                texels[((cs - 1 - ty) * cs + tx) as usize] = texel;
            }
        }
        image.data = Some(bytemuck::cast_slice(&texels).to_vec());
    }
}

/// 配置变化后的整体刷新：全部区块标脏，下一次 flush 重绘一切
/// Full refresh after a configuration change: every chunk is marked dirty
/// and the next flush redraws everything
pub(crate) fn refresh_on_settings_change(
    settings: Res<FogMapSettings>,
    mut grid: ResMut<FogGrid>,
) {
    if settings.is_changed() && !settings.is_added() && !grid.is_empty() {
        grid.mark_all_dirty();
    }
}
