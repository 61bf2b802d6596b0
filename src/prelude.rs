pub use crate::{
    FogSystems, TileFogPlugin,
    commands::{ResetFog, ResetScope, RevealEntireMap, SetFogEnabled},
    grid::{
        ChunkCoord, DEFAULT_CHUNK_SIZE, FadePhase, FogGrid, FogTile, TileVisibility,
    },
    map::{ActiveFogMap, EnterMap, MapDescriptor, TerrainFlags},
    persistence::{
        FogLoaded, FogSaved, FogStore, LoadFogRequest, PersistedFogMap, PersistenceError,
        SaveFogRequest, SerializationFormat, load_store_from_file, save_store_to_file,
    },
    render::{
        ChunkOverlayIndex, FogCameraOffset, FogChunkOverlay, reveal_circular_area,
        reveal_entire_map,
    },
    settings::{
        DEFAULT_EXPLORED_COLOR, DEFAULT_GRAYSCALE_TINT, DEFAULT_UNSEEN_COLOR, FogMapSettings,
        parse_fog_color,
    },
    vision::{Facing, VisionRecomputeState, VisionRecomputed, VisionSource, compute_visibility},
    visibility::{
        EntityDisplayState, FogExempt, FogTracked, Hostile, VisionBlocker, next_display_state,
    },
};
pub(crate) use bevy::platform::collections::{HashMap, HashSet};
pub(crate) use bevy::prelude::*;
