//! Re-exports the tile collision wire format from `hatchling_bytecode`
//! under the name the physics code actually reaches for.

pub use hatchling_bytecode::tilecfg::{
    detect_format, load_hcol, load_rsdk, save_rsdk, TileCollisionFormat, TileConfig, TileConfigSet,
    TileConfigVariants, COLUMNS, NO_CONTACT,
};
