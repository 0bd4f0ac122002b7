//! Tile collision: sensor casting against the loaded tile config set,
//! and the floor/wall/ceiling collision-mode state machine that turns a
//! sensor hit into the entity's ground angle and orientation.

pub mod collision;
pub mod hitbox;
pub mod sensor;
pub mod tileconfig;

pub use collision::{
    check_tile_collision, check_tile_grip, cos_turn, process_entity_movement, sin_turn, collision_at, collision_in_line,
    ground_sub_step, CollisionBox, CollisionMode, CollisionTuning, PathSensor, SensorHit, TileCollisionSide, TileLayerSource,
    TileSide, TILE_SIZE,
};
pub use hitbox::{check_entity_box, check_entity_circle, check_entity_platform, check_entity_touch, ViewableHitbox};
pub use sensor::{landing_mode, next_grounded_mode};
pub use tileconfig::{
    detect_format, load_hcol, load_rsdk, save_rsdk, TileCollisionFormat, TileConfig, TileConfigSet,
    TileConfigVariants, COLUMNS, NO_CONTACT,
};
