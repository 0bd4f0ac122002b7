//! Tile sensor casting and the floor/wall/ceiling collision-mode state
//! machine that drives slope-following movement.

use super::sensor::{landing_mode, next_grounded_mode};
#[cfg(test)]
use super::tileconfig::TileConfig;
use super::tileconfig::{TileConfigSet, NO_CONTACT};
use crate::scene::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionMode {
    Floor,
    LeftWall,
    Ceiling,
    RightWall,
}

impl CollisionMode {
    /// Classifies a byte-scale surface angle (`0x00` = +X floor, going
    /// clockwise up to `0x100` wrapping back to `0x00`) into one of the
    /// four cardinal collision modes an entity's sensors rotate through as
    /// it walks around a loop.
    pub fn from_angle(angle: u8) -> CollisionMode {
        match angle {
            0x00..=0x1F | 0xE0..=0xFF => CollisionMode::Floor,
            0x20..=0x5F => CollisionMode::RightWall,
            0x60..=0x9F => CollisionMode::Ceiling,
            0xA0..=0xDF => CollisionMode::LeftWall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSide {
    Up,
    Down,
}

/// One sensor cast's result: the distance (in pixels) to the nearest
/// surface along the cast direction, and the surface angle found there.
/// `None` distance means the sensor found no contact within tile bounds.
#[derive(Debug, Clone, Copy)]
pub struct SensorHit {
    pub distance: Option<i32>,
    pub angle: u8,
    pub tile_id: usize,
}

pub const TILE_SIZE: i32 = 16;

/// Equivalent of `CollisionAt`: casts one sensor ray downward (or upward
/// for `TileSide::Up`) from `(x, y)` in world pixels against `tiles`,
/// using `tile_at` to map a world tile coordinate to a tile id + flip
/// state (negative / out-of-range coordinates have no tile).
pub fn collision_at(
    tiles: &TileConfigSet,
    tile_at: &impl Fn(i32, i32) -> Option<(usize, bool, bool)>,
    x: i32,
    y: i32,
    side: TileSide,
) -> SensorHit {
    let tile_x = x.div_euclid(TILE_SIZE);
    let tile_y = y.div_euclid(TILE_SIZE);
    let Some((tile_id, flip_x, flip_y)) = tile_at(tile_x, tile_y) else {
        return SensorHit { distance: None, angle: 0, tile_id: usize::MAX };
    };
    let Some(cfg) = tiles.get(tile_id, flip_x, flip_y) else {
        return SensorHit { distance: None, angle: 0, tile_id };
    };

    let column = x.rem_euclid(TILE_SIZE) as usize;
    let (height, angle) = match side {
        TileSide::Down => (cfg.collision_top[column], cfg.angle_top),
        TileSide::Up => (cfg.collision_bottom[column], cfg.angle_bottom),
    };
    if height == NO_CONTACT {
        return SensorHit { distance: None, angle, tile_id };
    }

    let local_y = y.rem_euclid(TILE_SIZE);
    let surface_y = TILE_SIZE - 1 - height as i32;
    let distance = match side {
        TileSide::Down => surface_y - local_y,
        TileSide::Up => local_y - (height as i32),
    };
    SensorHit { distance: Some(distance), angle, tile_id }
}

/// Equivalent of `CollisionInLine`: walks sensor casts along a straight
/// line of `count` world-space sample points spaced `step` pixels apart,
/// returning the closest hit (matching the original multi-sensor probe
/// used for wide hitboxes).
pub fn collision_in_line(
    tiles: &TileConfigSet,
    tile_at: &impl Fn(i32, i32) -> Option<(usize, bool, bool)>,
    origin_x: i32,
    origin_y: i32,
    step: i32,
    count: u32,
    side: TileSide,
) -> Option<SensorHit> {
    (0..count)
        .map(|i| collision_at(tiles, tile_at, origin_x + i as i32 * step, origin_y, side))
        .filter(|hit| hit.distance.is_some())
        .min_by_key(|hit| hit.distance.unwrap())
}

/// Ground sub-step length used while grip-walking a slope: 4 units on
/// the ground, 8 units while airborne (the original engine halves the
/// airborne step for small hitboxes).
pub fn ground_sub_step(airborne: bool, small_hitbox: bool) -> i32 {
    match (airborne, small_hitbox) {
        (false, _) => 4,
        (true, false) => 8,
        (true, true) => 4,
    }
}

/// Whether, and in which direction, an entity participates in tile
/// collision at all. `None` means straight Euclidean integration
/// (`ProcessEntityMovement`'s non-tile-collision branch); `Down`/`Up`
/// pick which edge of the hitbox counts as the "floor" for
/// gravity-inverted entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCollisionSide {
    None,
    Down,
    Up,
}

/// An entity's hitbox, as four edge offsets from its origin. Tile
/// collision boxes (`outer`/`inner`) are never direction-oriented;
/// entity-vs-entity hitboxes are, via [`CollisionBox::oriented`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl CollisionBox {
    /// Equivalent of `OrientHitbox`: a flipped entity mirrors its hitbox
    /// left-right around its origin.
    pub fn oriented(&self, flip_x: bool) -> CollisionBox {
        if flip_x {
            CollisionBox { left: -self.right, top: self.top, right: -self.left, bottom: self.bottom }
        } else {
            *self
        }
    }
}

/// One path-grip or airborne probe: equivalent of `CollisionSensor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSensor {
    pub x: f32,
    pub y: f32,
    pub angle: u8,
    pub collided: bool,
}

/// Equivalent of `Scene::SetCollisionVariables` plus the fixed constants
/// the source hardcodes at each call site (`CollisionOffset`,
/// minimum gap between sub-steps). Defaults are the source's own.
#[derive(Debug, Clone, Copy)]
pub struct CollisionTuning {
    pub minimum_distance: f32,
    pub low_tolerance: f32,
    pub high_tolerance: f32,
    pub floor_angle_tolerance: i32,
    pub wall_angle_tolerance: i32,
    pub roof_angle_tolerance: i32,
    /// Vertical nudge applied to the front-clearance sensor while
    /// grip-walking flush with the ground angle (`CollisionOffset`).
    pub offset: f32,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        CollisionTuning {
            minimum_distance: 14.0,
            low_tolerance: 3.5,
            high_tolerance: 14.0,
            floor_angle_tolerance: 0x20,
            wall_angle_tolerance: 0x20,
            roof_angle_tolerance: 0x20,
            offset: 4.0,
        }
    }
}

/// Abstracts over a scene's tile layers so this module never depends on
/// `crate::scene`: the scene driver implements this over its own
/// `SceneLayer` list, the same way `collision_at`'s `tile_at` closure
/// abstracts over a single layer.
pub trait TileLayerSource {
    fn layer_count(&self) -> usize;
    fn is_collideable(&self, layer: usize) -> bool;
    /// Layer size in tiles, `(width, height)`.
    fn dims(&self, layer: usize) -> (i32, i32);
    /// `(tile_id, flip_x, flip_y, coll_a, coll_b)`; `None` for an empty
    /// cell or out-of-range coordinates.
    fn tile_at(&self, layer: usize, tx: i32, ty: i32) -> Option<(u16, bool, bool, u8, u8)>;
}

fn layer_enabled(mask: u32, layer: usize) -> bool {
    layer < 32 && mask & (1u32 << layer) != 0
}

/// Byte-angle cosine/sine: `angle` runs `0x00..=0xFF` over a full turn.
pub fn cos_turn(angle: u8) -> f32 {
    (angle as f32 * (std::f32::consts::PI / 128.0)).cos()
}

pub fn sin_turn(angle: u8) -> f32 {
    (angle as f32 * (std::f32::consts::PI / 128.0)).sin()
}

/// Equivalent of `CheckTileCollision`: snaps along the axis `mode`
/// implies (floor/ceiling snap Y, wall snap X) to the nearest of up to
/// three tiles straddling `(x, y)`, within 14 pixels. Returns the
/// snapped position regardless of `set_pos` -- the caller decides
/// whether to write it back into the entity.
pub fn check_tile_collision(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: usize,
    layer_mask: u32,
    mode: CollisionMode,
    x: f32,
    y: f32,
) -> (bool, f32, f32) {
    let is_vertical = matches!(mode, CollisionMode::Floor | CollisionMode::Ceiling);
    let is_positive = matches!(mode, CollisionMode::Floor | CollisionMode::LeftWall);
    let target_bit: u8 = if matches!(mode, CollisionMode::Floor) { 1 } else { 2 };
    let step = if is_positive { TILE_SIZE } else { -TILE_SIZE };

    let mut collided = false;
    let mut pos_x = x as i32;
    let mut pos_y = y as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let mut col_x = pos_x;
        let mut col_y = pos_y;

        let main_coord = if is_vertical { col_y } else { col_x };
        let cross_coord = if is_vertical { col_x } else { col_y };
        let cross_max = (if is_vertical { width } else { height }) * TILE_SIZE;

        if cross_coord >= 0 && cross_coord < cross_max {
            let mut cur = (main_coord & -TILE_SIZE) + if is_positive { -TILE_SIZE } else { TILE_SIZE };
            let main_max = (if is_vertical { height } else { width }) * TILE_SIZE;

            for _ in 0..3 {
                if cur >= 0 && cur < main_max {
                    let tx = if is_vertical { col_x / TILE_SIZE } else { cur / TILE_SIZE };
                    let ty = if is_vertical { cur / TILE_SIZE } else { col_y / TILE_SIZE };
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        if bits & target_bit != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let cross = (cross_coord & 0xF) as usize;
                                let mask = match mode {
                                    CollisionMode::Floor => cfg.collision_top[cross],
                                    CollisionMode::Ceiling => cfg.collision_bottom[cross],
                                    CollisionMode::LeftWall => cfg.collision_left[cross],
                                    CollisionMode::RightWall => cfg.collision_right[cross],
                                };
                                if mask != NO_CONTACT {
                                    let snap = cur + mask as i32;
                                    let penetrating = if is_positive { main_coord >= snap } else { main_coord <= snap };
                                    if penetrating && (main_coord - snap).abs() <= 14 {
                                        collided = true;
                                        if is_vertical {
                                            col_y = snap;
                                        } else {
                                            col_x = snap;
                                        }
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                cur += step;
            }
        }
        pos_x = col_x;
        pos_y = col_y;
    }

    (collided, pos_x as f32, pos_y as f32)
}

/// Equivalent of `CheckTileGrip`: like [`check_tile_collision`], but only
/// commits the snap if the gap to the surface is within `tolerance` --
/// used to keep a grounded entity stuck to a slope between grip-walk
/// sub-steps. Scanning still stops at the first tile with any surface
/// on the probed column, whether or not it passes the tolerance test.
pub fn check_tile_grip(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: usize,
    layer_mask: u32,
    mode: CollisionMode,
    x: f32,
    y: f32,
    tolerance: f32,
) -> (bool, f32, f32) {
    let is_vertical = matches!(mode, CollisionMode::Floor | CollisionMode::Ceiling);
    let is_positive = matches!(mode, CollisionMode::Floor | CollisionMode::LeftWall);
    let target_bit: u8 = if matches!(mode, CollisionMode::Floor) { 1 } else { 2 };
    let step = if is_positive { TILE_SIZE } else { -TILE_SIZE };

    let mut collided = false;
    let mut pos_x = x as i32;
    let mut pos_y = y as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let mut col_x = pos_x;
        let mut col_y = pos_y;

        let main_coord = if is_vertical { col_y } else { col_x };
        let cross_coord = if is_vertical { col_x } else { col_y };
        let cross_max = (if is_vertical { width } else { height }) * TILE_SIZE;

        if cross_coord >= 0 && cross_coord < cross_max {
            let mut cur = (main_coord & -TILE_SIZE) + if is_positive { -TILE_SIZE } else { TILE_SIZE };
            let main_max = (if is_vertical { height } else { width }) * TILE_SIZE;

            for _ in 0..3 {
                if cur >= 0 && cur < main_max {
                    let tx = if is_vertical { col_x / TILE_SIZE } else { cur / TILE_SIZE };
                    let ty = if is_vertical { cur / TILE_SIZE } else { col_y / TILE_SIZE };
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        if bits & target_bit != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let cross = (cross_coord & 0xF) as usize;
                                let mask = match mode {
                                    CollisionMode::Floor => cfg.collision_top[cross],
                                    CollisionMode::Ceiling => cfg.collision_bottom[cross],
                                    CollisionMode::LeftWall => cfg.collision_left[cross],
                                    CollisionMode::RightWall => cfg.collision_right[cross],
                                };
                                if mask != NO_CONTACT {
                                    let snap = cur + mask as i32;
                                    if (main_coord - snap).abs() as f32 <= tolerance {
                                        collided = true;
                                        if is_vertical {
                                            col_y = snap;
                                        } else {
                                            col_x = snap;
                                        }
                                    }
                                    break;
                                }
                            }
                        }
                    }
                }
                cur += step;
            }
        }
        pos_x = col_x;
        pos_y = col_y;
    }

    (collided, pos_x as f32, pos_y as f32)
}

/// Equivalent of `CheckVerticalPosition`: the grip-walk's per-sub-step
/// floor/ceiling sample. Unlike [`check_vertical_collision`] it also
/// requires the found surface's angle to fall within tolerance of the
/// sensor's current angle (with 0x100 wraparound for the floor case,
/// matching the source's asymmetric roof check), and keeps scanning
/// every collideable layer rather than stopping at the first.
fn check_vertical_position(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: i32,
    layer_mask: u32,
    tuning: &CollisionTuning,
    tolerance: f32,
    sensor: &mut PathSensor,
    is_floor: bool,
) {
    if plane < 0 {
        return;
    }
    let plane = plane as usize;
    let mut start_y = sensor.y.floor() as i32;
    let mut pos_x = sensor.x.floor() as i32;
    let mut pos_y = sensor.y.floor() as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let col_x = pos_x;
        let col_y = pos_y;
        let mut cy = if is_floor { (col_y & -TILE_SIZE) - TILE_SIZE } else { (col_y & -TILE_SIZE) + TILE_SIZE };
        let step = if is_floor { TILE_SIZE } else { -TILE_SIZE };

        if col_x >= 0 && col_x < width * TILE_SIZE {
            for _ in 0..3 {
                if cy >= 0 && cy < height * TILE_SIZE {
                    let tx = col_x / TILE_SIZE;
                    let ty = cy / TILE_SIZE;
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        let target_bit: u8 = if is_floor { 1 } else { 2 };
                        if bits & target_bit != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let column = (col_x & 0xF) as usize;
                                let mask = if is_floor { cfg.collision_top[column] } else { cfg.collision_bottom[column] };
                                let tile_angle = if is_floor { cfg.angle_top } else { cfg.angle_bottom };
                                if mask != NO_CONTACT {
                                    let ty_world = cy + mask as i32;
                                    let in_range = !sensor.collided || if is_floor { start_y >= ty_world } else { start_y <= ty_world };
                                    if in_range && (col_y - ty_world).abs() as f32 <= tolerance {
                                        let diff = sensor.angle as i32 - tile_angle as i32;
                                        let angle_ok = if is_floor {
                                            diff.abs() <= tuning.floor_angle_tolerance
                                                || (diff + 0x100).abs() <= tuning.floor_angle_tolerance
                                                || (diff - 0x100).abs() <= tuning.floor_angle_tolerance
                                        } else {
                                            diff.abs() <= tuning.roof_angle_tolerance
                                        };
                                        if angle_ok {
                                            sensor.collided = true;
                                            sensor.angle = tile_angle;
                                            sensor.y = ty_world as f32;
                                            start_y = ty_world;
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                cy += step;
            }
        }
        pos_x = sensor.x.floor() as i32;
        pos_y = sensor.y.floor() as i32;
    }
}

/// Equivalent of `CheckHorizontalPosition`: the grip-walk's per-sub-step
/// wall sample, symmetric to [`check_vertical_position`] but against the
/// `WallAngleTolerance` window with no wraparound.
fn check_horizontal_position(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: i32,
    layer_mask: u32,
    tuning: &CollisionTuning,
    tolerance: f32,
    sensor: &mut PathSensor,
    is_left: bool,
) {
    if plane < 0 {
        return;
    }
    let plane = plane as usize;
    let mut start_x = sensor.x.floor() as i32;
    let mut pos_x = sensor.x.floor() as i32;
    let mut pos_y = sensor.y.floor() as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let col_x = pos_x;
        let col_y = pos_y;
        let mut cx = if is_left { (col_x & -TILE_SIZE) - TILE_SIZE } else { (col_x & -TILE_SIZE) + TILE_SIZE };
        let step = if is_left { TILE_SIZE } else { -TILE_SIZE };

        if col_y >= 0 && col_y < height * TILE_SIZE {
            for _ in 0..3 {
                if cx >= 0 && cx < width * TILE_SIZE {
                    let tx = cx / TILE_SIZE;
                    let ty = col_y / TILE_SIZE;
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        if bits != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let row = (col_y & 0xF) as usize;
                                let mask = if is_left { cfg.collision_left[row] } else { cfg.collision_right[row] };
                                let tile_angle = if is_left { cfg.angle_left } else { cfg.angle_right };
                                if mask != NO_CONTACT {
                                    let tx_world = cx + mask as i32;
                                    let in_range = !sensor.collided || if is_left { start_x >= tx_world } else { start_x <= tx_world };
                                    if in_range {
                                        let dist_ok = (col_x - tx_world).abs() as f32 <= tolerance;
                                        let diff = sensor.angle as i32 - tile_angle as i32;
                                        if dist_ok && diff.abs() <= tuning.wall_angle_tolerance {
                                            sensor.collided = true;
                                            sensor.angle = tile_angle;
                                            sensor.x = tx_world as f32;
                                            start_x = tx_world;
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                cx += step;
            }
        }
        pos_x = sensor.x.floor() as i32;
        pos_y = sensor.y.floor() as i32;
    }
}

/// Equivalent of `CheckVerticalCollision`: the airborne pass's floor/roof
/// probe -- distance-only, no angle gate, stops at the first hit within
/// `minimum_distance`.
fn check_vertical_collision(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: i32,
    layer_mask: u32,
    tuning: &CollisionTuning,
    sensor: &mut PathSensor,
    is_floor: bool,
) {
    if plane < 0 {
        return;
    }
    let plane = plane as usize;
    let mut pos_x = sensor.x.floor() as i32;
    let mut pos_y = sensor.y.floor() as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let col_x = pos_x;
        let col_y = pos_y;
        let mut cy = if is_floor { (col_y & -TILE_SIZE) - TILE_SIZE } else { (col_y & -TILE_SIZE) + TILE_SIZE };
        let step = if is_floor { TILE_SIZE } else { -TILE_SIZE };

        if col_x >= 0 && col_x < width * TILE_SIZE {
            for _ in 0..2 {
                if cy >= 0 && cy < height * TILE_SIZE {
                    let tx = col_x / TILE_SIZE;
                    let ty = cy / TILE_SIZE;
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        let target_bit: u8 = if is_floor { 1 } else { 2 };
                        if bits & target_bit != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let column = (col_x & 0xF) as usize;
                                let mask = if is_floor { cfg.collision_top[column] } else { cfg.collision_bottom[column] };
                                if mask != NO_CONTACT {
                                    let ty_world = cy + mask as i32;
                                    let in_bounds = if is_floor { col_y >= ty_world } else { col_y <= ty_world };
                                    if in_bounds && (col_y - ty_world).abs() as f32 <= tuning.minimum_distance {
                                        sensor.collided = true;
                                        sensor.angle = if is_floor { cfg.angle_top } else { cfg.angle_bottom };
                                        sensor.y = ty_world as f32;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                cy += step;
            }
        }
        pos_x = sensor.x.floor() as i32;
        pos_y = sensor.y.floor() as i32;
    }
}

/// Equivalent of `CheckHorizontalCollision`: the airborne pass's
/// left/right wall probe, symmetric to [`check_vertical_collision`].
fn check_horizontal_collision(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    plane: i32,
    layer_mask: u32,
    tuning: &CollisionTuning,
    sensor: &mut PathSensor,
    is_left: bool,
) {
    if plane < 0 {
        return;
    }
    let plane = plane as usize;
    let mut pos_x = sensor.x.floor() as i32;
    let mut pos_y = sensor.y.floor() as i32;

    for layer in 0..source.layer_count() {
        if !layer_enabled(layer_mask, layer) || !source.is_collideable(layer) {
            continue;
        }
        let (width, height) = source.dims(layer);
        let col_x = pos_x;
        let col_y = pos_y;
        let mut cx = if is_left { (col_x & -TILE_SIZE) - TILE_SIZE } else { (col_x & -TILE_SIZE) + TILE_SIZE };
        let step = if is_left { TILE_SIZE } else { -TILE_SIZE };

        if col_y >= 0 && col_y < height * TILE_SIZE {
            for _ in 0..3 {
                if cx >= 0 && cx < width * TILE_SIZE {
                    let tx = cx / TILE_SIZE;
                    let ty = col_y / TILE_SIZE;
                    if let Some((tile_id, flip_x, flip_y, coll_a, coll_b)) = source.tile_at(layer, tx, ty) {
                        let bits = if plane == 0 { coll_a } else { coll_b };
                        if bits & 2 != 0 {
                            if let Some(cfg) = tiles.get(tile_id as usize, flip_x, flip_y) {
                                let row = (col_y & 0xF) as usize;
                                let mask = if is_left { cfg.collision_left[row] } else { cfg.collision_right[row] };
                                if mask != NO_CONTACT {
                                    let tx_world = cx + mask as i32;
                                    let in_bounds = if is_left { col_x >= tx_world } else { col_x <= tx_world };
                                    if in_bounds && (col_x - tx_world).abs() as f32 <= tuning.minimum_distance {
                                        sensor.collided = true;
                                        sensor.angle = if is_left { cfg.angle_left } else { cfg.angle_right };
                                        sensor.x = tx_world as f32;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                cx += step;
            }
        }
        pos_x = sensor.x.floor() as i32;
        pos_y = sensor.y.floor() as i32;
    }
}

/// Per-movement-step state shared between `process_path_grip` and
/// `process_air_collision`, equivalent to the source's static
/// `CollisionOuter`/`CollisionInner`/`UseCollisionOffset`/
/// `CollisionTolerance` globals.
struct GripState {
    outer: CollisionBox,
    inner: CollisionBox,
    use_collision_offset: bool,
    tolerance: f32,
}

fn set_path_grip_sensors(entity: &Entity, grip: &GripState, sensors: &mut [PathSensor; 6]) {
    let offset = if grip.use_collision_offset { 4.0 } else { 0.0 };
    let ground_vel = entity.ground_vel;
    let center_x = sensors[4].x;
    let center_y = sensors[4].y;
    let left = grip.inner.left - 1.0;
    let right = grip.inner.right;

    match entity.collision_mode {
        CollisionMode::Floor => {
            sensors[0].y = center_y + grip.outer.bottom;
            sensors[1].y = sensors[0].y;
            sensors[2].y = sensors[0].y;
            sensors[0].x = center_x + left;
            sensors[1].x = center_x;
            sensors[2].x = center_x + right;
            sensors[3].y = center_y + offset;
            sensors[3].x = center_x + if ground_vel <= 0.0 { grip.outer.left - 1.0 } else { grip.outer.right };
        }
        CollisionMode::LeftWall => {
            sensors[0].x = center_x + grip.outer.bottom;
            sensors[1].x = sensors[0].x;
            sensors[2].x = sensors[0].x;
            sensors[0].y = center_y + left;
            sensors[1].y = center_y;
            sensors[2].y = center_y + right;
            sensors[3].x = center_x;
            sensors[3].y = center_y - if ground_vel <= 0.0 { grip.outer.left } else { grip.outer.right + 1.0 };
        }
        CollisionMode::Ceiling => {
            sensors[0].y = center_y - grip.outer.bottom - 1.0;
            sensors[1].y = sensors[0].y;
            sensors[2].y = sensors[0].y;
            sensors[0].x = center_x + left;
            sensors[1].x = center_x;
            sensors[2].x = center_x + right;
            sensors[3].y = center_y - offset;
            sensors[3].x = center_x - if ground_vel <= 0.0 { grip.outer.left } else { grip.outer.right + 1.0 };
        }
        CollisionMode::RightWall => {
            sensors[0].x = center_x - grip.outer.bottom - 1.0;
            sensors[1].x = sensors[0].x;
            sensors[2].x = sensors[0].x;
            sensors[0].y = center_y + left;
            sensors[1].y = center_y;
            sensors[2].y = center_y + right;
            sensors[3].x = center_x;
            sensors[3].y = center_y + if ground_vel <= 0.0 { grip.outer.left - 1.0 } else { grip.outer.right };
        }
    }
}

fn set_airborne(entity: &mut Entity, new_mode: CollisionMode) {
    entity.on_ground = false;
    entity.collision_mode = new_mode;
    entity.velocity_x = cos_turn(entity.angle) * entity.ground_vel;
    entity.velocity_y = (sin_turn(entity.angle) * entity.ground_vel).clamp(-16.0, 16.0);
    entity.ground_vel = entity.velocity_x;
    entity.angle = if matches!(new_mode, CollisionMode::Floor) { 0x00 } else { 0x80 };
}

/// Equivalent of `ProcessPathGrip`: walks the current surface in up-to
/// 4-unit sub-steps, keeping the three body sensors and one
/// front-clearance sensor in contact with the slope, switching
/// `CollisionMode` whenever the newly-found angle crosses into another
/// cardinal mode's window, and demoting to airborne once all three body
/// sensors lose contact.
fn process_path_grip(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    tuning: &CollisionTuning,
    entity: &mut Entity,
    grip: &GripState,
    sensors: &mut [PathSensor; 6],
) {
    sensors[4].x = entity.x;
    sensors[4].y = entity.y;
    for s in sensors.iter_mut() {
        s.angle = entity.angle;
        s.collided = false;
    }
    set_path_grip_sensors(entity, grip, sensors);

    let abs_speed = entity.ground_vel.abs();
    let mut check_dist: i32 = (abs_speed / 4.0) as i32;
    let remainder = abs_speed % 4.0;
    let plane = entity.collision_plane;
    let mask = entity.collision_layers;

    while check_dist > -1 {
        let step_size = if check_dist >= 1 { 4.0 } else { remainder };
        if check_dist >= 1 {
            check_dist -= 1;
        } else {
            check_dist = -1;
        }

        let mut x_vel = cos_turn(entity.angle) * step_size;
        let mut y_vel = sin_turn(entity.angle) * step_size;
        if entity.ground_vel < 0.0 {
            x_vel = -x_vel;
            y_vel = -y_vel;
        }

        sensors[0].collided = false;
        sensors[1].collided = false;
        sensors[2].collided = false;
        sensors[4].x += x_vel;
        sensors[4].y += y_vel;

        let mut tile_dist: i32 = -1;

        match entity.collision_mode {
            CollisionMode::Floor => {
                sensors[3].x += x_vel;
                sensors[3].y += y_vel;
                if entity.ground_vel > 0.0 {
                    check_horizontal_collision(tiles, source, plane, mask, tuning, &mut sensors[3], true);
                    if sensors[3].collided {
                        sensors[2].x = sensors[3].x - 2.0;
                    }
                } else if entity.ground_vel < 0.0 {
                    check_horizontal_collision(tiles, source, plane, mask, tuning, &mut sensors[3], false);
                    if sensors[3].collided {
                        sensors[0].x = sensors[3].x + 2.0;
                    }
                }
                if sensors[3].collided {
                    x_vel = 0.0;
                    check_dist = -1;
                }
                for i in 0..3 {
                    sensors[i].x += x_vel;
                    sensors[i].y += y_vel;
                    check_vertical_position(tiles, source, plane, mask, tuning, grip.tolerance, &mut sensors[i], true);
                    if sensors[i].collided
                        && (tile_dist == -1
                            || sensors[i].y < sensors[tile_dist as usize].y
                            || (sensors[i].y as i32 == sensors[tile_dist as usize].y as i32
                                && (sensors[i].angle < 0x08 || sensors[i].angle > 0xF8)))
                    {
                        tile_dist = i as i32;
                    }
                }
                if tile_dist <= -1 {
                    check_dist = -1;
                } else {
                    let td = tile_dist as usize;
                    sensors[0].y = sensors[td].y;
                    sensors[1].y = sensors[td].y;
                    sensors[2].y = sensors[td].y;
                    sensors[0].angle = sensors[td].angle;
                    sensors[1].angle = sensors[td].angle;
                    sensors[2].angle = sensors[td].angle;
                    sensors[4].x = sensors[1].x;
                    sensors[4].y = sensors[0].y - grip.outer.bottom;
                }
                entity.collision_mode = next_grounded_mode(entity.collision_mode, sensors[0].angle);
            }
            CollisionMode::LeftWall => {
                sensors[3].x += x_vel;
                sensors[3].y += y_vel;
                check_vertical_collision(tiles, source, plane, mask, tuning, &mut sensors[3], entity.ground_vel < 0.0);
                if sensors[3].collided {
                    y_vel = 0.0;
                    check_dist = -1;
                }
                for i in 0..3 {
                    sensors[i].x += x_vel;
                    sensors[i].y += y_vel;
                    check_horizontal_position(tiles, source, plane, mask, tuning, grip.tolerance, &mut sensors[i], true);
                    if sensors[i].collided && (tile_dist == -1 || sensors[i].x < sensors[tile_dist as usize].x) {
                        tile_dist = i as i32;
                    }
                }
                if tile_dist <= -1 {
                    check_dist = -1;
                } else {
                    let td = tile_dist as usize;
                    sensors[0].x = sensors[td].x;
                    sensors[1].x = sensors[td].x;
                    sensors[2].x = sensors[td].x;
                    sensors[0].angle = sensors[td].angle;
                    sensors[1].angle = sensors[td].angle;
                    sensors[2].angle = sensors[td].angle;
                    sensors[4].x = sensors[0].x - grip.outer.bottom;
                    sensors[4].y = sensors[1].y;
                }
                entity.collision_mode = next_grounded_mode(entity.collision_mode, sensors[0].angle);
            }
            CollisionMode::Ceiling => {
                sensors[3].x += x_vel;
                sensors[3].y += y_vel;
                if entity.ground_vel > 0.0 {
                    check_horizontal_collision(tiles, source, plane, mask, tuning, &mut sensors[3], false);
                    if sensors[3].collided {
                        sensors[2].x = sensors[3].x + 2.0;
                    }
                } else if entity.ground_vel < 0.0 {
                    check_horizontal_collision(tiles, source, plane, mask, tuning, &mut sensors[3], true);
                    if sensors[3].collided {
                        sensors[0].x = sensors[3].x - 2.0;
                    }
                }
                if sensors[3].collided {
                    x_vel = 0.0;
                    check_dist = -1;
                }
                for i in 0..3 {
                    sensors[i].x += x_vel;
                    sensors[i].y += y_vel;
                    check_vertical_position(tiles, source, plane, mask, tuning, grip.tolerance, &mut sensors[i], false);
                    if sensors[i].collided && (tile_dist == -1 || sensors[i].y > sensors[tile_dist as usize].y) {
                        tile_dist = i as i32;
                    }
                }
                if tile_dist <= -1 {
                    check_dist = -1;
                } else {
                    let td = tile_dist as usize;
                    sensors[0].y = sensors[td].y;
                    sensors[1].y = sensors[td].y;
                    sensors[2].y = sensors[td].y;
                    sensors[0].angle = sensors[td].angle;
                    sensors[1].angle = sensors[td].angle;
                    sensors[2].angle = sensors[td].angle;
                    sensors[4].x = sensors[1].x;
                    sensors[4].y = sensors[0].y + grip.outer.bottom + 1.0;
                }
                entity.collision_mode = next_grounded_mode(entity.collision_mode, sensors[0].angle);
            }
            CollisionMode::RightWall => {
                sensors[3].x += x_vel;
                sensors[3].y += y_vel;
                check_vertical_collision(tiles, source, plane, mask, tuning, &mut sensors[3], entity.ground_vel > 0.0);
                if sensors[3].collided {
                    y_vel = 0.0;
                    check_dist = -1;
                }
                for i in 0..3 {
                    sensors[i].x += x_vel;
                    sensors[i].y += y_vel;
                    check_horizontal_position(tiles, source, plane, mask, tuning, grip.tolerance, &mut sensors[i], false);
                    if sensors[i].collided && (tile_dist == -1 || sensors[i].x > sensors[tile_dist as usize].x) {
                        tile_dist = i as i32;
                    }
                }
                if tile_dist <= -1 {
                    check_dist = -1;
                } else {
                    let td = tile_dist as usize;
                    sensors[0].x = sensors[td].x;
                    sensors[1].x = sensors[td].x;
                    sensors[2].x = sensors[td].x;
                    sensors[0].angle = sensors[td].angle;
                    sensors[1].angle = sensors[td].angle;
                    sensors[2].angle = sensors[td].angle;
                    sensors[4].x = sensors[0].x + grip.outer.bottom + 1.0;
                    sensors[4].y = sensors[1].y;
                }
                entity.collision_mode = next_grounded_mode(entity.collision_mode, sensors[0].angle);
            }
        }

        if tile_dist != -1 {
            entity.angle = sensors[0].angle;
        }
        if !sensors[3].collided {
            set_path_grip_sensors(entity, grip, sensors);
        } else {
            check_dist = -2;
        }
    }

    let new_collision_mode = if matches!(entity.tile_collisions, TileCollisionSide::Down) {
        CollisionMode::Floor
    } else {
        CollisionMode::Ceiling
    };
    let grounded = sensors[0].collided || sensors[1].collided || sensors[2].collided;

    match entity.collision_mode {
        CollisionMode::Floor => {
            if grounded {
                entity.angle = sensors[0].angle;
                entity.y = sensors[4].y;
                if !sensors[3].collided {
                    entity.x = sensors[4].x;
                } else {
                    entity.x = sensors[3].x - if entity.ground_vel > 0.0 { grip.outer.right } else { grip.outer.left - 1.0 };
                    entity.ground_vel = 0.0;
                    entity.velocity_x = 0.0;
                }
            } else {
                set_airborne(entity, new_collision_mode);
                if !sensors[3].collided {
                    entity.x += entity.velocity_x;
                } else {
                    entity.x = sensors[3].x - if entity.ground_vel > 0.0 { grip.outer.right } else { grip.outer.left - 1.0 };
                    entity.ground_vel = 0.0;
                    entity.velocity_x = 0.0;
                }
                entity.y += entity.velocity_y;
            }
        }
        CollisionMode::LeftWall => {
            if grounded {
                entity.angle = sensors[0].angle;
            } else {
                set_airborne(entity, new_collision_mode);
            }
            if !sensors[3].collided {
                entity.x = sensors[4].x;
                entity.y = sensors[4].y;
            } else {
                entity.y = sensors[3].y + if entity.ground_vel > 0.0 { grip.outer.right + 1.0 } else { -grip.outer.left };
                entity.ground_vel = 0.0;
                entity.x = sensors[4].x;
            }
        }
        CollisionMode::Ceiling => {
            if grounded {
                entity.angle = sensors[0].angle;
                if !sensors[3].collided {
                    entity.x = sensors[4].x;
                } else {
                    entity.x = sensors[3].x + if entity.ground_vel > 0.0 { grip.outer.right } else { grip.outer.left - 1.0 };
                    entity.ground_vel = 0.0;
                }
            } else {
                set_airborne(entity, new_collision_mode);
                if !sensors[3].collided {
                    entity.x += entity.velocity_x;
                } else {
                    entity.x = sensors[3].x - if entity.ground_vel > 0.0 { grip.outer.right } else { grip.outer.left - 1.0 };
                    entity.ground_vel = 0.0;
                }
            }
            entity.y = sensors[4].y;
        }
        CollisionMode::RightWall => {
            if grounded {
                entity.angle = sensors[0].angle;
            } else {
                set_airborne(entity, new_collision_mode);
            }
            if !sensors[3].collided {
                entity.x = sensors[4].x;
                entity.y = sensors[4].y;
            } else {
                entity.y = sensors[3].y - if entity.ground_vel > 0.0 { grip.outer.right } else { grip.outer.left - 1.0 };
                entity.ground_vel = 0.0;
                entity.x = sensors[4].x;
            }
        }
    }
}

/// Equivalent of `ProcessAirCollision`: steps an airborne entity by up
/// to 8 units (2 for a small hitbox) per sub-step, running up to six
/// unidirectional sensors (two horizontal, two floor, two roof). A
/// horizontal hit zeros X-velocity; a floor hit re-grounds the entity
/// and projects horizontal speed onto the new surface angle (clamped to
/// ±24); a near-vertical ceiling hit converts to a wall grip.
fn process_air_collision(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    tuning: &CollisionTuning,
    entity: &mut Entity,
    grip: &GripState,
    sensors: &mut [PathSensor; 6],
    is_up: bool,
) {
    let mut moving_down = 0u8;
    let mut moving_up = 0u8;
    let mut moving_left = 0u8;
    let mut moving_right = 0u8;
    let offset = if grip.use_collision_offset { if is_up { -tuning.offset } else { tuning.offset } } else { 0.0 };

    if entity.velocity_x >= 0.0 {
        moving_right = 1;
        sensors[0].x = entity.x + grip.outer.right;
        sensors[0].y = entity.y + offset;
    }
    if entity.velocity_x <= 0.0 {
        moving_left = 1;
        sensors[1].x = entity.x + grip.outer.left - 1.0;
        sensors[1].y = entity.y + offset;
    }

    sensors[2].x = entity.x + grip.inner.left;
    sensors[3].x = entity.x + grip.inner.right;
    sensors[4].x = sensors[2].x;
    sensors[5].x = sensors[3].x;

    for s in sensors.iter_mut() {
        s.collided = false;
    }

    let floor_sensor1 = if is_up { 4 } else { 2 };
    let floor_sensor2 = if is_up { 5 } else { 3 };
    let roof_sensor1 = if is_up { 2 } else { 4 };
    let roof_sensor2 = if is_up { 3 } else { 5 };

    if (!is_up && entity.velocity_y >= 0.0) || (is_up && entity.velocity_y <= 0.0) {
        moving_down = 1;
        sensors[floor_sensor1].y = entity.y + if is_up { grip.outer.top - 1.0 } else { grip.outer.bottom };
        sensors[floor_sensor2].y = sensors[floor_sensor1].y;
    }
    if (!is_up && entity.velocity_y < 0.0) || (is_up && entity.velocity_y > 0.0) {
        moving_up = 1;
        sensors[roof_sensor1].y = entity.y + if is_up { grip.outer.bottom } else { grip.outer.top - 1.0 };
        sensors[roof_sensor2].y = sensors[roof_sensor1].y;
    }

    let step_size = if grip.outer.bottom >= 14.0 { 8.0 } else { 2.0 };
    let mut cnt = (entity.velocity_x.abs().max(entity.velocity_y.abs()) / step_size) as i32 + 1;

    let mut vel_x = entity.velocity_x / cnt as f32;
    let mut vel_y = entity.velocity_y / cnt as f32;
    let mut vel_x2 = entity.velocity_x - vel_x * (cnt - 1) as f32;
    let vel_y2 = entity.velocity_y - vel_y * (cnt - 1) as f32;

    while cnt > 0 {
        if cnt == 1 {
            vel_x = vel_x2;
            vel_y = vel_y2;
        }
        cnt -= 1;

        if moving_right == 1 {
            sensors[0].x += vel_x;
            sensors[0].y += vel_y;
            check_horizontal_collision(tiles, source, entity.collision_plane, entity.collision_layers, tuning, &mut sensors[0], true);
            if sensors[0].collided {
                moving_right = 2;
            }
        }
        if moving_left == 1 {
            sensors[1].x += vel_x;
            sensors[1].y += vel_y;
            check_horizontal_collision(tiles, source, entity.collision_plane, entity.collision_layers, tuning, &mut sensors[1], false);
            if sensors[1].collided {
                moving_left = 2;
            }
        }

        if moving_right == 2 || moving_left == 2 {
            entity.velocity_x = 0.0;
            entity.ground_vel = 0.0;
            entity.x = if moving_right == 2 { sensors[0].x - grip.outer.right } else { sensors[1].x - grip.outer.left + 1.0 };

            sensors[2].x = entity.x + grip.outer.left + 1.0;
            sensors[4].x = sensors[2].x;
            sensors[3].x = entity.x + grip.outer.right - 2.0;
            sensors[5].x = sensors[3].x;

            vel_x = 0.0;
            vel_x2 = 0.0;
            if moving_right == 2 {
                moving_right = 3;
            }
            if moving_left == 2 {
                moving_left = 3;
            }
        }

        if moving_down == 1 {
            for &i in &[floor_sensor1, floor_sensor2] {
                if !sensors[i].collided {
                    sensors[i].x += vel_x;
                    sensors[i].y += vel_y;
                    check_vertical_collision(tiles, source, entity.collision_plane, entity.collision_layers, tuning, &mut sensors[i], !is_up);
                }
            }
            if sensors[floor_sensor1].collided || sensors[floor_sensor2].collided {
                moving_down = 2;
                cnt = 0;
            }
        }

        if moving_up == 1 {
            for &i in &[roof_sensor1, roof_sensor2] {
                if !sensors[i].collided {
                    sensors[i].x += vel_x;
                    sensors[i].y += vel_y;
                    check_vertical_collision(tiles, source, entity.collision_plane, entity.collision_layers, tuning, &mut sensors[i], is_up);
                }
            }
            if sensors[roof_sensor1].collided || sensors[roof_sensor2].collided {
                moving_up = 2;
                cnt = 0;
            }
        }
    }

    if moving_right < 2 && moving_left < 2 {
        entity.x += entity.velocity_x;
    }
    if moving_up < 2 && moving_down < 2 {
        entity.y += entity.velocity_y;
        return;
    }

    if moving_down == 2 {
        entity.on_ground = true;
        let both = sensors[floor_sensor1].collided && sensors[floor_sensor2].collided;
        let use_sensor2 = (both
            && if is_up {
                sensors[floor_sensor1].y <= sensors[floor_sensor2].y
            } else {
                sensors[floor_sensor1].y >= sensors[floor_sensor2].y
            })
            || !sensors[floor_sensor1].collided;
        let final_sensor = if use_sensor2 { floor_sensor2 } else { floor_sensor1 };

        entity.y = sensors[final_sensor].y - if is_up { grip.outer.top - 1.0 } else { grip.outer.bottom };
        entity.angle = sensors[final_sensor].angle;

        let ang = entity.angle;

        match landing_mode(ang, is_up) {
            Some(CollisionMode::LeftWall) if entity.collision_mode != CollisionMode::LeftWall => {
                entity.collision_mode = CollisionMode::LeftWall;
                entity.x -= 4.0;
            }
            Some(CollisionMode::RightWall) if entity.collision_mode != CollisionMode::RightWall => {
                entity.collision_mode = CollisionMode::RightWall;
                entity.x += 4.0;
            }
            _ => {}
        }

        let ang = ang as i32;
        let speed = if !is_up {
            if ang < 0x80 {
                if ang < 0x10 {
                    entity.velocity_x
                } else {
                    let divisor = if ang >= 0x20 { 1.0 } else { 2.0 };
                    if entity.velocity_x.abs() <= (entity.velocity_y / divisor).abs() {
                        entity.velocity_y / divisor
                    } else {
                        entity.velocity_x
                    }
                }
            } else if ang > 0xF0 {
                entity.velocity_x
            } else {
                let divisor = if ang <= 0xE0 { 1.0 } else { 2.0 };
                if entity.velocity_x.abs() <= (entity.velocity_y / divisor).abs() {
                    -(entity.velocity_y / divisor)
                } else {
                    entity.velocity_x
                }
            }
        } else if ang >= 0x80 {
            if ang < 0x90 {
                -entity.velocity_x
            } else {
                let divisor = if ang >= 0xA0 { 1.0 } else { 2.0 };
                if entity.velocity_x.abs() <= (entity.velocity_y / divisor).abs() {
                    entity.velocity_y / divisor
                } else {
                    entity.velocity_x
                }
            }
        } else if ang <= 0x70 {
            entity.velocity_x
        } else {
            let divisor = if ang <= 0x60 { 1.0 } else { 2.0 };
            if entity.velocity_x.abs() <= (entity.velocity_y / divisor).abs() {
                -(entity.velocity_y / divisor)
            } else {
                entity.velocity_x
            }
        };

        entity.ground_vel = speed.clamp(-24.0, 24.0);
        entity.velocity_x = entity.ground_vel;
        entity.velocity_y = 0.0;
    }

    if moving_up == 2 {
        let both = sensors[roof_sensor1].collided && sensors[roof_sensor2].collided;
        let use_sensor2 = if both {
            if is_up {
                sensors[roof_sensor1].y >= sensors[roof_sensor2].y
            } else {
                sensors[roof_sensor1].y <= sensors[roof_sensor2].y
            }
        } else {
            sensors[roof_sensor2].collided
        };
        let final_s = if use_sensor2 { roof_sensor2 } else { roof_sensor1 };
        let sensor_angle = sensors[final_s].angle as i32;

        entity.y = sensors[final_s].y - if is_up { grip.outer.bottom } else { grip.outer.top - 1.0 };

        let (land_left, land_right, velocity_check) = if !is_up {
            (
                sensor_angle > 0x9E && sensor_angle < 0xC1,
                sensor_angle < 0x62 && sensor_angle > 0x00,
                entity.velocity_y < -entity.velocity_x.abs(),
            )
        } else {
            (
                sensor_angle > 0xC0 && sensor_angle < 0xE2,
                sensor_angle >= 0x21 && sensor_angle <= 0x40,
                entity.velocity_y > entity.velocity_x.abs(),
            )
        };

        if (land_left || land_right) && velocity_check {
            entity.on_ground = true;
            entity.angle = sensor_angle as u8;
            entity.collision_mode = if land_right { CollisionMode::RightWall } else { CollisionMode::LeftWall };
            entity.x += if land_right { 4.0 } else { -4.0 };
            entity.y -= 2.0;

            let multi = if !is_up {
                if land_right {
                    if sensor_angle <= 0x60 { 1.0 } else { 0.5 }
                } else if sensor_angle >= 0xA0 {
                    -1.0
                } else {
                    -0.5
                }
            } else if land_right {
                if sensor_angle <= 0x20 { 1.0 } else { 0.5 }
            } else if sensor_angle <= 0xE0 {
                -1.0
            } else {
                -0.5
            };

            entity.ground_vel = entity.velocity_y * multi;
        } else {
            entity.velocity_y = 0.0;
        }
    }
}

/// Equivalent of `ProcessEntityMovement`: dispatches on `entity.OnGround`
/// into the grounded (`process_path_grip`) or airborne
/// (`process_air_collision`) path when tile collision is enabled for
/// this entity, or plain Euclidean integration otherwise.
pub fn process_entity_movement(
    tiles: &TileConfigSet,
    source: &impl TileLayerSource,
    tuning: &CollisionTuning,
    entity: &mut Entity,
    outer: CollisionBox,
    inner: CollisionBox,
) {
    if matches!(entity.tile_collisions, TileCollisionSide::None) {
        entity.x += entity.velocity_x;
        entity.y += entity.velocity_y;
        return;
    }

    let is_up = matches!(entity.tile_collisions, TileCollisionSide::Up);
    let ground_angle: u8 = if is_up { 0x80 } else { 0x00 };
    let tolerance =
        if entity.ground_vel.abs() < 6.0 && entity.angle == ground_angle { tuning.low_tolerance } else { tuning.high_tolerance };

    let mut use_collision_offset = entity.angle == ground_angle;
    if entity.on_ground {
        let edge = if is_up { outer.top.abs() } else { outer.bottom.abs() };
        if edge < 14.0 {
            use_collision_offset = false;
        }
    } else {
        use_collision_offset = false;
    }

    let grip = GripState { outer, inner, use_collision_offset, tolerance };
    let mut sensors = [PathSensor::default(); 6];

    if entity.on_ground {
        process_path_grip(tiles, source, tuning, entity, &grip, &mut sensors);
    } else {
        process_air_collision(tiles, source, tuning, entity, &grip, &mut sensors, is_up);
    }

    if entity.on_ground {
        entity.velocity_x = entity.ground_vel * cos_turn(entity.angle);
        entity.velocity_y = entity.ground_vel * sin_turn(entity.angle);
    } else {
        entity.ground_vel = entity.velocity_x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_zero_is_floor() {
        assert_eq!(CollisionMode::from_angle(0x00), CollisionMode::Floor);
    }

    #[test]
    fn angle_near_full_circle_is_still_floor() {
        assert_eq!(CollisionMode::from_angle(0xF0), CollisionMode::Floor);
    }

    #[test]
    fn angle_quarter_turn_is_right_wall() {
        assert_eq!(CollisionMode::from_angle(0x40), CollisionMode::RightWall);
    }

    #[test]
    fn angle_half_turn_is_ceiling() {
        assert_eq!(CollisionMode::from_angle(0x80), CollisionMode::Ceiling);
    }

    #[test]
    fn ground_sub_step_halves_for_small_airborne_hitboxes() {
        assert_eq!(ground_sub_step(false, false), 4);
        assert_eq!(ground_sub_step(true, false), 8);
        assert_eq!(ground_sub_step(true, true), 4);
    }

    /// A single-layer floor strip: every column of `floor_row` is the
    /// same flat, fully-solid tile (id 0); everything else is empty.
    struct FlatFloor {
        width: i32,
        height: i32,
        floor_row: i32,
    }

    impl TileLayerSource for FlatFloor {
        fn layer_count(&self) -> usize {
            1
        }
        fn is_collideable(&self, _layer: usize) -> bool {
            true
        }
        fn dims(&self, _layer: usize) -> (i32, i32) {
            (self.width, self.height)
        }
        fn tile_at(&self, _layer: usize, tx: i32, ty: i32) -> Option<(u16, bool, bool, u8, u8)> {
            if tx < 0 || tx >= self.width || ty != self.floor_row {
                None
            } else {
                Some((0, false, false, 1, 1))
            }
        }
    }

    fn flat_floor_tiles() -> TileConfigSet {
        TileConfigSet::from_rows(vec![TileConfig::from_top_heights([0; 16], 0x00, false)])
    }

    fn grip_boxes() -> (CollisionBox, CollisionBox) {
        (
            CollisionBox { left: -8.0, top: -8.0, right: 8.0, bottom: 8.0 },
            CollisionBox { left: -7.0, top: -8.0, right: 7.0, bottom: 8.0 },
        )
    }

    #[test]
    fn check_tile_collision_snaps_down_onto_floor_top() {
        let tiles = flat_floor_tiles();
        let source = FlatFloor { width: 4, height: 2, floor_row: 1 };
        // Tile row 1 spans world y in [16, 32); its top surface is y = 16.
        let (collided, _x, y) = check_tile_collision(&tiles, &source, 0, 1, CollisionMode::Floor, 32.0, 20.0);
        assert!(collided);
        assert_eq!(y, 16.0);
    }

    #[test]
    fn check_tile_collision_ignores_disabled_layer() {
        let tiles = flat_floor_tiles();
        let source = FlatFloor { width: 4, height: 2, floor_row: 1 };
        let (collided, _x, y) = check_tile_collision(&tiles, &source, 0, 0, CollisionMode::Floor, 32.0, 20.0);
        assert!(!collided);
        assert_eq!(y, 20.0);
    }

    #[test]
    fn check_tile_grip_only_commits_within_tolerance() {
        let tiles = flat_floor_tiles();
        let source = FlatFloor { width: 4, height: 2, floor_row: 1 };
        let (committed, _x, y) = check_tile_grip(&tiles, &source, 0, 1, CollisionMode::Floor, 32.0, 16.0, 3.5);
        assert!(committed);
        assert_eq!(y, 16.0);

        // 20px away from the surface: still finds the tile (and stops
        // scanning there) but doesn't commit the snap.
        let (committed, _x, y) = check_tile_grip(&tiles, &source, 0, 1, CollisionMode::Floor, 32.0, 36.0, 3.5);
        assert!(!committed);
        assert_eq!(y, 36.0);
    }

    #[test]
    fn process_entity_movement_keeps_grounded_entity_on_flat_floor() {
        let tiles = flat_floor_tiles();
        let source = FlatFloor { width: 4, height: 2, floor_row: 1 };
        let tuning = CollisionTuning::default();
        let (outer, inner) = grip_boxes();

        let mut entity = Entity::new(0, 32.0, 8.0);
        entity.on_ground = true;
        entity.tile_collisions = TileCollisionSide::Down;
        entity.collision_plane = 0;
        entity.collision_layers = 1;
        entity.collision_mode = CollisionMode::Floor;

        process_entity_movement(&tiles, &source, &tuning, &mut entity, outer, inner);

        assert!(entity.on_ground);
        assert_eq!(entity.collision_mode, CollisionMode::Floor);
        assert_eq!(entity.angle, 0x00);
        assert_eq!(entity.y, 8.0);
        assert_eq!(entity.x, 32.0);
        assert_eq!(entity.velocity_x, 0.0);
        assert_eq!(entity.velocity_y, 0.0);
    }

    #[test]
    fn process_entity_movement_lands_a_falling_entity_on_the_floor() {
        let tiles = flat_floor_tiles();
        let source = FlatFloor { width: 4, height: 2, floor_row: 1 };
        let tuning = CollisionTuning::default();
        let (outer, inner) = grip_boxes();

        let mut entity = Entity::new(0, 32.0, 9.0);
        entity.on_ground = false;
        entity.velocity_y = 5.0;
        entity.tile_collisions = TileCollisionSide::Down;
        entity.collision_plane = 0;
        entity.collision_layers = 1;

        process_entity_movement(&tiles, &source, &tuning, &mut entity, outer, inner);

        assert!(entity.on_ground);
        assert_eq!(entity.angle, 0x00);
        assert_eq!(entity.y, 8.0);
        assert_eq!(entity.velocity_y, 0.0);
    }
}
