//! Entity-vs-entity hitbox tests: simple touch/circle overlap plus the
//! directional box and one-way-platform resolvers that also nudge the
//! colliding entity's velocity and ground state.

use crate::physics::collision::CollisionBox;
use crate::physics::{CollisionMode, TileCollisionSide};
use crate::scene::entity::Entity;

/// Which edge of `this_hitbox` a [`check_entity_box`] test resolved
/// against, equivalent to `C_TOP`/`C_LEFT`/`C_BOTTOM`/`C_RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionSide {
    None,
    Top,
    Left,
    Bottom,
    Right,
}

/// One recorded hitbox test, for optional debug visualisation
/// (equivalent of `ViewableHitboxList`'s `Hitbox` entries).
#[derive(Debug, Clone, Copy)]
pub struct ViewableHitbox {
    pub entity_ref: u32,
    pub box_: CollisionBox,
    pub collided: bool,
}

/// Equivalent of `CheckEntityTouch`: a plain AABB overlap test between
/// the two entities' hitboxes, both oriented by `this_entity`'s flip
/// (intentional in the source -- `other_entity`'s own flip is ignored).
pub fn check_entity_touch(this_entity: &Entity, this_hitbox: CollisionBox, other_entity: &Entity, other_hitbox: CollisionBox) -> bool {
    let this_box = this_hitbox.oriented(this_entity.direction_flip_x);
    let other_box = other_hitbox.oriented(this_entity.direction_flip_x);

    this_entity.x + this_box.left < other_entity.x + other_box.right
        && this_entity.x + this_box.right > other_entity.x + other_box.left
        && this_entity.y + this_box.top < other_entity.y + other_box.bottom
        && this_entity.y + this_box.bottom > other_entity.y + other_box.top
}

/// Equivalent of `CheckEntityCircle`: a simple radius-sum distance test.
pub fn check_entity_circle(this_entity: &Entity, this_radius: f32, other_entity: &Entity, other_radius: f32) -> bool {
    let dx = this_entity.x - other_entity.x;
    let dy = this_entity.y - other_entity.y;
    let r = this_radius + other_radius;
    dx * dx + dy * dy < r * r
}

/// Equivalent of `CheckEntityBox`: finds which side of `this_entity`'s
/// hitbox `other_entity` is pressing into (picking the axis with the
/// smaller penetration), and when `set_values` is true, pushes
/// `other_entity` out along that axis and zeroes the velocity/grounds it
/// as appropriate.
pub fn check_entity_box(
    this_entity: &Entity,
    this_hitbox: CollisionBox,
    other_entity: &mut Entity,
    other_hitbox: CollisionBox,
    set_values: bool,
) -> CollisionSide {
    let this_box = this_hitbox.oriented(this_entity.direction_flip_x);
    let other_box = other_hitbox.oriented(this_entity.direction_flip_x);

    let mut collision_h = CollisionSide::None;
    let mut collision_v = CollisionSide::None;

    let mut collide_x = other_entity.x;
    let mut collide_y = other_entity.y;

    let h_other_top = other_box.top + 1.0;
    let h_other_bottom = other_box.bottom - 1.0;

    let this_center_x = this_entity.x + (this_box.right + this_box.left) * 0.5;

    if other_entity.x <= this_center_x {
        if other_entity.x + other_box.right >= this_entity.x + this_box.left
            && this_entity.y + this_box.top < other_entity.y + h_other_bottom
            && this_entity.y + this_box.bottom > other_entity.y + h_other_top
        {
            collision_h = CollisionSide::Left;
            collide_x = this_entity.x + (this_box.left - other_box.right);
        }
    } else if other_entity.x + other_box.left < this_entity.x + this_box.right
        && this_entity.y + this_box.top < other_entity.y + h_other_bottom
        && this_entity.y + this_box.bottom > other_entity.y + h_other_top
    {
        collision_h = CollisionSide::Right;
        collide_x = this_entity.x + (this_box.right - other_box.left);
    }

    let v_other_left = other_box.left + 1.0;
    let v_other_right = other_box.right - 1.0;

    if other_entity.y < this_entity.y + (this_box.top + this_box.bottom) * 0.5 {
        if other_entity.y + other_box.bottom >= this_entity.y + this_box.top
            && this_entity.x + this_box.left < other_entity.x + v_other_right
            && this_entity.x + this_box.right > other_entity.x + v_other_left
        {
            collision_v = CollisionSide::Top;
            collide_y = this_entity.y + (this_box.top - other_box.bottom);
        }
    } else if other_entity.y + other_box.top < this_entity.y + this_box.bottom
        && this_entity.x + this_box.left < other_entity.x + v_other_right
        && this_entity.x + this_box.right > other_entity.x + v_other_left
    {
        collision_v = CollisionSide::Bottom;
        collide_y = this_entity.y + (this_box.bottom - other_box.top);
    }

    let delta_x = collide_x - other_entity.x;
    let delta_y = collide_y - other_entity.y;

    let side = if (delta_x * delta_x >= delta_y * delta_y && (collision_v != CollisionSide::None || collision_h == CollisionSide::None))
        || (collision_h == CollisionSide::None && collision_v != CollisionSide::None)
    {
        collision_v
    } else {
        collision_h
    };

    if set_values && side != CollisionSide::None {
        match side {
            CollisionSide::Top | CollisionSide::Bottom => {
                other_entity.y = collide_y;
                if side == CollisionSide::Top {
                    if other_entity.velocity_y > 0.0 {
                        other_entity.velocity_y = 0.0;
                    }
                    if !matches!(other_entity.tile_collisions, TileCollisionSide::Up) && !other_entity.on_ground && other_entity.velocity_y >= 0.0
                    {
                        other_entity.ground_vel = other_entity.velocity_x;
                        other_entity.angle = 0x00;
                        other_entity.on_ground = true;
                    }
                } else {
                    if other_entity.velocity_y < 0.0 {
                        other_entity.velocity_y = 0.0;
                    }
                    if matches!(other_entity.tile_collisions, TileCollisionSide::Up) && !other_entity.on_ground && other_entity.velocity_y <= 0.0
                    {
                        other_entity.angle = 0x80;
                        other_entity.ground_vel = -other_entity.velocity_x;
                        other_entity.on_ground = true;
                    }
                }
            }
            CollisionSide::Left | CollisionSide::Right => {
                other_entity.x = collide_x;
                let entity_vel_x = if other_entity.on_ground {
                    if matches!(other_entity.collision_mode, CollisionMode::Ceiling) {
                        -other_entity.ground_vel
                    } else {
                        other_entity.ground_vel
                    }
                } else {
                    other_entity.velocity_x
                };
                if (side == CollisionSide::Left && entity_vel_x > 0.0) || (side == CollisionSide::Right && entity_vel_x < 0.0) {
                    other_entity.velocity_x = 0.0;
                    other_entity.ground_vel = 0.0;
                }
            }
            CollisionSide::None => {}
        }
    }

    side
}

/// Equivalent of `CheckEntityPlatform`: a one-way platform that only
/// catches `other_entity` when it was above (or, for gravity-inverted
/// entities, below) the platform on the previous frame and crosses it
/// moving the right way this frame.
pub fn check_entity_platform(
    this_entity: &Entity,
    this_hitbox: CollisionBox,
    other_entity: &mut Entity,
    other_hitbox: CollisionBox,
    set_values: bool,
) -> bool {
    let this_box = this_hitbox.oriented(this_entity.direction_flip_x);
    let other_box = other_hitbox.oriented(this_entity.direction_flip_x);

    let is_up = matches!(other_entity.tile_collisions, TileCollisionSide::Up);
    let gravity_dir = if is_up { -1.0 } else { 1.0 };

    let other_edge = other_entity.y + other_box.bottom * gravity_dir;
    let other_prev_edge = (other_entity.y - other_entity.velocity_y) + other_box.bottom * gravity_dir;

    let platform_top = this_entity.y + this_box.top;
    let platform_bottom = this_entity.y + this_box.bottom;

    let is_colliding = this_entity.x + this_box.left < other_entity.x + other_box.right
        && this_entity.x + this_box.right > other_entity.x + other_box.left
        && ((!is_up && other_entity.velocity_y >= 0.0 && other_edge >= platform_top && other_prev_edge <= platform_bottom)
            || (is_up && other_entity.velocity_y <= 0.0 && other_edge <= platform_bottom && other_prev_edge >= platform_top));

    if is_colliding {
        other_entity.y = if is_up { platform_bottom + other_box.bottom } else { platform_top - other_box.bottom };

        if set_values {
            other_entity.velocity_y = 0.0;
            if !other_entity.on_ground {
                other_entity.on_ground = true;
                other_entity.angle = if is_up { 0x80 } else { 0x00 };
                other_entity.ground_vel = if is_up { -other_entity.velocity_x } else { other_entity.velocity_x };
            }
        }
    }

    is_colliding
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_at(x: f32, y: f32) -> Entity {
        Entity::new(0, x, y)
    }

    fn box16() -> CollisionBox {
        CollisionBox { left: -8.0, top: -8.0, right: 8.0, bottom: 8.0 }
    }

    #[test]
    fn touch_detects_overlapping_boxes() {
        let a = entity_at(0.0, 0.0);
        let b = entity_at(10.0, 0.0);
        assert!(check_entity_touch(&a, box16(), &b, box16()));
        let c = entity_at(100.0, 0.0);
        assert!(!check_entity_touch(&a, box16(), &c, box16()));
    }

    #[test]
    fn circle_uses_summed_radius() {
        let a = entity_at(0.0, 0.0);
        let b = entity_at(15.0, 0.0);
        assert!(check_entity_circle(&a, 8.0, &b, 8.0));
        assert!(!check_entity_circle(&a, 4.0, &b, 4.0));
    }

    #[test]
    fn box_pushes_out_from_above() {
        let a = entity_at(0.0, 0.0);
        let mut b = entity_at(0.0, -15.0);
        b.velocity_y = 1.0;
        let side = check_entity_box(&a, box16(), &mut b, box16(), true);
        assert_eq!(side, CollisionSide::Top);
        assert_eq!(b.velocity_y, 0.0);
        assert!(b.on_ground);
    }

    #[test]
    fn platform_only_catches_downward_motion_from_above() {
        let platform = entity_at(0.0, 0.0);
        let platform_box = CollisionBox { left: -8.0, top: -8.0, right: 8.0, bottom: -7.0 };
        let mut faller = entity_at(0.0, -9.0);
        faller.velocity_y = 2.0;
        assert!(check_entity_platform(&platform, platform_box, &mut faller, box16(), true));
        assert!(faller.on_ground);

        let mut riser = entity_at(0.0, -20.0);
        riser.velocity_y = -2.0;
        assert!(!check_entity_platform(&platform, platform_box, &mut riser, box16(), true));
    }
}
