//! Per-entity scheduling state: the fields the scene list and draw
//! groups sort and cull by. The scripted object itself lives as an
//! `Instance` on the VM heap; this struct is the engine-owned sibling
//! record the driver needs without going through the VM for every frame.

use crate::physics::{CollisionMode, TileCollisionSide};

/// Controls whether an entity updates/renders at all, and by which
/// on-screen test. Entities that fall out of range neither update nor
/// render, but may transition back to active on any later frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Disabled,
    Never,
    Paused,
    Always,
    Normal,
    Bounds,
    XBounds,
    YBounds,
    RBounds,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Scheduling and placement state for one live entity. `heap_ref` is
/// whatever opaque handle the host uses to reach the corresponding
/// scripted `Instance` (an index into a slab, typically), kept as a
/// plain `u32` so this module has no GC lifetime of its own.
#[derive(Debug, Clone)]
pub struct Entity {
    pub heap_ref: u32,
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    pub update_priority: i32,
    pub priority: u16,
    pub activity: Activity,
    pub on_ground: bool,
    pub collision_mode: CollisionMode,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub ground_vel: f32,
    pub angle: u8,
    pub persistent: bool,
    pub on_screen_hitbox: Rect,
    /// Whether, and in which direction, this entity is subject to tile
    /// collision at all (`ProcessEntityMovement`'s `TileCollisions`).
    pub tile_collisions: TileCollisionSide,
    /// Which collision plane (`A`/`B`, 0/1) this entity tests against.
    pub collision_plane: i32,
    /// Bitmask of tile layers this entity collides with.
    pub collision_layers: u32,
    /// True when the entity's sprite (and hitbox orientation) is mirrored
    /// horizontally.
    pub direction_flip_x: bool,
}

impl Entity {
    pub fn new(heap_ref: u32, x: f32, y: f32) -> Self {
        Entity {
            heap_ref,
            x,
            y,
            depth: 0.0,
            update_priority: 0,
            priority: 0,
            activity: Activity::Normal,
            on_ground: false,
            collision_mode: CollisionMode::Floor,
            velocity_x: 0.0,
            velocity_y: 0.0,
            ground_vel: 0.0,
            angle: 0,
            persistent: false,
            on_screen_hitbox: Rect { x, y, width: 16.0, height: 16.0 },
            tile_collisions: TileCollisionSide::None,
            collision_plane: 0,
            collision_layers: 0,
            direction_flip_x: false,
        }
    }

    /// Radial on-screen test for `Activity::RBounds`: the hitbox's
    /// bounding circle (half-diagonal) against the view rect's center.
    pub fn in_radial_range(&self, view: &Rect) -> bool {
        let hb = &self.on_screen_hitbox;
        let radius = ((hb.width * hb.width + hb.height * hb.height).sqrt()) / 2.0;
        let cx = hb.x + hb.width / 2.0;
        let cy = hb.y + hb.height / 2.0;
        let vcx = view.x + view.width / 2.0;
        let vcy = view.y + view.height / 2.0;
        let dx = cx - vcx;
        let dy = cy - vcy;
        (dx * dx + dy * dy).sqrt() <= radius + (view.width.max(view.height)) / 2.0
    }

    /// Whether this entity should update/render this frame against the
    /// given set of active views, per its `Activity`.
    pub fn is_on_screen(&self, views: &[Rect]) -> bool {
        match self.activity {
            Activity::Disabled | Activity::Never => false,
            Activity::Paused | Activity::Always => true,
            Activity::Normal => true,
            Activity::Bounds => views.iter().any(|v| v.intersects(&self.on_screen_hitbox)),
            Activity::XBounds => views
                .iter()
                .any(|v| self.on_screen_hitbox.x < v.x + v.width && self.on_screen_hitbox.x + self.on_screen_hitbox.width > v.x),
            Activity::YBounds => views
                .iter()
                .any(|v| self.on_screen_hitbox.y < v.y + v.height && self.on_screen_hitbox.y + self.on_screen_hitbox.height > v.y),
            Activity::RBounds => views.iter().any(|v| self.in_radial_range(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_entity_is_never_on_screen() {
        let mut e = Entity::new(0, 0.0, 0.0);
        e.activity = Activity::Disabled;
        assert!(!e.is_on_screen(&[Rect { x: -1000.0, y: -1000.0, width: 2000.0, height: 2000.0 }]));
    }

    #[test]
    fn bounds_activity_requires_view_overlap() {
        let mut e = Entity::new(0, 500.0, 500.0);
        e.activity = Activity::Bounds;
        e.on_screen_hitbox = Rect { x: 500.0, y: 500.0, width: 16.0, height: 16.0 };
        assert!(!e.is_on_screen(&[Rect { x: 0.0, y: 0.0, width: 100.0, height: 100.0 }]));
        assert!(e.is_on_screen(&[Rect { x: 0.0, y: 0.0, width: 1000.0, height: 1000.0 }]));
    }

    #[test]
    fn rect_intersects_is_symmetric() {
        let a = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = Rect { x: 5.0, y: 5.0, width: 10.0, height: 10.0 };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }
}
