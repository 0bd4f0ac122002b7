//! Ground-to-wall collision-mode hysteresis for slope-following movement.
//!
//! While an entity grip-walks along a surface, the four collision modes
//! (floor, left wall, ceiling, right wall) don't switch at a single angle
//! threshold — each transition has its own window so a foot planted right
//! at a loop's seam doesn't flicker between modes frame to frame.

use super::collision::CollisionMode;

/// One pass of the grip-walk transition table: given the current mode and
/// the surface angle just found by the path sensors, returns the mode to
/// continue in. Mirrors the per-case angle windows used while following a
/// surface on the ground (as opposed to the wider windows used only once,
/// on landing, by the airborne sensor pass).
pub fn next_grounded_mode(current: CollisionMode, angle: u8) -> CollisionMode {
    match current {
        CollisionMode::Floor => {
            if angle > 0x80 && angle < 0xDE {
                CollisionMode::LeftWall
            } else if angle > 0x22 && angle < 0x80 {
                CollisionMode::RightWall
            } else {
                current
            }
        }
        CollisionMode::LeftWall => {
            if angle > 0xE2 {
                CollisionMode::Floor
            } else if angle < 0x9E {
                CollisionMode::Ceiling
            } else {
                current
            }
        }
        CollisionMode::Ceiling => {
            if angle > 0xA2 {
                CollisionMode::LeftWall
            } else if angle < 0x5E {
                CollisionMode::RightWall
            } else {
                current
            }
        }
        CollisionMode::RightWall => {
            if angle < 0x1E {
                CollisionMode::Floor
            } else if angle > 0x62 {
                CollisionMode::Ceiling
            } else {
                current
            }
        }
    }
}

/// The wider landing-transition windows used once when an airborne
/// sensor first makes floor contact, rather than the tighter grounded
/// windows `next_grounded_mode` uses every grip-walk sub-step.
pub fn landing_mode(angle: u8, is_up_gravity: bool) -> Option<CollisionMode> {
    let (l_min, l_max, r_min, r_max) = if is_up_gravity {
        (0xA2, 0xE0, 0x20, 0x5E)
    } else {
        (0xA0, 0xDE, 0x22, 0x60)
    };
    if angle > l_min && angle < l_max {
        Some(CollisionMode::LeftWall)
    } else if angle > r_min && angle < r_max {
        Some(CollisionMode::RightWall)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_transitions_to_right_wall_past_threshold() {
        assert_eq!(next_grounded_mode(CollisionMode::Floor, 0x40), CollisionMode::RightWall);
    }

    #[test]
    fn floor_transitions_to_left_wall_past_threshold() {
        assert_eq!(next_grounded_mode(CollisionMode::Floor, 0xB0), CollisionMode::LeftWall);
    }

    #[test]
    fn floor_stays_floor_within_dead_zone() {
        assert_eq!(next_grounded_mode(CollisionMode::Floor, 0x10), CollisionMode::Floor);
    }

    #[test]
    fn right_wall_returns_to_floor_near_zero() {
        assert_eq!(next_grounded_mode(CollisionMode::RightWall, 0x10), CollisionMode::Floor);
    }

    #[test]
    fn landing_mode_none_when_angle_is_flat() {
        assert_eq!(landing_mode(0x00, false), None);
    }

    #[test]
    fn landing_mode_left_wall_when_steep() {
        assert_eq!(landing_mode(0xB0, false), Some(CollisionMode::LeftWall));
    }
}
