//! Viewports: each carries its own projection, view matrix, draw
//! target, and optional stencil, and renders in ascending `Priority`
//! order.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct View2DSetup {
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct View3DSetup {
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub scale: Vec3,
    pub rotation_radians: Vec3,
    pub translation: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Orthographic,
    Perspective,
}

#[derive(Debug, Clone, Copy)]
pub struct View {
    pub priority: i32,
    pub active: bool,
    pub projection_matrix: Mat4,
    pub view_matrix: Mat4,
    pub kind: Projection,
    pub draw_target_width: u32,
    pub draw_target_height: u32,
}

impl View {
    /// Builds an ortho projection, then composes the view matrix as
    /// scale → rotate-about-center → translate-by-`-X,-Y,-Z`, matching
    /// the original camera's fixed transform order for 2D scenes.
    pub fn setup_2d(priority: i32, target_width: u32, target_height: u32, setup: View2DSetup) -> Self {
        let projection_matrix = Mat4::orthographic_rh(0.0, setup.width, setup.height, 0.0, -1.0, 1.0);
        let center = Vec3::new(setup.width / 2.0, setup.height / 2.0, 0.0);
        let scale = Mat4::from_scale(Vec3::new(setup.scale_x, setup.scale_y, 1.0));
        let rotate = Mat4::from_translation(center)
            * Mat4::from_rotation_z(setup.rotation)
            * Mat4::from_translation(-center);
        let translate = Mat4::from_translation(Vec3::new(-setup.x, -setup.y, -setup.z));
        View {
            priority,
            active: true,
            projection_matrix,
            view_matrix: translate * rotate * scale,
            kind: Projection::Orthographic,
            draw_target_width: target_width,
            draw_target_height: target_height,
        }
    }

    /// Builds a perspective projection from the view's FOV/near/far and
    /// applies the scale/rotate/translate chain directly (no
    /// rotate-about-center step, unlike the 2D setup).
    pub fn setup_3d(priority: i32, target_width: u32, target_height: u32, setup: View3DSetup) -> Self {
        let projection_matrix = Mat4::perspective_rh(setup.fov_y_radians, setup.aspect, setup.near, setup.far);
        let scale = Mat4::from_scale(setup.scale);
        let rotate = Mat4::from_euler(
            glam::EulerRot::XYZ,
            setup.rotation_radians.x,
            setup.rotation_radians.y,
            setup.rotation_radians.z,
        );
        let translate = Mat4::from_translation(setup.translation);
        View {
            priority,
            active: true,
            projection_matrix,
            view_matrix: translate * rotate * scale,
            kind: Projection::Perspective,
            draw_target_width: target_width,
            draw_target_height: target_height,
        }
    }
}

/// Returns the active views in ascending `Priority` order, the order
/// `Render` iterates them in.
pub fn active_views_in_render_order(views: &[View]) -> Vec<&View> {
    let mut active: Vec<&View> = views.iter().filter(|v| v.active).collect();
    active.sort_by_key(|v| v.priority);
    active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_2d_produces_orthographic_projection() {
        let view = View::setup_2d(
            0,
            320,
            240,
            View2DSetup { scale_x: 1.0, scale_y: 1.0, rotation: 0.0, x: 0.0, y: 0.0, z: 0.0, width: 320.0, height: 240.0 },
        );
        assert_eq!(view.kind, Projection::Orthographic);
    }

    #[test]
    fn active_views_sort_ascending_by_priority() {
        let a = View::setup_2d(5, 1, 1, View2DSetup { scale_x: 1.0, scale_y: 1.0, rotation: 0.0, x: 0.0, y: 0.0, z: 0.0, width: 1.0, height: 1.0 });
        let mut b = View::setup_2d(1, 1, 1, View2DSetup { scale_x: 1.0, scale_y: 1.0, rotation: 0.0, x: 0.0, y: 0.0, z: 0.0, width: 1.0, height: 1.0 });
        b.active = false;
        let c = View::setup_2d(3, 1, 1, View2DSetup { scale_x: 1.0, scale_y: 1.0, rotation: 0.0, x: 0.0, y: 0.0, z: 0.0, width: 1.0, height: 1.0 });
        let ordered = active_views_in_render_order(&[a, b, c]);
        let priorities: Vec<i32> = ordered.iter().map(|v| v.priority).collect();
        assert_eq!(priorities, vec![3, 5]);
    }
}
