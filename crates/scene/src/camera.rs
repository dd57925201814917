//! Camera for rendering.
//!
//! The camera looks from a fixed eye at a target with +Z up. Projections are
//! flipped in Y for Vulkan's Y-down clip space.

use glam::{Mat4, Vec3};

/// A look-at camera with a perspective projection.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::splat(2.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the projection matrix for a `width`x`height` target (with Vulkan
    /// Y-flip).
    pub fn projection_matrix(&self, width: u32, height: u32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y,
            aspect_ratio(width, height),
            self.near,
            self.far,
        );
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Width over height. A zero height yields 1.0.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_camera_default() {
        let camera = Camera::default();
        assert_eq!(camera.eye, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.up, Vec3::Z);
        assert!((camera.fov_y - std::f32::consts::FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_view_maps_target_onto_negative_z() {
        let camera = Camera::new();
        let view = camera.view_matrix();

        let target = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(target.x.abs() < EPSILON);
        assert!(target.y.abs() < EPSILON);
        assert!((target.z + 12.0_f32.sqrt()).abs() < 1e-4);

        let eye = view.transform_point3(camera.eye);
        assert!(eye.length() < EPSILON);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new();
        let flipped = camera.projection_matrix(800, 600);
        let plain = Mat4::perspective_rh(camera.fov_y, 800.0 / 600.0, 0.1, 10.0);

        assert!((flipped.y_axis.y + plain.y_axis.y).abs() < EPSILON);
        assert!(flipped.y_axis.y < 0.0);
        assert_eq!(flipped.x_axis, plain.x_axis);
        assert_eq!(flipped.z_axis, plain.z_axis);
    }

    #[test]
    fn test_projection_depth_range() {
        let camera = Camera::new();
        let proj = camera.projection_matrix(1, 1);

        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(1280, 720), 1280.0 / 720.0);
        assert_eq!(aspect_ratio(100, 0), 1.0);
    }
}
