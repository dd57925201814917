//! Model transforms.

use glam::Mat4;

/// Rotation speed of the model about +Z.
pub const SPIN_DEGREES_PER_SECOND: f32 = 90.0;

/// Model matrix after `elapsed_secs` of spinning about +Z.
pub fn spin(elapsed_secs: f32) -> Mat4 {
    Mat4::from_rotation_z((elapsed_secs * SPIN_DEGREES_PER_SECOND).to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_spin_starts_at_identity() {
        assert_eq!(spin(0.0), Mat4::IDENTITY);
    }

    #[test]
    fn test_spin_quarter_turn_per_second() {
        let rotated = spin(1.0).transform_point3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::Y, EPSILON));
    }

    #[test]
    fn test_spin_keeps_z() {
        let point = Vec3::new(0.3, -0.4, 1.5);
        let rotated = spin(2.7).transform_point3(point);
        assert!((rotated.z - point.z).abs() < EPSILON);
        assert!((rotated.length() - point.length()).abs() < EPSILON);
    }
}
