//! Uniform buffer object definitions for shaders.
//!
//! This structure must match the `UniformBufferObject` block at binding 0 of
//! `shaders/shader.vert` exactly. It uses `#[repr(C)]` for a predictable
//! memory layout and implements `Pod` and `Zeroable` for byte casting.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tessera_scene::{Camera, spin};

/// Per-frame transform data.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformFrameData {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix (view to clip space, Y flipped).
    pub proj: Mat4,
}

impl UniformFrameData {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the frame's matrices after `elapsed_secs` for a
    /// `width`x`height` target.
    pub fn new(camera: &Camera, elapsed_secs: f32, width: u32, height: u32) -> Self {
        Self {
            model: spin(elapsed_secs),
            view: camera.view_matrix(),
            proj: camera.projection_matrix(width, height),
        }
    }

    /// Raw bytes for uploading.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_uniform_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(UniformFrameData::SIZE, 192);
    }

    #[test]
    fn test_uniform_alignment() {
        // Mat4 requires 16-byte alignment
        assert_eq!(std::mem::align_of::<UniformFrameData>(), 16);
    }

    #[test]
    fn test_uniform_field_offsets() {
        use std::mem::offset_of;

        assert_eq!(offset_of!(UniformFrameData, model), 0);
        assert_eq!(offset_of!(UniformFrameData, view), 64);
        assert_eq!(offset_of!(UniformFrameData, proj), 128);
    }

    #[test]
    fn test_uniform_at_time_zero() {
        let camera = Camera::default();
        let data = UniformFrameData::new(&camera, 0.0, 800, 600);

        assert_eq!(data.model, Mat4::IDENTITY);
        assert_eq!(data.view, camera.view_matrix());
        assert_eq!(data.proj, camera.projection_matrix(800, 600));
        assert!(data.proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_uniform_model_spins() {
        let camera = Camera::default();
        let data = UniformFrameData::new(&camera, 2.0, 800, 600);

        // Half a turn after two seconds
        let rotated = data.model.transform_point3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::NEG_X, 1e-5));
    }

    #[test]
    fn test_uniform_bytes_round_trip() {
        let camera = Camera::default();
        let data = UniformFrameData::new(&camera, 0.5, 1280, 720);

        let bytes = data.as_bytes().to_vec();
        assert_eq!(bytes.len(), UniformFrameData::SIZE);

        let back: UniformFrameData = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(back, data);
    }
}
