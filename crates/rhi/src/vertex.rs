//! Mesh vertex format and its vertex input description.
//!
//! [`Vertex`] compares and hashes by the bit patterns of its floats, so it
//! can key a `HashMap` when deduplicating model data. `0.0` and `-0.0` are
//! therefore distinct, and a NaN equals itself.

use std::hash::{Hash, Hasher};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Vertex with position, color and texture coordinate.
///
/// Layout (32 bytes):
///
/// | location | field     | format          | offset |
/// |----------|-----------|-----------------|--------|
/// | 0        | position  | R32G32B32_SFLOAT | 0     |
/// | 1        | color     | R32G32B32_SFLOAT | 12    |
/// | 2        | tex_coord | R32G32_SFLOAT    | 24    |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    /// Creates a new vertex.
    #[inline]
    pub const fn new(position: Vec3, color: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    fn bits(&self) -> [u32; 8] {
        let [px, py, pz] = self.position.to_array();
        let [r, g, b] = self.color.to_array();
        let [u, v] = self.tex_coord.to_array();
        [px, py, pz, r, g, b, u, v].map(f32::to_bits)
    }

    /// Vertex buffer binding 0, advanced per vertex.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attributes at locations 0 (position), 1 (color) and 2 (tex_coord).
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, tex_coord) as u32,
            },
        ]
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}
