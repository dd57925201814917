//! Sampled textures with a full mip chain.
//!
//! [`Texture::from_rgba8`] uploads decoded pixels through a staging buffer and
//! builds the mip chain on the GPU with image blits:
//!
//! 1. every level goes UNDEFINED -> TRANSFER_DST,
//! 2. the staging buffer is copied into level 0,
//! 3. each level is blitted from the previous one at half size, and moves
//!    TRANSFER_DST -> TRANSFER_SRC -> SHADER_READ_ONLY as it is consumed,
//! 4. the last level goes straight TRANSFER_DST -> SHADER_READ_ONLY.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{
    GpuImage, ImageDesc, LayoutTransition, color_or_depth_range, mip_extents, mip_level_count,
};

/// Format textures are stored in. Texels are treated as sRGB encoded.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A shader-readable texture.
pub struct Texture {
    image: GpuImage,
}

impl Texture {
    /// Uploads `pixels` (tightly packed RGBA8) as a mipmapped texture.
    ///
    /// Fails with [`RhiError::UnsupportedFormat`] when the device cannot
    /// linearly filter [`TEXTURE_FORMAT`], since mip generation blits with a
    /// linear filter.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::ResourceError(format!(
                "Texture data is {} bytes, expected {} for {}x{} RGBA8",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        let properties = device.format_properties(TEXTURE_FORMAT);
        if !supports_linear_blit(&properties) {
            return Err(RhiError::UnsupportedFormat(format!(
                "{:?} does not support linear blitting",
                TEXTURE_FORMAT
            )));
        }

        let mip_levels = mip_level_count(width, height);

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        let image = GpuImage::new(
            device.clone(),
            &ImageDesc {
                width,
                height,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
            },
            "texture",
        )?;

        pool.one_time_submit(device.graphics_queue(), |cmd| {
            let all_levels = color_or_depth_range(vk::ImageAspectFlags::COLOR, 0, mip_levels);
            transition(
                cmd,
                image.image(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                all_levels,
            )?;

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_offset(vk::Offset3D::default())
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                });
            cmd.copy_buffer_to_image(
                staging.handle(),
                image.image(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            record_mipmaps(cmd, image.image(), width, height)
        })?;

        drop(staging);

        info!(
            "Texture uploaded: {}x{}, {} mip level(s)",
            width, height, mip_levels
        );

        Ok(Self { image })
    }

    /// Returns the image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.image()
    }

    /// Returns the view over all mip levels.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }

    /// Returns the size of level 0.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// Whether blits with a linear filter can read this format.
pub fn supports_linear_blit(properties: &vk::FormatProperties) -> bool {
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
}

fn transition(
    cmd: &CommandBuffer,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    range: vk::ImageSubresourceRange,
) -> RhiResult<()> {
    let transition = LayoutTransition::between(old, new)?;
    let barrier = transition.barrier(image, old, new, range);
    cmd.pipeline_barrier(transition.src_stage, transition.dst_stage, &[barrier]);
    Ok(())
}

/// Records the blit chain. Level 0 must hold the image and every level must
/// be in TRANSFER_DST. All levels end in SHADER_READ_ONLY.
fn record_mipmaps(cmd: &CommandBuffer, image: vk::Image, width: u32, height: u32) -> RhiResult<()> {
    let extents = mip_extents(width, height);

    for (level, pair) in extents.windows(2).enumerate() {
        let src_level = level as u32;
        let dst_level = src_level + 1;
        let (src_w, src_h) = pair[0];
        let (dst_w, dst_h) = pair[1];
        let src_range = color_or_depth_range(vk::ImageAspectFlags::COLOR, src_level, 1);

        transition(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            src_range,
        )?;

        let blit = vk::ImageBlit::default()
            .src_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: src_w as i32,
                    y: src_h as i32,
                    z: 1,
                },
            ])
            .src_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(src_level)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .dst_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: dst_w as i32,
                    y: dst_h as i32,
                    z: 1,
                },
            ])
            .dst_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(dst_level)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        cmd.blit_image(
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        transition(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_range,
        )?;
    }

    let last_level = extents.len().saturating_sub(1) as u32;
    transition(
        cmd,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        color_or_depth_range(vk::ImageAspectFlags::COLOR, last_level, 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_linear_blit() {
        let supported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(supports_linear_blit(&supported));

        let linear_tiling_only = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };
        assert!(!supports_linear_blit(&linear_tiling_only));
    }

    #[test]
    fn test_texture_format_is_srgb() {
        assert_eq!(TEXTURE_FORMAT, vk::Format::R8G8B8A8_SRGB);
    }
}
