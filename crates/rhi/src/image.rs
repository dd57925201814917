//! GPU image management.
//!
//! [`GpuImage`] is a 2D image, its gpu-allocator allocation and one view over
//! all of its mip levels. Creation follows the same order as buffers: create,
//! query requirements, allocate, bind, then create the view.
//!
//! The free functions cover the image math and format queries the renderer
//! needs: mip chain sizes, supported-format search and the layout transition
//! table used while uploading textures.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Parameters for [`GpuImage::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    /// Aspect of the view created alongside the image.
    pub aspect: vk::ImageAspectFlags,
}

/// Device-local 2D image with a view.
pub struct GpuImage {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
}

impl GpuImage {
    /// Creates an optimally tiled image in GPU-only memory.
    pub fn new(device: Arc<Device>, desc: &ImageDesc, name: &str) -> RhiResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::ResourceError(format!(
                "Image '{}' dimensions must be greater than 0",
                name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(desc.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.lock_allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // Drop cleans up from here, the null view is skipped by Vulkan
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            mip_levels: desc.mip_levels,
        };

        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        this.view = create_image_view(
            &this.device,
            image,
            desc.format,
            desc.aspect,
            desc.mip_levels,
        )?;

        debug!(
            "Created image '{}': {}x{}, {} mip(s), {:?}, {:?}",
            name, desc.width, desc.height, desc.mip_levels, desc.samples, desc.format
        );

        Ok(this)
    }

    /// Returns the image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the view over every mip level.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the size of mip level 0.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free image allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Leaking image allocation: {}", e),
            }
        }

        debug!(
            "Destroyed image: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

/// Creates a 2D view covering `mip_levels` levels of `image`.
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(color_or_depth_range(aspect, 0, mip_levels));

    let view = unsafe { device.handle().create_image_view(&view_info, None)? };
    Ok(view)
}

/// Subresource range over `level_count` mips starting at `base_mip_level`.
pub fn color_or_depth_range(
    aspect: vk::ImageAspectFlags,
    base_mip_level: u32,
    level_count: u32,
) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(base_mip_level)
        .level_count(level_count)
        .base_array_layer(0)
        .layer_count(1)
}

/// Number of levels in a full mip chain: `floor(log2(max(w, h))) + 1`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Size of every level in the mip chain, level 0 first.
///
/// Each level halves the previous one per axis, never going below 1.
pub fn mip_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let levels = mip_level_count(width, height);
    let mut extents = Vec::with_capacity(levels as usize);
    let (mut w, mut h) = (width.max(1), height.max(1));

    for _ in 0..levels {
        extents.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }

    extents
}

/// First candidate whose `tiling` features contain `features`.
///
/// `properties` supplies the format properties, normally
/// [`Device::format_properties`].
pub fn find_supported_format<F>(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    mut properties: F,
) -> Option<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatProperties,
{
    candidates.iter().copied().find(|&format| {
        let props = properties(format);
        let supported = match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features,
            _ => props.optimal_tiling_features,
        };
        supported.contains(features)
    })
}

/// Picks the depth attachment format for `device`.
pub fn find_depth_format(device: &Device) -> RhiResult<vk::Format> {
    find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |format| device.format_properties(format),
    )
    .ok_or_else(|| {
        RhiError::UnsupportedFormat("No supported depth attachment format".to_string())
    })
}

/// Whether the format carries a stencil aspect.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Access masks and stages for one image layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Looks up the transition between two layouts.
    ///
    /// Only the transitions used by texture uploads are known.
    pub fn between(old: vk::ImageLayout, new: vk::ImageLayout) -> RhiResult<Self> {
        use vk::ImageLayout as L;

        let transition = match (old, new) {
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Self {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            },
            (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => Self {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::TRANSFER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            },
            (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Self {
                src_access: vk::AccessFlags::TRANSFER_READ,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            },
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Self {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            },
            _ => {
                return Err(RhiError::ResourceError(format!(
                    "Unsupported layout transition: {:?} -> {:?}",
                    old, new
                )));
            }
        };

        Ok(transition)
    }

    /// Builds the barrier for `range` of `image`.
    pub fn barrier(
        &self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
        range: vk::ImageSubresourceRange,
    ) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(1024, 768), 11);
        assert_eq!(mip_level_count(300, 17), 9);
        assert_eq!(mip_level_count(1, 4096), 13);
    }

    #[test]
    fn test_mip_level_count_matches_log2() {
        for size in [1u32, 3, 7, 8, 100, 255, 256, 257, 4000] {
            let expected = (size as f64).log2().floor() as u32 + 1;
            assert_eq!(mip_level_count(size, 1), expected, "size {}", size);
            assert_eq!(mip_level_count(1, size), expected, "size {}", size);
        }
    }

    #[test]
    fn test_mip_extents_halve_and_clamp() {
        let extents = mip_extents(8, 2);
        assert_eq!(extents, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);

        let extents = mip_extents(300, 17);
        assert_eq!(extents.len() as u32, mip_level_count(300, 17));
        for pair in extents.windows(2) {
            let (pw, ph) = pair[0];
            let (w, h) = pair[1];
            assert_eq!(w, (pw / 2).max(1));
            assert_eq!(h, (ph / 2).max(1));
        }
        assert_eq!(extents.last(), Some(&(1, 1)));
    }

    fn props(optimal: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: optimal,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_supported_format_respects_order() {
        let found = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        );
        assert_eq!(found, Some(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn test_find_supported_format_skips_unsupported() {
        let found = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| {
                if format == vk::Format::D24_UNORM_S8_UINT {
                    props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                } else {
                    props(vk::FormatFeatureFlags::empty())
                }
            },
        );
        assert_eq!(found, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_find_supported_format_checks_requested_tiling() {
        let found = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::LINEAR,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_has_stencil_component() {
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_texture_upload_transitions() {
        use vk::ImageLayout as L;

        let upload = LayoutTransition::between(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(upload.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(upload.dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let to_src =
            LayoutTransition::between(L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL).unwrap();
        assert_eq!(to_src.dst_access, vk::AccessFlags::TRANSFER_READ);

        let to_shader =
            LayoutTransition::between(L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL)
                .unwrap();
        assert_eq!(to_shader.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let last_level =
            LayoutTransition::between(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL)
                .unwrap();
        assert_eq!(last_level.src_access, vk::AccessFlags::TRANSFER_WRITE);
    }

    #[test]
    fn test_unknown_transition_is_error() {
        assert!(
            LayoutTransition::between(
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::UNDEFINED
            )
            .is_err()
        );
    }

    #[test]
    fn test_barrier_carries_layouts_and_range() {
        let range = color_or_depth_range(vk::ImageAspectFlags::COLOR, 3, 1);
        let transition = LayoutTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
        .unwrap();
        let barrier = transition.barrier(
            vk::Image::null(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            range,
        );

        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(barrier.subresource_range.base_mip_level, 3);
        assert_eq!(barrier.subresource_range.level_count, 1);
    }
}
