//! Descriptor set management.
//!
//! The renderer uses a single set layout:
//!
//! | binding | type                   | stage    |
//! |---------|------------------------|----------|
//! | 0       | uniform buffer         | vertex   |
//! | 1       | combined image sampler | fragment |
//!
//! One set is allocated per frame slot, so [`frame_pool_sizes`] scales the
//! pool with the number of frames in flight.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_rhi::device::Device;
//! use tessera_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, frame_bindings, frame_pool_sizes};
//!
//! # fn example(device: Arc<Device>) -> Result<(), tessera_rhi::RhiError> {
//! let layout = DescriptorSetLayout::new(device.clone(), &frame_bindings())?;
//! let pool = DescriptorPool::new(device.clone(), 2, &frame_pool_sizes(2))?;
//! let sets = pool.allocate(&[layout.handle(), layout.handle()])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Binding index of the per-frame uniform buffer.
pub const UNIFORM_BINDING: u32 = 0;
/// Binding index of the texture sampler.
pub const TEXTURE_BINDING: u32 = 1;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a descriptor set layout from the given bindings.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Descriptor pool wrapper.
///
/// Sets allocated from the pool are released together with it.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Creates a pool able to hold `max_sets` sets drawn from `pool_sizes`.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocates one descriptor set per entry in `layouts`.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the maximum number of sets.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Layout bindings for the per-frame set.
pub fn frame_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        DescriptorBindingBuilder::uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX),
        DescriptorBindingBuilder::combined_image_sampler(
            TEXTURE_BINDING,
            vk::ShaderStageFlags::FRAGMENT,
        ),
    ]
}

/// Pool sizes for `frame_count` per-frame sets.
pub fn frame_pool_sizes(frame_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(frame_count),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(frame_count),
    ]
}

/// Points a per-frame set at its uniform buffer and the shared texture.
pub fn write_frame_set(
    device: &Device,
    set: vk::DescriptorSet,
    uniform: vk::DescriptorBufferInfo,
    texture: vk::DescriptorImageInfo,
) {
    let buffer_infos = [uniform];
    let image_infos = [texture];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(TEXTURE_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos),
    ];

    unsafe {
        device.handle().update_descriptor_sets(&writes, &[]);
    }

    debug!("Updated frame descriptor set");
}

/// Creates a [`vk::DescriptorBufferInfo`].
#[inline]
pub fn buffer_info(
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)
}

/// Creates a [`vk::DescriptorImageInfo`].
#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

/// Shorthand constructors for single-descriptor layout bindings.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    /// A single uniform buffer.
    #[inline]
    pub fn uniform_buffer(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }

    /// A single combined image sampler.
    #[inline]
    pub fn combined_image_sampler(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_binding_builder_uniform_buffer() {
        let binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_descriptor_binding_builder_combined_image_sampler() {
        let binding =
            DescriptorBindingBuilder::combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.binding, 2);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_frame_bindings_layout() {
        let [uniform, texture] = frame_bindings();

        assert_eq!(uniform.binding, 0);
        assert_eq!(uniform.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(uniform.stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(texture.binding, 1);
        assert_eq!(
            texture.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(texture.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_frame_pool_sizes_scale_with_frames() {
        for frames in 1..=3 {
            let sizes = frame_pool_sizes(frames);
            assert!(sizes.iter().all(|size| size.descriptor_count == frames));
        }
    }

    #[test]
    fn test_buffer_info_helper() {
        let info = buffer_info(vk::Buffer::null(), 64, 128);
        assert_eq!(info.buffer, vk::Buffer::null());
        assert_eq!(info.offset, 64);
        assert_eq!(info.range, 128);
    }

    #[test]
    fn test_image_info_helper() {
        let info = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(info.sampler, vk::Sampler::null());
        assert_eq!(info.image_view, vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
