//! Command pool and command buffer management.
//!
//! - [`CommandPool`] owns a VkCommandPool and hands out primary command
//!   buffers. [`CommandPool::one_time_submit`] records, submits and waits for
//!   a throwaway buffer, which is how staging uploads reach the GPU.
//! - [`CommandBuffer`] wraps a VkCommandBuffer with recording helpers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_rhi::device::Device;
//! use tessera_rhi::command::{CommandBuffer, CommandPool};
//!
//! # fn example(device: Arc<Device>) -> Result<(), tessera_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.queue_family())?;
//! let cmd = CommandBuffer::new(device.clone(), &pool)?;
//!
//! cmd.begin()?;
//! // ... record rendering commands ...
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::Fence;

/// Vulkan command pool wrapper.
///
/// Created with `RESET_COMMAND_BUFFER` so each frame slot can reset its own
/// buffer without touching the others.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a new command pool for the specified queue family.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        info!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the queue family index this pool belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates a primary command buffer from this pool.
    pub fn allocate_command_buffer(&self) -> RhiResult<vk::CommandBuffer> {
        self.allocate_command_buffers(1)?
            .pop()
            .ok_or_else(|| RhiError::ResourceError("No command buffer allocated".to_string()))
    }

    /// Allocates `count` primary command buffers from this pool.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        Ok(buffers)
    }

    /// Records `record` into a fresh command buffer, submits it to `queue` and
    /// blocks until it completes.
    ///
    /// The buffer is freed before returning, whether or not recording
    /// succeeded.
    pub fn one_time_submit<F>(&self, queue: vk::Queue, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        let handle = self.allocate_command_buffer()?;
        let cmd = CommandBuffer::from_handle(self.device.clone(), handle);

        let result = self.record_and_wait(queue, &cmd, record);

        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &[handle]);
        }

        result
    }

    fn record_and_wait<F>(&self, queue: vk::Queue, cmd: &CommandBuffer, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        cmd.begin()?;
        record(cmd)?;
        cmd.end()?;

        let fence = Fence::new(self.device.clone(), false)?;
        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            self.device
                .handle()
                .queue_submit(queue, &[submit_info], fence.handle())?;
        }
        fence.wait(u64::MAX)?;

        debug!("One-time command buffer completed");
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Vulkan command buffer wrapper.
///
/// Does not own the handle. The buffer is freed with its [`CommandPool`].
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Allocates a new command buffer from the given pool.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let buffer = pool.allocate_command_buffer()?;
        Ok(Self { device, buffer })
    }

    /// Wraps an existing command buffer handle.
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    /// Returns the raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begins recording for a single submission.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }

        Ok(())
    }

    /// Ends recording. The buffer is then ready for submission.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }

        Ok(())
    }

    /// Resets the command buffer to its initial state.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }

        Ok(())
    }

    // =========================================================================
    // Render Pass
    // =========================================================================

    /// Begins a render pass with inline subpass contents.
    pub fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// Ends the current render pass.
    pub fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Binds a graphics pipeline.
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Binds vertex buffers starting at `first_binding`.
    pub fn bind_vertex_buffers(
        &self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device.handle().cmd_bind_vertex_buffers(
                self.buffer,
                first_binding,
                buffers,
                offsets,
            );
        }
    }

    /// Binds an index buffer.
    pub fn bind_index_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, offset, index_type);
        }
    }

    /// Binds descriptor sets for the graphics bind point.
    pub fn bind_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    // =========================================================================
    // Dynamic State
    // =========================================================================

    /// Sets viewport 0.
    pub fn set_viewport(&self, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, std::slice::from_ref(viewport));
        }
    }

    /// Sets scissor 0.
    pub fn set_scissor(&self, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .handle()
                .cmd_set_scissor(self.buffer, 0, std::slice::from_ref(scissor));
        }
    }

    // =========================================================================
    // Drawing Commands
    // =========================================================================

    /// Issues an indexed draw command.
    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.handle().cmd_draw_indexed(
                self.buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Inserts a pipeline barrier with image barriers only.
    pub fn pipeline_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                self.buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            );
        }
    }

    // =========================================================================
    // Copy Commands
    // =========================================================================

    /// Copies data between buffers.
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.buffer, src, dst, regions);
        }
    }

    /// Copies data from a buffer to an image.
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                dst_layout,
                regions,
            );
        }
    }

    /// Blits (scaled copy) between images.
    pub fn blit_image(
        &self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device.handle().cmd_blit_image(
                self.buffer,
                src,
                src_layout,
                dst,
                dst_layout,
                regions,
                filter,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }
}
