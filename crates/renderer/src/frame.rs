//! Per-frame resources.
//!
//! Each frame in flight owns a [`FrameSlot`], so the CPU can record frame
//! N+1 while the GPU still renders frame N.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on in_flight (CPU waits for the previous use of this slot)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Write the uniform buffer, record the command buffer
//! 4. Submit:
//!    - wait on image_available at COLOR_ATTACHMENT_OUTPUT
//!    - signal render_finished
//!    - signal in_flight
//! 5. Present (waits on render_finished)
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use tessera_rhi::{RhiError, RhiResult};
use tessera_rhi::buffer::{Buffer, BufferUsage};
use tessera_rhi::command::{CommandBuffer, CommandPool};
use tessera_rhi::device::Device;
use tessera_rhi::sync::{Fence, Semaphore};

use crate::ubo::UniformFrameData;

/// Resources used by one frame in flight.
pub struct FrameSlot {
    /// Command buffer re-recorded every time the slot is used.
    command_buffer: CommandBuffer,
    /// Signaled when the acquired swapchain image is ready.
    image_available: Semaphore,
    /// Signaled when rendering is complete.
    render_finished: Semaphore,
    /// Signaled when the slot's submission has finished executing.
    in_flight: Fence,
    /// Persistently mapped uniform buffer.
    uniform_buffer: Buffer,
    /// Set pointing at `uniform_buffer` and the shared texture. Freed with
    /// its pool.
    descriptor_set: vk::DescriptorSet,
}

impl FrameSlot {
    /// Creates a slot whose fence starts signaled, so the first wait returns
    /// immediately.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        descriptor_set: vk::DescriptorSet,
    ) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device.clone(), true)?;
        let uniform_buffer = Buffer::new(
            device,
            BufferUsage::Uniform,
            UniformFrameData::SIZE as vk::DeviceSize,
        )?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
            uniform_buffer,
            descriptor_set,
        })
    }

    /// Creates `count` slots, one per descriptor set.
    pub fn create_all(
        device: &Arc<Device>,
        command_pool: &CommandPool,
        descriptor_sets: &[vk::DescriptorSet],
    ) -> RhiResult<Vec<Self>> {
        descriptor_sets
            .iter()
            .enumerate()
            .map(|(i, &set)| {
                let slot = Self::new(device.clone(), command_pool, set)?;
                debug!("Created frame slot {}", i);
                Ok(slot)
            })
            .collect()
    }

    /// Blocks until the slot's last submission has completed.
    pub fn wait(&self) -> RhiResult<()> {
        self.in_flight.wait(u64::MAX)
    }

    /// Copies `data` into the mapped uniform buffer.
    ///
    /// # Errors
    ///
    /// Fails without writing if the slot's fence has not signaled, since the
    /// GPU may still be reading the buffer.
    pub fn write_uniforms(&self, data: &UniformFrameData) -> RhiResult<()> {
        ensure_idle(self.in_flight.is_signaled())?;
        self.uniform_buffer.write_data(0, data.as_bytes())
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }

    #[inline]
    pub fn uniform_buffer(&self) -> &Buffer {
        &self.uniform_buffer
    }

    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }
}

/// Rejects CPU writes to a slot whose fence has not signaled.
fn ensure_idle(fence_signaled: bool) -> RhiResult<()> {
    if fence_signaled {
        Ok(())
    } else {
        Err(RhiError::ResourceError(
            "Frame slot is still in flight, refusing to write its uniforms".to_string(),
        ))
    }
}
