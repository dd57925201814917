//! Synchronization primitives for Vulkan.
//!
//! - [`Semaphore`] orders work between queue operations (acquire, render,
//!   present).
//! - [`Fence`] lets the host wait for submitted work, which gates reuse of a
//!   frame slot's command buffer and uniform buffer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_rhi::device::Device;
//! use tessera_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), tessera_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//!
//! // Created signaled so the first wait returns immediately
//! let in_flight = Fence::new(device, true)?;
//!
//! in_flight.wait(u64::MAX)?;
//! in_flight.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore wrapper.
///
/// Created unsignaled. Only the GPU signals and waits on it.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// Pass `signaled = true` for fences that are waited on before the first
    /// submission that signals them.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    ///
    /// A timeout surfaces as `RhiError::VulkanError(vk::Result::TIMEOUT)`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking status query.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        debug!("Destroyed fence");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }
}
