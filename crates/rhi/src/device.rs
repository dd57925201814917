//! Vulkan logical device and queue management.
//!
//! [`Device`] owns the logical device, the single graphics+present queue and
//! the gpu-allocator instance. Every other RHI object keeps an `Arc<Device>`,
//! so the device is destroyed only after the last of them.
//!
//! # Example
//!
//! ```no_run
//! use tessera_rhi::device::Device;
//! use tessera_rhi::instance::Instance;
//! use tessera_rhi::physical_device::{DeviceRequirements, select_physical_device};
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let physical_device_info = select_physical_device(
//!     instance.handle(),
//!     surface,
//!     &surface_loader,
//!     &DeviceRequirements::default(),
//!     64,
//! )
//! .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &physical_device_info)
//!     .expect("Failed to create logical device");
//! let queue = device.graphics_queue();
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
///
/// Shared through `Arc`. The allocator sits behind a `Mutex`.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Instance function table, used for physical device queries.
    instance: ash::Instance,
    /// Selected physical device and its properties.
    physical_device: PhysicalDeviceInfo,
    /// GPU memory allocator. Dropped before the device in `Drop`.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Queue used for graphics, transfer and presentation.
    graphics_queue: vk::Queue,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// One queue is created from the combined graphics+present family. The
    /// swapchain extension and sampler anisotropy are enabled.
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.queue_family)
            .queue_priorities(&queue_priorities)];

        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(physical_device.features.sampler_anisotropy == vk::TRUE);

        let extension_names: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            REQUIRED_DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(physical_device.queue_family, 0) };
        debug!(
            "Graphics/present queue retrieved from family {}",
            physical_device.queue_family
        );

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: physical_device.clone(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.device
    }

    /// Returns what was recorded about the physical device at selection.
    #[inline]
    pub fn physical_device_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Presentation uses the graphics queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the graphics+present queue family index.
    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.physical_device.queue_family
    }

    /// Returns the MSAA sample count chosen at device selection.
    #[inline]
    pub fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.physical_device.msaa_samples
    }

    /// Locks the allocator, reporting a poisoned lock as an error.
    pub fn lock_allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::ResourceError("GPU allocator lock poisoned".to_string()))
    }

    /// Format capabilities of the physical device.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// Waits for the device to become idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The command buffers must be fully recorded and the fence (if any) must
    /// be unsignaled and not in use by another submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // Allocator memory blocks are freed through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device and ash::Instance are function tables, the remaining
// fields are plain handles or data, and the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_extension_required() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
