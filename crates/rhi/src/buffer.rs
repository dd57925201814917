//! GPU buffer management.
//!
//! - [`BufferUsage`] decides the Vulkan usage flags and the memory location.
//! - [`Buffer`] wraps VkBuffer plus its gpu-allocator allocation.
//!
//! Every buffer is created, its memory requirements queried, memory allocated
//! and then bound, in that order. Host-visible buffers (uniform, staging) stay
//! persistently mapped. Vertex and index buffers live in device-local memory
//! and are filled through a staging buffer with
//! [`Buffer::device_local_with_data`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_rhi::buffer::{Buffer, BufferUsage};
//! use tessera_rhi::command::CommandPool;
//! use tessera_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), tessera_rhi::RhiError> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let index_buffer = Buffer::device_local_with_data(
//!     device,
//!     pool,
//!     BufferUsage::Index,
//!     bytemuck::cast_slice(&indices),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer, device-local
    Vertex,
    /// Index buffer, device-local
    Index,
    /// Uniform buffer, host-visible and rewritten every frame
    Uniform,
    /// Staging buffer, host-visible source of a transfer
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Whether buffers of this type are mapped and writable from the host.
    pub fn is_host_visible(self) -> bool {
        self.memory_location() != MemoryLocation::GpuOnly
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// Checks that `len` bytes at `offset` fit into a buffer of `size` bytes.
pub fn check_write_range(
    size: vk::DeviceSize,
    offset: vk::DeviceSize,
    len: usize,
) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::ResourceError(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        ))),
    }
}

/// GPU buffer wrapper with managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    /// Taken in `Drop` to hand back to the allocator.
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer of `size` bytes.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::ResourceError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.lock_allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: usage.memory_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // Owned from here on, so Drop releases both halves on failure
        let this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };

        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(this)
    }

    /// Creates a host-visible buffer and copies `data` into it.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer filled with `data`.
    ///
    /// `data` goes into a staging buffer first, a one-time command copies it
    /// across, and the staging buffer is released as soon as the copy has
    /// completed.
    pub fn device_local_with_data(
        device: Arc<Device>,
        pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;

        let staging = Self::new_with_data(device.clone(), BufferUsage::Staging, data)?;
        let buffer = Self::new(device.clone(), usage, size)?;

        pool.one_time_submit(device.graphics_queue(), |cmd| {
            let region = vk::BufferCopy::default().size(size);
            cmd.copy_buffer(staging.handle(), buffer.handle(), &[region]);
            Ok(())
        })?;

        drop(staging);
        debug!(
            "Uploaded {} bytes into device-local {} buffer",
            size,
            usage.name()
        );

        Ok(buffer)
    }

    /// Writes `data` at `offset` through the persistent mapping.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_range(self.size, offset, data.len())?;

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::ResourceError("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::ResourceError("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Leaking buffer allocation: {}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}
