//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No physical device passed scoring with a graphics+present queue
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required format or format feature is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Failed to load or convert an asset feeding a GPU resource
    #[error("Resource error: {0}")]
    ResourceError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
