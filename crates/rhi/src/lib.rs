//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides thin RAII wrappers over Vulkan using the `ash` crate.
//! Every wrapper holds an `Arc<Device>` and destroys its handle on drop.
//! It handles:
//! - Instance creation, physical device scoring and logical device creation
//! - Swapchain negotiation and acquire/present outcomes
//! - Command pools, one-time submissions and command recording
//! - Buffers, images, textures with mipmaps, and samplers
//! - Render passes, framebuffers, descriptors and the graphics pipeline
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
