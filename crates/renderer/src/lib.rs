//! Rendering orchestration.
//!
//! This crate ties the Vulkan wrappers together:
//! - [`RenderContext`] owns every GPU object and knows how to draw a frame
//! - [`SwapchainGeneration`] groups the swapchain with its sized targets
//! - [`FrameLoop`] sequences acquire, record, submit and present over N slots
//! - [`Renderer`] pairs the two for the application

pub mod context;
pub mod frame;
pub mod frame_loop;
pub mod renderer;
pub mod targets;
pub mod ubo;

pub use context::RenderContext;
pub use frame::FrameSlot;
pub use frame_loop::{FrameBackend, FrameLoop, FrameStatus, RecreateOutcome};
pub use renderer::Renderer;
pub use targets::SwapchainGeneration;
pub use ubo::UniformFrameData;
