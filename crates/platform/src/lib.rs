//! Platform layer for tessera.
//!
//! - Window creation via winit
//! - Raw window handles and Vulkan surface creation

mod window;

pub use window::{Surface, Window};

// Re-export winit types the application needs
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
