//! Main renderer orchestration.
//!
//! [`Renderer`] pairs a [`RenderContext`] with the [`FrameLoop`] that drives
//! it, and is what the application talks to.

use tracing::{debug, info};

use tessera_core::RendererConfig;
use tessera_platform::Window;
use tessera_rhi::RhiResult;

use crate::context::RenderContext;
use crate::frame_loop::{FrameLoop, FrameStatus};

/// Renders the configured model into a window.
pub struct Renderer {
    frame_loop: FrameLoop,
    context: RenderContext,
}

impl Renderer {
    /// Creates a new renderer for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation or asset load fails.
    pub fn new(window: &Window, config: &RendererConfig) -> RhiResult<Self> {
        let context = RenderContext::new(window, config)?;
        let frame_loop = FrameLoop::new(context.frame_count());

        info!(
            "Renderer ready with {} frames in flight",
            frame_loop.frames_in_flight()
        );

        Ok(Self {
            frame_loop,
            context,
        })
    }

    /// Handles a window resize.
    ///
    /// A zero size pauses rendering. Otherwise the swapchain is recreated
    /// before the next frame is acquired.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("Resize requested: {}x{}", width, height);
        if width > 0 && height > 0 {
            self.context.set_drawable_size(width, height);
        }
        self.frame_loop.notify_resized(width, height);
    }

    /// Renders one frame.
    ///
    /// # Errors
    ///
    /// Out-of-date and suboptimal swapchains are handled internally. Any other
    /// Vulkan error is returned and should be treated as fatal.
    pub fn render_frame(&mut self) -> RhiResult<FrameStatus> {
        self.frame_loop.run_frame(&mut self.context)
    }

    /// Whether rendering is paused for a zero-sized surface.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.frame_loop.is_paused()
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frame_loop.frames_submitted()
    }

    #[inline]
    pub fn swapchain_recreations(&self) -> u64 {
        self.frame_loop.recreations()
    }

    #[inline]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        info!(
            "Renderer shutting down: {} frames rendered, {} swapchain recreations",
            self.frame_loop.frames_submitted(),
            self.frame_loop.recreations()
        );
    }
}
