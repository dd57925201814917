//! Window management using winit.
//!
//! The renderer only needs three things from the window: raw handles for
//! surface creation, the instance extensions those handles require, and the
//! current drawable size.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use tessera_core::{Error, Result};

/// RAII wrapper for a Vulkan surface.
///
/// The surface is destroyed when this struct is dropped. The caller must make
/// sure the Vulkan instance outlives it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Get the raw Vulkan surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader used for capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface from the
        // same instance as the loader, and is destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A winit window plus the last size reported through resize events.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Create a new resizable window with the given dimensions and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
        })
    }

    /// Size of the drawable area in physical pixels, as the swapchain sees it.
    pub fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// A zero-sized window cannot back a swapchain.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Update the stored dimensions (call this when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// The returned pointers reference static strings owned by `ash-window`.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| {
                Error::Surface(format!("Failed to enumerate required extensions: {}", e))
            })?;

        tracing::debug!(
            "Required surface extensions: {:?}",
            extensions
                .iter()
                // SAFETY: ash-window hands out valid, nul-terminated static strings.
                .map(|&ext| unsafe { CStr::from_ptr(ext) })
                .collect::<Vec<_>>()
        );

        Ok(extensions.to_vec())
    }

    /// Create a Vulkan surface for this window.
    ///
    /// `instance` must outlive the returned [`Surface`].
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid, the handles come from a live
        // winit window, and Surface::drop destroys the result.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Surface(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}
