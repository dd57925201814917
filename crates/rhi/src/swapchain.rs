//! Swapchain management.
//!
//! [`Swapchain`] wraps VkSwapchainKHR and the views of its images. It is never
//! resized in place: when the surface changes, the owner drops the whole
//! swapchain generation and builds a new one.
//!
//! Acquire and present results are folded into [`AcquireOutcome`] and
//! [`PresentOutcome`], so "surface incompatible" is an ordinary value and only
//! unexpected failures surface as errors.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::create_image_view;

/// Surface format requested when the surface offers it.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Result of acquiring a swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired and the image-available semaphore will signal.
    Ready {
        /// Index into the swapchain images.
        image_index: u32,
        /// The swapchain still works but no longer matches the surface.
        suboptimal: bool,
    },
    /// The swapchain can no longer be used. Nothing was signaled.
    OutOfDate,
}

impl AcquireOutcome {
    /// Folds a raw `vkAcquireNextImageKHR` result.
    pub fn from_result(result: Result<(u32, bool), vk::Result>) -> RhiResult<Self> {
        match result {
            Ok((image_index, suboptimal)) => Ok(Self::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }
}

/// Result of presenting a swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented against an up-to-date swapchain.
    Presented,
    /// Presented, but the swapchain should be recreated.
    Suboptimal,
    /// The swapchain no longer matches the surface.
    OutOfDate,
}

impl PresentOutcome {
    /// Folds a raw `vkQueuePresentKHR` result.
    pub fn from_result(result: Result<bool, vk::Result>) -> RhiResult<Self> {
        match result {
            Ok(false) => Ok(Self::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(Self::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    /// Whether the swapchain has to be rebuilt before the next frame.
    #[inline]
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Vulkan swapchain wrapper.
///
/// Owns the swapchain handle and one image view per swapchain image. The
/// images themselves belong to the swapchain.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a swapchain sized for a `width`x`height` drawable.
    ///
    /// Format, present mode, extent and image count are negotiated against the
    /// surface with [`choose_surface_format`], [`choose_present_mode`],
    /// [`choose_extent`] and [`determine_image_count`].
    pub fn new(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance, device.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            RhiError::SwapchainError("Surface reports no formats".to_string())
        })?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        if !is_renderable_extent(extent) {
            return Err(RhiError::SwapchainError(format!(
                "Cannot create a {}x{} swapchain",
                extent.width, extent.height
            )));
        }

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        // Graphics and present share one family, so the images stay exclusive
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let mut this = Self {
            device,
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            extent,
        };

        // From here on Drop cleans up whatever was created
        this.images = unsafe { this.swapchain_loader.get_swapchain_images(swapchain)? };
        for &image in &this.images {
            let view = create_image_view(
                &this.device,
                image,
                this.format,
                vk::ImageAspectFlags::COLOR,
                1,
            )?;
            this.image_views.push(view);
        }

        info!("Swapchain created with {} images", this.images.len());
        Ok(this)
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Waits with an infinite timeout.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        AcquireOutcome::from_result(result)
    }

    /// Queues `image_index` for presentation once `wait_semaphore` signals.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        PresentOutcome::from_result(result)
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns all image views, indexed like the swapchain images.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();

        unsafe {
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Chooses the surface format.
///
/// Prefers [`PREFERRED_SURFACE_FORMAT`], otherwise the first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == PREFERRED_SURFACE_FORMAT.format
            && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return Some(format);
    }

    let first = formats.first().copied()?;
    warn!(
        "Using first available surface format: {:?} / {:?}",
        first.format, first.color_space
    );
    Some(first)
}

/// Chooses the present mode: MAILBOX when available, otherwise FIFO.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    // FIFO support is guaranteed
    debug!("Selected FIFO present mode");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent when defined. A width of `u32::MAX`
/// means the window decides, so the drawable size is clamped per axis into
/// the surface's min/max extents.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (requested: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        width,
        height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Queries the surface and resolves the extent a new swapchain would get.
pub fn surface_extent(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    width: u32,
    height: u32,
) -> RhiResult<vk::Extent2D> {
    let capabilities = unsafe {
        surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
    };
    Ok(choose_extent(&capabilities, width, height))
}

/// A swapchain cannot be created with a zero dimension, which is what a
/// minimized window reports.
#[inline]
pub fn is_renderable_extent(extent: vk::Extent2D) -> bool {
    extent.width > 0 && extent.height > 0
}

/// One more image than the minimum, clamped to the maximum when it is set.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    // A max_image_count of 0 means no limit
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undefined_extent_caps(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            PREFERRED_SURFACE_FORMAT,
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::A2B10G10R10_UNORM_PACK32,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];

        let selected = choose_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::A2B10G10R10_UNORM_PACK32);
    }

    #[test]
    fn test_choose_surface_format_empty() {
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_minimized_surface_extent_is_not_renderable() {
        // Minimized windows on Windows report a defined 0x0 current extent
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            min_image_extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 1280, 720);
        assert!(!is_renderable_extent(extent));

        assert!(is_renderable_extent(vk::Extent2D {
            width: 1,
            height: 1
        }));
        assert!(!is_renderable_extent(vk::Extent2D {
            width: 640,
            height: 0
        }));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = undefined_extent_caps((100, 100), (2000, 2000));

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((extent.width, extent.height), (2000, 2000));

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!((extent.width, extent.height), (100, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_choose_extent_clamps_each_axis_independently() {
        let capabilities = undefined_extent_caps((64, 32), (1024, 512));

        let extent = choose_extent(&capabilities, 4000, 1);
        assert_eq!((extent.width, extent.height), (1024, 32));
    }

    #[test]
    fn test_choose_extent_always_within_bounds() {
        let min = (16, 8);
        let max = (1280, 720);
        let capabilities = undefined_extent_caps(min, max);

        for width in (0..3000).step_by(97) {
            for height in (0..2000).step_by(89) {
                let extent = choose_extent(&capabilities, width, height);
                assert!((min.0..=max.0).contains(&extent.width));
                assert!((min.1..=max.1).contains(&extent.height));
            }
        }
    }

    #[test]
    fn test_determine_image_count() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 2);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }

    #[test]
    fn test_acquire_outcome_from_result() {
        assert_eq!(
            AcquireOutcome::from_result(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            AcquireOutcome::from_result(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: true
            }
        );
        assert_eq!(
            AcquireOutcome::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            AcquireOutcome::from_result(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_present_outcome_from_result() {
        let presented = PresentOutcome::from_result(Ok(false)).unwrap();
        assert_eq!(presented, PresentOutcome::Presented);
        assert!(!presented.needs_recreate());

        let suboptimal = PresentOutcome::from_result(Ok(true)).unwrap();
        assert_eq!(suboptimal, PresentOutcome::Suboptimal);
        assert!(suboptimal.needs_recreate());

        assert_eq!(
            PresentOutcome::from_result(Err(vk::Result::SUBOPTIMAL_KHR)).unwrap(),
            PresentOutcome::Suboptimal
        );

        let out_of_date =
            PresentOutcome::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap();
        assert!(out_of_date.needs_recreate());

        assert!(PresentOutcome::from_result(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }
}
