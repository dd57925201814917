//! Swapchain generations and their render targets.
//!
//! A [`SwapchainGeneration`] owns everything whose size or format follows the
//! surface: the swapchain and its views, the depth target, the optional MSAA
//! color target and one framebuffer per swapchain image. A generation is
//! replaced wholesale; nothing in it outlives the swapchain it was built for.
//!
//! # Resource Destruction
//!
//! Fields drop in declaration order:
//! 1. Framebuffers
//! 2. Depth target
//! 3. MSAA color target
//! 4. Swapchain image views, then the swapchain

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use tessera_rhi::RhiResult;
use tessera_rhi::device::Device;
use tessera_rhi::image::{GpuImage, ImageDesc};
use tessera_rhi::render_pass::{
    Framebuffer, RenderPass, framebuffer_attachments, is_multisampled,
};
use tessera_rhi::swapchain::Swapchain;

/// Describes the depth attachment for a `extent` target.
pub fn depth_target_desc(
    extent: vk::Extent2D,
    format: vk::Format,
    samples: vk::SampleCountFlags,
) -> ImageDesc {
    ImageDesc {
        width: extent.width,
        height: extent.height,
        mip_levels: 1,
        samples,
        format,
        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        aspect: vk::ImageAspectFlags::DEPTH,
    }
}

/// Describes the multisampled color attachment that resolves into the
/// swapchain image.
pub fn color_target_desc(
    extent: vk::Extent2D,
    format: vk::Format,
    samples: vk::SampleCountFlags,
) -> ImageDesc {
    ImageDesc {
        width: extent.width,
        height: extent.height,
        mip_levels: 1,
        samples,
        format,
        usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
        aspect: vk::ImageAspectFlags::COLOR,
    }
}

/// One swapchain plus every object sized to it.
pub struct SwapchainGeneration {
    framebuffers: Vec<Framebuffer>,
    depth: GpuImage,
    color: Option<GpuImage>,
    swapchain: Swapchain,
}

impl SwapchainGeneration {
    /// Builds the targets and framebuffers for `swapchain`.
    ///
    /// `render_pass` must be compatible with the swapchain format. The MSAA
    /// color target exists only when the pass is multisampled.
    pub fn new(
        device: Arc<Device>,
        swapchain: Swapchain,
        render_pass: &RenderPass,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let extent = swapchain.extent();
        let samples = render_pass.samples();

        let color = if is_multisampled(samples) {
            let desc = color_target_desc(extent, swapchain.format(), samples);
            Some(GpuImage::new(device.clone(), &desc, "msaa color target")?)
        } else {
            None
        };

        let depth = GpuImage::new(
            device.clone(),
            &depth_target_desc(extent, depth_format, samples),
            "depth target",
        )?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                let attachments = framebuffer_attachments(
                    view,
                    depth.view(),
                    color.as_ref().map(GpuImage::view),
                );
                Framebuffer::new(device.clone(), render_pass, &attachments, extent)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Swapchain generation ready: {}x{}, {} framebuffers, {:?}",
            extent.width,
            extent.height,
            framebuffers.len(),
            samples
        );

        Ok(Self {
            framebuffers,
            depth,
            color,
            swapchain,
        })
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Framebuffer for swapchain image `image_index`.
    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }

    #[inline]
    pub fn depth_target(&self) -> &GpuImage {
        &self.depth
    }

    #[inline]
    pub fn color_target(&self) -> Option<&GpuImage> {
        self.color.as_ref()
    }
}

impl Drop for SwapchainGeneration {
    fn drop(&mut self) {
        debug!(
            "Destroying swapchain generation ({} framebuffers)",
            self.framebuffers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_depth_target_desc() {
        let desc = depth_target_desc(
            extent(),
            vk::Format::D32_SFLOAT,
            vk::SampleCountFlags::TYPE_4,
        );

        assert_eq!((desc.width, desc.height), (640, 480));
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(desc.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_color_target_desc_matches_swapchain_format() {
        let desc = color_target_desc(
            extent(),
            vk::Format::B8G8R8A8_SRGB,
            vk::SampleCountFlags::TYPE_8,
        );

        assert_eq!(desc.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(desc.samples, vk::SampleCountFlags::TYPE_8);
        assert!(desc.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSIENT_ATTACHMENT));
        assert_eq!(desc.aspect, vk::ImageAspectFlags::COLOR);
    }
}
