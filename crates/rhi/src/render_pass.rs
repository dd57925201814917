//! Render pass and framebuffers.
//!
//! One subpass draws into a color and a depth attachment. With MSAA the color
//! attachment is a multisampled offscreen image and a third attachment
//! resolves it into the swapchain image:
//!
//! | index | single-sample          | multisampled              |
//! |-------|------------------------|---------------------------|
//! | 0     | swapchain, PRESENT_SRC | MSAA color, COLOR_ATT     |
//! | 1     | depth                  | depth                     |
//! | 2     |                        | swapchain resolve, PRESENT_SRC |
//!
//! Framebuffers must list their views in the same order, see
//! [`framebuffer_attachments`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;

/// Background color the pass clears to.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
/// Depth the pass clears to.
pub const CLEAR_DEPTH: f32 = 1.0;

/// Whether `samples` needs a resolve attachment.
#[inline]
pub fn is_multisampled(samples: vk::SampleCountFlags) -> bool {
    samples != vk::SampleCountFlags::TYPE_1
}

/// Attachment descriptions, indexed as in the module table.
pub fn attachment_descriptions(
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Vec<vk::AttachmentDescription> {
    let multisampled = is_multisampled(samples);

    let color = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(if multisampled {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::PRESENT_SRC_KHR
        });

    let depth = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let mut attachments = vec![color, depth];

    if multisampled {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        );
    }

    attachments
}

/// Orders framebuffer views to match [`attachment_descriptions`].
///
/// `color_target` is the MSAA color view and must be present exactly when the
/// pass is multisampled.
pub fn framebuffer_attachments(
    swapchain_view: vk::ImageView,
    depth_view: vk::ImageView,
    color_target: Option<vk::ImageView>,
) -> Vec<vk::ImageView> {
    match color_target {
        Some(color_view) => vec![color_view, depth_view, swapchain_view],
        None => vec![swapchain_view, depth_view],
    }
}

/// Dependency on earlier work touching the attachments.
pub fn external_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
}

/// Clear values for every attachment that is cleared on load.
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: CLEAR_DEPTH,
                stencil: 0,
            },
        },
    ]
}

/// Vulkan render pass wrapper.
pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    color_format: vk::Format,
    samples: vk::SampleCountFlags,
}

impl RenderPass {
    /// Creates the single-subpass forward pass.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        let attachments = attachment_descriptions(color_format, depth_format, samples);

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let resolve_refs = [vk::AttachmentReference {
            attachment: 2,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);
        if is_multisampled(samples) {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }

        let subpasses = [subpass];
        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        info!(
            "Render pass created: color {:?}, depth {:?}, {:?}",
            color_format, depth_format, samples
        );

        Ok(Self {
            device,
            render_pass,
            color_format,
            samples,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Color format the pass was built for.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Sample count the pass was built for.
    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    /// Whether this pass can render into a swapchain of `format` at `samples`.
    pub fn is_compatible(&self, format: vk::Format, samples: vk::SampleCountFlags) -> bool {
        self.color_format == format && self.samples == samples
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Destroyed render pass");
    }
}

/// Vulkan framebuffer wrapper.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a framebuffer of `extent` over `attachments`.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}
