//! Graphics pipeline management.
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout.
//! - [`Pipeline`] wraps VkPipeline.
//! - [`GraphicsPipelineBuilder`] collects the fixed-function state and builds
//!   a pipeline for one subpass of a [`RenderPass`].
//!
//! The defaults match the forward pass: triangle lists, back-face culling
//! with counter-clockwise front faces, opaque color writes, depth test and
//! write with `LESS`, and dynamic viewport and scissor.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_rhi::device::Device;
//! use tessera_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use tessera_rhi::render_pass::RenderPass;
//! use tessera_rhi::shader::{Shader, ShaderStage};
//! use tessera_rhi::vertex::Vertex;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     render_pass: &RenderPass,
//! #     vert: &[u8],
//! #     frag: &[u8],
//! # ) -> Result<(), tessera_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_bytes(device.clone(), vert, ShaderStage::Vertex, "main")?;
//! let fragment_shader =
//!     Shader::from_spirv_bytes(device.clone(), frag, ShaderStage::Fragment, "main")?;
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//!
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vertex_shader)
//!     .fragment_shader(&fragment_shader)
//!     .vertex_binding(Vertex::binding_description())
//!     .vertex_attributes(&Vertex::attribute_descriptions())
//!     .render_pass(render_pass, 0)
//!     .rasterization_samples(render_pass.samples())
//!     .build(device.clone(), &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout from set layouts and push constant ranges.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| result)?
        };

        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            RhiError::PipelineError("Driver returned no pipeline".to_string())
        })?;

        info!("Graphics pipeline created");

        Ok(Self { device, pipeline })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Winding order of front-facing triangles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Matches the Y-flipped projection used by the renderer.
    #[default]
    CounterClockwise,
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Depth comparison operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    #[default]
    Less,
    LessOrEqual,
    Always,
}

impl CompareOp {
    /// Converts to Vulkan compare op.
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Builder for graphics pipelines targeting a render pass subpass.
pub struct GraphicsPipelineBuilder<'a> {
    // Shader stages
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,

    // Vertex input state
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    // Rasterization state
    cull_mode: CullMode,
    front_face: FrontFace,

    // Multisampling state
    rasterization_samples: vk::SampleCountFlags,

    // Depth state
    depth_test_enable: bool,
    depth_write_enable: bool,
    depth_compare_op: CompareOp,

    // Render pass
    render_pass: vk::RenderPass,
    subpass: u32,

    // Dynamic state
    dynamic_states: Vec<vk::DynamicState>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a builder with the forward-pass defaults.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,

            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),

            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,

            rasterization_samples: vk::SampleCountFlags::TYPE_1,

            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,

            render_pass: vk::RenderPass::null(),
            subpass: 0,

            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Must match the sample count of the render pass attachments.
    pub fn rasterization_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.rasterization_samples = samples;
        self
    }

    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    pub fn depth_compare_op(mut self, op: CompareOp) -> Self {
        self.depth_compare_op = op;
        self
    }

    /// Subpass of `render_pass` the pipeline is used in.
    pub fn render_pass(mut self, render_pass: &RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass.handle();
        self.subpass = subpass;
        self
    }

    pub fn dynamic_state(mut self, state: vk::DynamicState) -> Self {
        if !self.dynamic_states.contains(&state) {
            self.dynamic_states.push(state);
        }
        self
    }

    /// Creates the pipeline.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError(
                "A render pass is required".to_string(),
            ));
        }

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(self.rasterization_samples)
            .min_sample_shading(1.0);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test_enable)
            .depth_write_enable(self.depth_write_enable)
            .depth_compare_op(self.depth_compare_op.to_vk())
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0; 4]);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        Pipeline::create_graphics_internal(device, &pipeline_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_compare_op_to_vk() {
        assert_eq!(CompareOp::Less.to_vk(), vk::CompareOp::LESS);
        assert_eq!(CompareOp::LessOrEqual.to_vk(), vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(CompareOp::Always.to_vk(), vk::CompareOp::ALWAYS);
    }

    #[test]
    fn test_graphics_pipeline_builder_default() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert!(builder.vertex_bindings.is_empty());
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert_eq!(builder.front_face, FrontFace::CounterClockwise);
        assert_eq!(builder.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert_eq!(builder.depth_compare_op, CompareOp::Less);
        assert_eq!(
            builder.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
    }

    #[test]
    fn test_graphics_pipeline_builder_depth_settings() {
        let builder = GraphicsPipelineBuilder::new()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(CompareOp::Always);
        assert!(!builder.depth_test_enable);
        assert!(!builder.depth_write_enable);
        assert_eq!(builder.depth_compare_op, CompareOp::Always);
    }

    #[test]
    fn test_graphics_pipeline_builder_samples() {
        let builder =
            GraphicsPipelineBuilder::new().rasterization_samples(vk::SampleCountFlags::TYPE_8);
        assert_eq!(builder.rasterization_samples, vk::SampleCountFlags::TYPE_8);
    }

    #[test]
    fn test_graphics_pipeline_builder_dynamic_state_dedup() {
        let builder = GraphicsPipelineBuilder::new()
            .dynamic_state(vk::DynamicState::LINE_WIDTH)
            .dynamic_state(vk::DynamicState::LINE_WIDTH);
        assert_eq!(builder.dynamic_states.len(), 3);
    }
}
