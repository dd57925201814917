//! Render context: the single owner of every GPU object.
//!
//! [`RenderContext`] bootstraps Vulkan for a window, uploads the model and
//! texture, and implements [`FrameBackend`] so the frame loop can drive it.
//!
//! # Resource Destruction Order
//!
//! `Drop` waits for the device to go idle, then the fields drop in
//! declaration order:
//! 1. Frame slots (semaphores, fences, command buffers, uniform buffers)
//! 2. Mesh buffers, sampler and texture
//! 3. Pipeline and pipeline layout
//! 4. Swapchain generation (framebuffers, targets, swapchain)
//! 5. Render pass and shader modules
//! 6. Descriptor pool and set layout
//! 7. Command pool
//! 8. Device (once the last `Arc` is gone), surface, instance

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use tessera_core::{RendererConfig, Timer};
use tessera_platform::{Surface, Window};
use tessera_resources::{load_image, load_model, read_file};
use tessera_rhi::buffer::{Buffer, BufferUsage};
use tessera_rhi::command::CommandPool;
use tessera_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, buffer_info, frame_bindings, frame_pool_sizes, image_info,
    write_frame_set,
};
use tessera_rhi::device::Device;
use tessera_rhi::image::find_depth_format;
use tessera_rhi::instance::Instance;
use tessera_rhi::physical_device::{DeviceRequirements, select_physical_device};
use tessera_rhi::pipeline::{
    CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use tessera_rhi::render_pass::{RenderPass, clear_values};
use tessera_rhi::sampler::Sampler;
use tessera_rhi::shader::{Shader, ShaderStage};
use tessera_rhi::swapchain::{
    AcquireOutcome, PresentOutcome, Swapchain, is_renderable_extent, surface_extent,
};
use tessera_rhi::texture::Texture;
use tessera_rhi::vertex::Vertex;
use tessera_rhi::{RhiError, RhiResult};
use tessera_scene::Camera;

use crate::frame::FrameSlot;
use crate::frame_loop::{FrameBackend, RecreateOutcome};
use crate::targets::SwapchainGeneration;
use crate::ubo::UniformFrameData;

/// Entry point of both shaders.
const SHADER_ENTRY_POINT: &str = "main";

/// Owns the instance, device, swapchain generation, pipeline, assets and
/// frame slots.
pub struct RenderContext {
    frames: Vec<FrameSlot>,
    index_count: u32,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    sampler: Sampler,
    texture: Texture,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    /// `None` only while a recreation is in progress.
    generation: Option<SwapchainGeneration>,
    render_pass: RenderPass,
    fragment_shader: Shader,
    vertex_shader: Shader,
    descriptor_pool: DescriptorPool,
    descriptor_set_layout: DescriptorSetLayout,
    command_pool: CommandPool,
    depth_format: vk::Format,
    drawable_size: (u32, u32),
    camera: Camera,
    timer: Timer,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl RenderContext {
    /// Creates every GPU object needed to draw the configured model.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: no suitable GPU, missing assets, an
    /// unsupported format or a Vulkan error.
    pub fn new(window: &Window, config: &RendererConfig) -> RhiResult<Self> {
        let (width, height) = window.drawable_size();
        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let surface_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(config.enable_validation, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            &DeviceRequirements::default(),
            config.max_msaa_samples,
        )?;
        let device = Device::new(&instance, &physical_device)?;
        let depth_format = find_depth_format(&device)?;
        let command_pool = CommandPool::new(device.clone(), device.queue_family())?;

        let vertex_shader = load_shader(&device, &config.vertex_shader, ShaderStage::Vertex)?;
        let fragment_shader =
            load_shader(&device, &config.fragment_shader, ShaderStage::Fragment)?;

        // Binding 0: per-frame uniforms, binding 1: the model texture
        let frame_count = config.frames_in_flight.max(1);
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &frame_bindings())?;
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            frame_count as u32,
            &frame_pool_sizes(frame_count as u32),
        )?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;

        let swapchain = Swapchain::new(
            instance.handle(),
            device.clone(),
            surface.handle(),
            surface.loader(),
            width,
            height,
        )?;
        let render_pass = RenderPass::new(
            device.clone(),
            swapchain.format(),
            depth_format,
            device.msaa_samples(),
        )?;
        let pipeline = build_pipeline(
            &device,
            &vertex_shader,
            &fragment_shader,
            &render_pass,
            &pipeline_layout,
        )?;
        let generation =
            SwapchainGeneration::new(device.clone(), swapchain, &render_pass, depth_format)?;

        let image =
            load_image(&config.texture).map_err(|e| RhiError::ResourceError(e.to_string()))?;
        let texture = Texture::from_rgba8(
            device.clone(),
            &command_pool,
            image.width,
            image.height,
            &image.pixels,
        )?;
        let sampler = Sampler::new(device.clone(), texture.mip_levels())?;

        let mesh =
            load_model(&config.model).map_err(|e| RhiError::ResourceError(e.to_string()))?;
        let index_count = u32::try_from(mesh.indices.len()).map_err(|_| {
            RhiError::ResourceError(format!("Too many indices: {}", mesh.indices.len()))
        })?;
        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice::<Vertex, u8>(&mesh.vertices),
        )?;
        let index_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice::<u32, u8>(&mesh.indices),
        )?;

        let layouts = vec![descriptor_set_layout.handle(); frame_count];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        let frames = FrameSlot::create_all(&device, &command_pool, &descriptor_sets)?;
        for frame in &frames {
            write_frame_set(
                &device,
                frame.descriptor_set(),
                buffer_info(
                    frame.uniform_buffer().handle(),
                    0,
                    UniformFrameData::SIZE as vk::DeviceSize,
                ),
                image_info(
                    sampler.handle(),
                    texture.view(),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
            );
        }

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} indices",
            generation.swapchain().image_count(),
            frames.len(),
            index_count
        );

        Ok(Self {
            frames,
            index_count,
            index_buffer,
            vertex_buffer,
            sampler,
            texture,
            pipeline,
            pipeline_layout,
            generation: Some(generation),
            render_pass,
            fragment_shader,
            vertex_shader,
            descriptor_pool,
            descriptor_set_layout,
            command_pool,
            depth_format,
            drawable_size: (width, height),
            camera: Camera::default(),
            timer: Timer::new(),
            device,
            surface,
            instance,
        })
    }

    /// Size used by the next swapchain recreation.
    pub fn set_drawable_size(&mut self, width: u32, height: u32) {
        self.drawable_size = (width, height);
    }

    /// Number of frame slots.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Extent of the current swapchain.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.generation.as_ref().map(SwapchainGeneration::extent)
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    #[inline]
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    #[inline]
    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }

    #[inline]
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    fn generation(&self) -> RhiResult<&SwapchainGeneration> {
        self.generation
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("No live swapchain".to_string()))
    }

    fn slot(&self, slot: usize) -> RhiResult<&FrameSlot> {
        self.frames.get(slot).ok_or_else(|| {
            RhiError::ResourceError(format!(
                "Frame slot {} out of range ({} slots)",
                slot,
                self.frames.len()
            ))
        })
    }

    /// Records the single indexed draw into the slot's command buffer.
    fn record_commands(&self, frame: &FrameSlot, image_index: u32) -> RhiResult<()> {
        let generation = self.generation()?;
        let framebuffer = generation.framebuffer(image_index).ok_or_else(|| {
            RhiError::SwapchainError(format!("No framebuffer for image {}", image_index))
        })?;
        let extent = generation.extent();

        let cmd = frame.command_buffer();
        cmd.reset()?;
        cmd.begin()?;

        let clear_values = clear_values();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(render_area)
            .clear_values(&clear_values);

        cmd.begin_render_pass(&begin_info);
        cmd.bind_graphics_pipeline(self.pipeline.handle());

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&render_area);

        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        cmd.bind_descriptor_sets(
            self.pipeline_layout.handle(),
            0,
            &[frame.descriptor_set()],
        );
        cmd.draw_indexed(self.index_count, 1, 0, 0, 0);

        cmd.end_render_pass();
        cmd.end()
    }
}

impl FrameBackend for RenderContext {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.slot(slot)?.wait()
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available().handle();
        self.generation()?.swapchain().acquire_next_image(semaphore)
    }

    fn update_uniforms(&mut self, slot: usize) -> RhiResult<()> {
        let extent = self.generation()?.extent();
        let data = UniformFrameData::new(
            &self.camera,
            self.timer.elapsed_secs(),
            extent.width,
            extent.height,
        );
        self.slot(slot)?.write_uniforms(&data)
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = self.slot(slot)?;

        // Reset only once we are sure work will be submitted
        frame.in_flight().reset()?;
        self.record_commands(frame, image_index)?;

        let wait_semaphores = [frame.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished().handle()];
        let command_buffers = [frame.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer was just recorded and the fence was reset
        // above after the slot's previous submission completed.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let semaphore = self.slot(slot)?.render_finished().handle();
        self.generation()?
            .swapchain()
            .present(self.device.present_queue(), image_index, semaphore)
    }

    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome> {
        let (width, height) = self.drawable_size;
        let extent = surface_extent(
            self.device.physical_device(),
            self.surface.handle(),
            self.surface.loader(),
            width,
            height,
        )?;
        if !is_renderable_extent(extent) {
            // Keep the live generation until the surface has an area again
            return Ok(RecreateOutcome::Deferred);
        }

        self.device.wait_idle()?;

        // The old generation is gone before the new swapchain is created
        self.generation = None;

        let swapchain = Swapchain::new(
            self.instance.handle(),
            self.device.clone(),
            self.surface.handle(),
            self.surface.loader(),
            width,
            height,
        )?;

        let samples = self.device.msaa_samples();
        if !self.render_pass.is_compatible(swapchain.format(), samples) {
            info!(
                "Surface format changed to {:?}, rebuilding render pass and pipeline",
                swapchain.format()
            );
            let render_pass = RenderPass::new(
                self.device.clone(),
                swapchain.format(),
                self.depth_format,
                samples,
            )?;
            let pipeline = build_pipeline(
                &self.device,
                &self.vertex_shader,
                &self.fragment_shader,
                &render_pass,
                &self.pipeline_layout,
            )?;
            self.pipeline = pipeline;
            self.render_pass = render_pass;
        }

        self.generation = Some(SwapchainGeneration::new(
            self.device.clone(),
            swapchain,
            &self.render_pass,
            self.depth_format,
        )?);

        debug!("Swapchain generation rebuilt at {}x{}", width, height);
        Ok(RecreateOutcome::Recreated)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        // Nothing may be destroyed while a frame is still in flight
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {:?}", e);
        }
        info!("Render context destroyed");
    }
}

/// Reads a SPIR-V file and wraps it in a shader module.
fn load_shader(device: &Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Shader> {
    let bytes = read_file(path).map_err(|e| RhiError::ShaderError(e.to_string()))?;
    Shader::from_spirv_bytes(device.clone(), &bytes, stage, SHADER_ENTRY_POINT)
}

/// Builds the forward pipeline for `render_pass`.
///
/// Back faces are culled with counter-clockwise front faces, which matches the
/// winding after the projection's Y flip.
fn build_pipeline(
    device: &Arc<Device>,
    vertex_shader: &Shader,
    fragment_shader: &Shader,
    render_pass: &RenderPass,
    layout: &PipelineLayout,
) -> RhiResult<Pipeline> {
    let pipeline = GraphicsPipelineBuilder::new()
        .vertex_shader(vertex_shader)
        .fragment_shader(fragment_shader)
        .vertex_binding(Vertex::binding_description())
        .vertex_attributes(&Vertex::attribute_descriptions())
        .cull_mode(CullMode::Back)
        .front_face(FrontFace::CounterClockwise)
        .rasterization_samples(render_pass.samples())
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(CompareOp::Less)
        .render_pass(render_pass, 0)
        .build(device.clone(), layout)?;

    info!(
        "Graphics pipeline built ({:?}, {:?})",
        render_pass.color_format(),
        render_pass.samples()
    );

    Ok(pipeline)
}
