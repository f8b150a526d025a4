//! The frame loop: swapchain, pipeline, per-frame recording and submission.

use ash::vk;
use gpu_allocator::MemoryLocation;
use lumen_gpu::command::{record_one_time, submit_command_buffers};
use lumen_gpu::sync::{reset_fence, wait_for_fence};
use lumen_gpu::{
    read_spirv, AttachmentDesc, CommandPool, DescriptorBinding, DescriptorSet,
    DescriptorSetAllocator, FrameSync, GpuBuffer, GpuContext, GpuContextBuilder, GraphicsPipeline,
    GraphicsPipelineConfig, RenderPass, Result, ShaderStage, Swapchain,
};
use std::path::PathBuf;
use std::time::Instant;

/// Background color the scene is cleared to.
const CLEAR_COLOR: [f32; 4] = [0.5, 0.7, 0.9, 1.0];

/// Per-frame data shared with both shader stages through the uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub time: f32,
    pub aspect_ratio: f32,
    pub fov: f32,
    pub width: u32,
    pub height: u32,
}

/// Push constants for the fragment stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FramePushConstants {
    pub time: f32,
}

/// Renderer configuration.
pub struct RendererConfig {
    pub app_name: String,
    pub shader_dir: PathBuf,
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Lumen".to_string(),
            shader_dir: PathBuf::from("shaders"),
            validation: cfg!(debug_assertions),
        }
    }
}

/// Owns every GPU object the scene needs and drives one frame per
/// [`render`](Self::render) call, with a single frame in flight.
pub struct Renderer {
    swapchain: Swapchain,
    command_pool: CommandPool,
    frame_sync: FrameSync,
    uniform_buffer: GpuBuffer,
    descriptor_allocator: DescriptorSetAllocator,
    descriptor_set: DescriptorSet,
    pipeline: GraphicsPipeline,
    extent: vk::Extent2D,
    started: Instant,
    // Declared last: dropped after the manual teardown above it.
    gpu: GpuContext,
}

impl Renderer {
    /// Bring up the full rendering stack against a window.
    pub fn new<W>(window: &W, extent: vk::Extent2D, config: &RendererConfig) -> Result<Self>
    where
        W: raw_window_handle::HasDisplayHandle + raw_window_handle::HasWindowHandle,
    {
        let gpu = GpuContextBuilder::new()
            .app_name(config.app_name.clone())
            .validation(config.validation)
            .build(window)?;

        let capabilities = gpu.surface_capabilities()?;
        let swapchain = unsafe {
            Swapchain::new(
                gpu.device(),
                gpu.swapchain_loader(),
                gpu.surface(),
                &capabilities,
                extent,
                gpu.queue_families(),
            )?
        };
        let extent = swapchain.extent;

        let command_pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.queue_families().graphics,
                vk::CommandPoolCreateFlags::empty(),
            )?
        };

        let frame_sync = unsafe { FrameSync::new(gpu.device())? };

        let uniform_buffer = gpu.allocator().lock().create_buffer(
            std::mem::size_of::<SceneUniforms>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "scene uniforms",
        )?;

        let descriptor_allocator = unsafe { DescriptorSetAllocator::new(gpu.device())? };
        let descriptor_set = unsafe {
            DescriptorSet::new(
                gpu.device(),
                &descriptor_allocator,
                &[DescriptorBinding {
                    binding: 0,
                    buffer: uniform_buffer.buffer,
                    offset: 0,
                    range: std::mem::size_of::<SceneUniforms>() as u64,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    stages: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                }],
            )?
        };

        let vertex_shader = read_spirv(&config.shader_dir, "scene", ShaderStage::Vertex)?;
        let fragment_shader = read_spirv(&config.shader_dir, "scene", ShaderStage::Fragment)?;

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<FramePushConstants>() as u32);

        let pipeline = unsafe {
            GraphicsPipeline::new(
                gpu.device(),
                &GraphicsPipelineConfig {
                    vertex_shader,
                    fragment_shader,
                    // The scene triangle is generated in the vertex shader.
                    vertex_layout: None,
                    color_formats: vec![swapchain.format],
                },
                &[descriptor_set.layout],
                &[push_constant_range],
            )?
        };

        tracing::info!("Renderer initialized at {}x{}", extent.width, extent.height);

        Ok(Self {
            swapchain,
            command_pool,
            frame_sync,
            uniform_buffer,
            descriptor_allocator,
            descriptor_set,
            pipeline,
            extent,
            started: Instant::now(),
            gpu,
        })
    }

    /// Current render target size.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn color_attachment(&self) -> AttachmentDesc {
        AttachmentDesc {
            format: self.swapchain.format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: Some(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            }),
        }
    }

    fn scene_uniforms(&self, time: f32) -> SceneUniforms {
        SceneUniforms {
            time,
            aspect_ratio: self.extent.width as f32 / self.extent.height as f32,
            fov: std::f32::consts::FRAC_PI_3,
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    /// Render one frame.
    ///
    /// Acquire, record, submit, present, then block on the frame fence;
    /// exactly one frame is ever in flight. A zero-area target is a no-op.
    pub fn render(&mut self) -> Result<()> {
        if self.extent.width == 0 || self.extent.height == 0 {
            return Ok(());
        }

        let device = self.gpu.device();
        let time = self.started.elapsed().as_secs_f32();

        // The framebuffer bakes in the extent, so the pass is rebuilt per
        // frame at the current size.
        let render_pass =
            unsafe { RenderPass::new(device, &[self.color_attachment()], self.extent)? };

        let frame = unsafe {
            self.swapchain
                .acquire_next_image(self.gpu.swapchain_loader(), self.frame_sync.next_image_acquired)
        };
        let (image_view, image_index) = match frame {
            Ok(frame) => frame,
            Err(err) => {
                unsafe { render_pass.destroy(device) };
                return Err(err);
            }
        };

        self.uniform_buffer.write(&[self.scene_uniforms(time)])?;

        let viewport = vk::Viewport::default()
            .width(self.extent.width as f32)
            .height(self.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        let push_constants = FramePushConstants { time };

        let result = unsafe {
            self.record_and_submit(
                &render_pass,
                image_view,
                image_index,
                viewport,
                scissor,
                push_constants,
            )
        };

        unsafe { render_pass.destroy(device) };
        result
    }

    unsafe fn record_and_submit(
        &self,
        render_pass: &RenderPass,
        image_view: vk::ImageView,
        image_index: u32,
        viewport: vk::Viewport,
        scissor: vk::Rect2D,
        push_constants: FramePushConstants,
    ) -> Result<()> {
        let device = self.gpu.device();

        let cmd = record_one_time(device, &self.command_pool, |cmd| {
            render_pass.execute(device, cmd, &[image_view], |cmd| {
                device.cmd_bind_pipeline(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.pipeline,
                );
                device.cmd_set_viewport(cmd, 0, &[viewport]);
                device.cmd_set_scissor(cmd, 0, &[scissor]);
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.layout,
                    0,
                    &[self.descriptor_set.set],
                    &[],
                );
                device.cmd_push_constants(
                    cmd,
                    self.pipeline.layout,
                    vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push_constants),
                );
                device.cmd_draw(cmd, 3, 1, 0, 0);
            })
        })?;

        submit_command_buffers(
            device,
            self.gpu.graphics_queue(),
            &[cmd],
            &[self.frame_sync.next_image_acquired],
            &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            &[self.frame_sync.rendering_finished],
            self.frame_sync.gpu_work_finished,
        )?;

        self.swapchain.present(
            self.gpu.swapchain_loader(),
            self.gpu.present_queue(),
            image_index,
            &[self.frame_sync.rendering_finished],
        )?;

        wait_for_fence(device, self.frame_sync.gpu_work_finished)?;
        reset_fence(device, self.frame_sync.gpu_work_finished)?;

        self.command_pool.free_command_buffer(device, cmd);
        self.command_pool
            .reset(device, vk::CommandPoolResetFlags::empty())?;

        Ok(())
    }

    /// React to a window resize.
    ///
    /// A zero-area size only records the new extent; the stale swapchain is
    /// replaced once the window regains area.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.gpu.wait_idle()?;
        self.extent = vk::Extent2D { width, height };

        if width == 0 || height == 0 {
            tracing::debug!("Window minimized, deferring swapchain recreation");
            return Ok(());
        }

        unsafe {
            self.swapchain
                .destroy(self.gpu.device(), self.gpu.swapchain_loader());
            let capabilities = self.gpu.surface_capabilities()?;
            self.swapchain = Swapchain::new(
                self.gpu.device(),
                self.gpu.swapchain_loader(),
                self.gpu.surface(),
                &capabilities,
                self.extent,
                self.gpu.queue_families(),
            )?;
        }
        self.extent = self.swapchain.extent;

        tracing::debug!("Resized to {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.gpu.wait_idle();
        unsafe {
            let device = self.gpu.device();
            self.pipeline.destroy(device);
            self.descriptor_set.destroy(device, &self.descriptor_allocator);
            self.descriptor_allocator.destroy(device);
            if let Err(err) = self
                .gpu
                .allocator()
                .lock()
                .free_buffer(&mut self.uniform_buffer)
            {
                tracing::warn!("Failed to free uniform buffer: {err}");
            }
            self.frame_sync.destroy(device);
            self.command_pool.destroy(device);
            self.swapchain.destroy(device, self.gpu.swapchain_loader());
        }
        // self.gpu drops last and destroys device, surface, instance.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_uniforms_layout() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 20);
        assert_eq!(std::mem::offset_of!(SceneUniforms, time), 0);
        assert_eq!(std::mem::offset_of!(SceneUniforms, aspect_ratio), 4);
        assert_eq!(std::mem::offset_of!(SceneUniforms, fov), 8);
        assert_eq!(std::mem::offset_of!(SceneUniforms, width), 12);
        assert_eq!(std::mem::offset_of!(SceneUniforms, height), 16);
    }

    #[test]
    fn push_constants_layout() {
        assert_eq!(std::mem::size_of::<FramePushConstants>(), 4);
        assert_eq!(std::mem::offset_of!(FramePushConstants, time), 0);
    }

    #[test]
    fn clear_color_is_sky_blue() {
        assert_eq!(CLEAR_COLOR, [0.5, 0.7, 0.9, 1.0]);
    }
}
