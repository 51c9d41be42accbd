// Renderer - everything Vulkan the application owns
//
// Ties the device, swapchain manager, triangle pipeline and present
// semaphores together and exposes them through the two seams the rest of
// the program talks to: PresentTarget (mode switching) and FrameDriver
// (the per-frame protocol).
//
// Field order matters for Drop: the chain goes before the pipeline, and the
// device Arc is released last.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;
use winit::window::Window;

use crate::backend::exclusive::{self, ExclusiveControl};
use crate::backend::frame::{FrameResource, PresentSemaphores};
use crate::backend::pipeline::TrianglePipeline;
use crate::backend::swapchain::{SwapchainManager, SwapchainState};
use crate::backend::DeviceContext;
use crate::config::Config;
use crate::present::{PresentTarget, PresentationMode, RebuildOutcome, SwapchainRequest};
use crate::render::FrameDriver;

pub struct Renderer {
    swapchains: SwapchainManager,
    pipeline: TrianglePipeline,
    semaphores: PresentSemaphores,
    clear_color: [f32; 4],
    /// Submit waits for the acquired image here
    wait_stages: [vk::PipelineStageFlags; 1],
    device: Arc<DeviceContext>,
}

impl Renderer {
    /// Create everything except the swapchain; the first `rebuild` makes it.
    pub fn new(config: &Config, window: &Window) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        // Validation only in debug builds
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let device = DeviceContext::new(&config.window.title, enable_validation, window)?;

        let exclusive = ExclusiveControl::new(&device, exclusive::monitor_handle(window));
        if device.supports_exclusive && exclusive.is_none() {
            log::warn!("No monitor handle for the window, fullscreen exclusive control disabled");
        }

        let swapchains = SwapchainManager::new(device.clone(), exclusive, config.fallback_extent())?;
        let pipeline = TrianglePipeline::new(device.clone(), swapchains.format())?;
        let semaphores = PresentSemaphores::new(&device)?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            swapchains,
            pipeline,
            semaphores,
            clear_color: config.graphics.clear_color,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            device,
        })
    }

    /// A chain exists and frames can be rendered
    pub fn is_ready(&self) -> bool {
        self.swapchains.state().is_some()
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    // No chain yet reads as out of date: the loop asks for a rebuild
    fn chain(&self) -> VkResult<&SwapchainState> {
        self.swapchains.state().ok_or(vk::Result::ERROR_OUT_OF_DATE_KHR)
    }

    fn frame(&self, image_index: u32) -> VkResult<(&SwapchainState, &FrameResource)> {
        let state = self.chain()?;
        let frame = state
            .frames
            .get(image_index as usize)
            .ok_or(vk::Result::ERROR_UNKNOWN)?;
        Ok((state, frame))
    }
}

impl PresentTarget for Renderer {
    fn surface_extent(&self) -> Result<vk::Extent2D> {
        self.swapchains.surface_extent()
    }

    fn target_extent(&self, mode: PresentationMode) -> Result<vk::Extent2D> {
        self.swapchains.target_extent(mode)
    }

    fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.swapchains.state().map(|state| state.extent)
    }

    fn rebuild(&mut self, request: SwapchainRequest) -> Result<RebuildOutcome> {
        self.swapchains.rebuild(request, self.pipeline.render_pass)
    }

    fn acquire_exclusive(&mut self) -> VkResult<()> {
        self.swapchains.acquire_exclusive()
    }

    fn release_exclusive(&mut self) -> VkResult<()> {
        self.swapchains.release_exclusive()
    }
}

impl FrameDriver for Renderer {
    fn acquire_next_image(&mut self) -> VkResult<(u32, bool)> {
        let state = self.chain()?;
        unsafe {
            self.swapchains.loader().acquire_next_image(
                state.handle,
                u64::MAX,
                self.semaphores.image_available,
                vk::Fence::null(),
            )
        }
    }

    fn wait_for_frame(&mut self, image_index: u32) -> VkResult<()> {
        let (_, frame) = self.frame(image_index)?;
        frame.wait_and_reset(&self.device.device)
    }

    fn record_frame(&mut self, image_index: u32) -> VkResult<()> {
        let (state, frame) = self.frame(image_index)?;
        let device = &self.device.device;
        let cmd = frame.command_buffer;
        let extent = state.extent;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.pipeline.render_pass)
            .framebuffer(state.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device.begin_command_buffer(cmd, &begin_info)?;
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
            device.cmd_draw(cmd, 3, 1, 0, 0);
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)
        }
    }

    fn submit_frame(&mut self, image_index: u32) -> VkResult<()> {
        let (_, frame) = self.frame(image_index)?;

        let wait_semaphores = [self.semaphores.image_available];
        let signal_semaphores = [self.semaphores.render_complete];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device
                .queue_submit(self.device.queue, &[submit_info.build()], frame.fence)
        }
    }

    fn present_frame(&mut self, image_index: u32) -> VkResult<bool> {
        let state = self.chain()?;

        let wait_semaphores = [self.semaphores.render_complete];
        let swapchains = [state.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchains
                .loader()
                .queue_present(self.device.queue, &present_info)
        }
    }

    fn wait_queue_idle(&mut self) {
        if let Err(e) = unsafe { self.device.device.queue_wait_idle(self.device.queue) } {
            log::warn!("Queue wait idle failed: {:?}", e);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // Nothing may be in flight when the chain and semaphores go away
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device wait idle failed during cleanup: {:#}", e);
        }

        self.semaphores.destroy(&self.device.device);
    }
}
