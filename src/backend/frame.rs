// Per-image frame resources and the shared present semaphores
//
// One FrameResource per swapchain image, index-aligned with the images and
// rebuilt together with the chain. The two semaphores are shared by every
// frame: the fence wait in the render loop keeps exactly one frame between
// acquire and present, which is what makes a single pair enough.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;

use super::DeviceContext;

/// Recording context for one swapchain image
pub struct FrameResource {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// Signaled when the last submission from this context retired
    pub fence: vk::Fence,
}

impl FrameResource {
    pub fn new(device: &DeviceContext) -> Result<Self> {
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        // TRANSIENT: re-recorded every frame, reset as a whole pool
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        unsafe {
            let fence = device
                .device
                .create_fence(&fence_info, None)
                .context("Failed to create frame fence")?;

            let command_pool = match device.device.create_command_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    device.device.destroy_fence(fence, None);
                    return Err(e).context("Failed to create frame command pool");
                }
            };

            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match device.device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.device.destroy_command_pool(command_pool, None);
                    device.device.destroy_fence(fence, None);
                    return Err(e).context("Failed to allocate frame command buffer");
                }
            };

            Ok(Self {
                command_pool,
                command_buffer,
                fence,
            })
        }
    }

    /// Block until the previous submission from this context is done, then
    /// make the fence and the command buffer reusable.
    pub fn wait_and_reset(&self, device: &ash::Device) -> VkResult<()> {
        unsafe {
            device.wait_for_fences(&[self.fence], true, u64::MAX)?;
            device.reset_fences(&[self.fence])?;
            device.reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            // Frees the command buffer as well
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Acquire/present ordering, created once for the whole run
pub struct PresentSemaphores {
    pub image_available: vk::Semaphore,
    pub render_complete: vk::Semaphore,
}

impl PresentSemaphores {
    pub fn new(device: &DeviceContext) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();

        unsafe {
            let image_available = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("Failed to create image-available semaphore")?;
            let render_complete = match device.device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create render-complete semaphore");
                }
            };

            Ok(Self {
                image_available,
                render_complete,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_complete, None);
        }
    }
}
