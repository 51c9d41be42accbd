// Frame protocol - one frame, strictly sequential
//
// acquire -> wait fence + reset -> record -> submit -> present
//
// The Vulkan calls live behind FrameDriver (implemented by the renderer);
// run_frame only decides what each result means for the loop.

use ash::prelude::VkResult;
use ash::vk;
use thiserror::Error;

/// Step of the frame protocol a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Acquire,
    Wait,
    Record,
    Submit,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The chain is out of date or suboptimal; rebuild before the next frame
    NeedsRebuild,
}

/// Conditions that end the render loop
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Presentation surface lost")]
    SurfaceLost,

    #[error("Device lost")]
    DeviceLost,

    #[error("Fullscreen exclusive mode lost")]
    ExclusiveModeLost,

    #[error("Vulkan error during {stage:?}: {result}")]
    Vulkan { stage: FrameStage, result: vk::Result },
}

impl FrameError {
    pub fn from_vk(stage: FrameStage, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_SURFACE_LOST_KHR => FrameError::SurfaceLost,
            vk::Result::ERROR_DEVICE_LOST => FrameError::DeviceLost,
            vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT => FrameError::ExclusiveModeLost,
            result => FrameError::Vulkan { stage, result },
        }
    }
}

/// The GPU side of one frame
pub trait FrameDriver {
    /// Image index and whether the chain is suboptimal
    fn acquire_next_image(&mut self) -> VkResult<(u32, bool)>;

    /// Block on the image's previous submission, then reset its fence and commands
    fn wait_for_frame(&mut self, image_index: u32) -> VkResult<()>;

    fn record_frame(&mut self, image_index: u32) -> VkResult<()>;

    fn submit_frame(&mut self, image_index: u32) -> VkResult<()>;

    /// Returns whether the chain is suboptimal
    fn present_frame(&mut self, image_index: u32) -> VkResult<bool>;

    fn wait_queue_idle(&mut self);
}

/// Run one frame.
///
/// An out-of-date chain is not an error: the caller rebuilds and carries on.
/// Anything else that fails drains the queue and is returned as fatal.
pub fn run_frame<D: FrameDriver + ?Sized>(driver: &mut D) -> Result<FrameStatus, FrameError> {
    let (image_index, acquire_suboptimal) = match driver.acquire_next_image() {
        Ok(acquired) => acquired,
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(FrameStatus::NeedsRebuild),
        Err(e) => return Err(fatal(driver, FrameStage::Acquire, e)),
    };

    // A suboptimal image is still acquired and has to go through present,
    // otherwise the image-available semaphore stays signaled.
    driver
        .wait_for_frame(image_index)
        .map_err(|e| fatal(driver, FrameStage::Wait, e))?;
    driver
        .record_frame(image_index)
        .map_err(|e| fatal(driver, FrameStage::Record, e))?;
    driver
        .submit_frame(image_index)
        .map_err(|e| fatal(driver, FrameStage::Submit, e))?;

    match driver.present_frame(image_index) {
        Ok(present_suboptimal) if acquire_suboptimal || present_suboptimal => {
            Ok(FrameStatus::NeedsRebuild)
        }
        Ok(_) => Ok(FrameStatus::Presented),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::NeedsRebuild),
        Err(e) => Err(fatal(driver, FrameStage::Present, e)),
    }
}

fn fatal<D: FrameDriver + ?Sized>(driver: &mut D, stage: FrameStage, result: vk::Result) -> FrameError {
    log::error!("Frame failed during {:?}: {:?}", stage, result);
    driver.wait_queue_idle();
    FrameError::from_vk(stage, result)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
