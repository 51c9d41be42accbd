/// Tests for the frame protocol
///
/// A scripted driver records every call so the sequencing and the exit
/// rules can be checked without a GPU.

use super::*;

// ============================================================================
// Scripted driver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Acquire,
    Wait(u32),
    Record(u32),
    Submit(u32),
    Present(u32),
    QueueIdle,
}

struct ScriptedDriver {
    calls: Vec<Call>,
    acquire: VkResult<(u32, bool)>,
    wait: VkResult<()>,
    submit: VkResult<()>,
    present: VkResult<bool>,
}

impl ScriptedDriver {
    fn healthy(image_index: u32) -> Self {
        Self {
            calls: Vec::new(),
            acquire: Ok((image_index, false)),
            wait: Ok(()),
            submit: Ok(()),
            present: Ok(false),
        }
    }
}

impl FrameDriver for ScriptedDriver {
    fn acquire_next_image(&mut self) -> VkResult<(u32, bool)> {
        self.calls.push(Call::Acquire);
        self.acquire
    }

    fn wait_for_frame(&mut self, image_index: u32) -> VkResult<()> {
        self.calls.push(Call::Wait(image_index));
        self.wait
    }

    fn record_frame(&mut self, image_index: u32) -> VkResult<()> {
        self.calls.push(Call::Record(image_index));
        Ok(())
    }

    fn submit_frame(&mut self, image_index: u32) -> VkResult<()> {
        self.calls.push(Call::Submit(image_index));
        self.submit
    }

    fn present_frame(&mut self, image_index: u32) -> VkResult<bool> {
        self.calls.push(Call::Present(image_index));
        self.present
    }

    fn wait_queue_idle(&mut self) {
        self.calls.push(Call::QueueIdle);
    }
}

// ============================================================================
// Tests: Normal frames
// ============================================================================

#[test]
fn test_frame_runs_steps_in_order() {
    let mut driver = ScriptedDriver::healthy(2);

    assert_eq!(run_frame(&mut driver), Ok(FrameStatus::Presented));
    assert_eq!(
        driver.calls,
        vec![
            Call::Acquire,
            Call::Wait(2),
            Call::Record(2),
            Call::Submit(2),
            Call::Present(2),
        ]
    );
}

#[test]
fn test_consecutive_frames_follow_acquired_index() {
    let mut driver = ScriptedDriver::healthy(0);
    run_frame(&mut driver).unwrap();

    driver.acquire = Ok((1, false));
    run_frame(&mut driver).unwrap();

    assert!(driver.calls.contains(&Call::Wait(0)));
    assert!(driver.calls.contains(&Call::Wait(1)));
    assert!(!driver.calls.contains(&Call::QueueIdle));
}

// ============================================================================
// Tests: Rebuild requests
// ============================================================================

#[test]
fn test_out_of_date_acquire_skips_frame() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.acquire = Err(vk::Result::ERROR_OUT_OF_DATE_KHR);

    assert_eq!(run_frame(&mut driver), Ok(FrameStatus::NeedsRebuild));
    assert_eq!(driver.calls, vec![Call::Acquire]);
}

#[test]
fn test_suboptimal_acquire_still_presents() {
    let mut driver = ScriptedDriver::healthy(1);
    driver.acquire = Ok((1, true));

    assert_eq!(run_frame(&mut driver), Ok(FrameStatus::NeedsRebuild));
    assert_eq!(driver.calls.last(), Some(&Call::Present(1)));
}

#[test]
fn test_suboptimal_present_requests_rebuild() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.present = Ok(true);

    assert_eq!(run_frame(&mut driver), Ok(FrameStatus::NeedsRebuild));
}

#[test]
fn test_out_of_date_present_requests_rebuild() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.present = Err(vk::Result::ERROR_OUT_OF_DATE_KHR);

    assert_eq!(run_frame(&mut driver), Ok(FrameStatus::NeedsRebuild));
    assert!(!driver.calls.contains(&Call::QueueIdle));
}

// ============================================================================
// Tests: Fatal conditions
// ============================================================================

#[test]
fn test_acquire_failure_waits_idle_and_stops() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.acquire = Err(vk::Result::ERROR_SURFACE_LOST_KHR);

    assert_eq!(run_frame(&mut driver), Err(FrameError::SurfaceLost));
    assert_eq!(driver.calls, vec![Call::Acquire, Call::QueueIdle]);
}

#[test]
fn test_exclusive_mode_lost_on_present() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.present = Err(vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT);

    assert_eq!(run_frame(&mut driver), Err(FrameError::ExclusiveModeLost));
    assert_eq!(driver.calls.last(), Some(&Call::QueueIdle));
}

#[test]
fn test_exclusive_mode_lost_on_acquire() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.acquire = Err(vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT);

    assert_eq!(run_frame(&mut driver), Err(FrameError::ExclusiveModeLost));
    assert_eq!(driver.calls, vec![Call::Acquire, Call::QueueIdle]);
}

#[test]
fn test_fence_failure_stops_before_recording() {
    let mut driver = ScriptedDriver::healthy(3);
    driver.wait = Err(vk::Result::ERROR_DEVICE_LOST);

    assert_eq!(run_frame(&mut driver), Err(FrameError::DeviceLost));
    assert_eq!(
        driver.calls,
        vec![Call::Acquire, Call::Wait(3), Call::QueueIdle]
    );
}

#[test]
fn test_submit_failure_keeps_stage() {
    let mut driver = ScriptedDriver::healthy(0);
    driver.submit = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

    assert_eq!(
        run_frame(&mut driver),
        Err(FrameError::Vulkan {
            stage: FrameStage::Submit,
            result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        })
    );
    assert!(!driver.calls.iter().any(|c| matches!(c, Call::Present(_))));
}

#[test]
fn test_error_mapping() {
    assert_eq!(
        FrameError::from_vk(FrameStage::Present, vk::Result::ERROR_DEVICE_LOST),
        FrameError::DeviceLost
    );
    assert_eq!(
        FrameError::from_vk(FrameStage::Acquire, vk::Result::TIMEOUT),
        FrameError::Vulkan {
            stage: FrameStage::Acquire,
            result: vk::Result::TIMEOUT,
        }
    );
}
