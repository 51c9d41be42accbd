// Presentation module - mode switching between windowed and fullscreen
//
// Pure state machine plus the two seams it drives:
// - PresentTarget: whatever owns the swapchain (the Vulkan renderer)
// - WindowChrome: whatever owns the native window (winit)

pub mod chrome;
pub mod controller;
pub mod mode;

pub use chrome::{ChromeState, Placement, WindowChrome};
pub use controller::{ExclusiveStatus, ModeChange, ModeController};
pub use mode::{ExclusiveIntent, PresentationMode};

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

/// What the next swapchain should be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub mode: PresentationMode,
    pub intent: ExclusiveIntent,
}

/// Why a rebuild left the previous state in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The platform refused the chain for now; the next event retries
    InitializationFailed,
    /// Zero-area surface, nothing to present to
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt { extent: vk::Extent2D, image_count: usize },
    Deferred(DeferReason),
}

impl RebuildOutcome {
    pub fn is_rebuilt(&self) -> bool {
        matches!(self, RebuildOutcome::Rebuilt { .. })
    }
}

/// The swapchain side of a mode switch
pub trait PresentTarget {
    /// Extent the surface reports right now (the fallback if it has no preference)
    fn surface_extent(&self) -> Result<vk::Extent2D>;

    /// Extent a chain built for `mode` would get right now
    fn target_extent(&self, mode: PresentationMode) -> Result<vk::Extent2D>;

    /// Extent of the live chain, `None` before the first successful build
    fn swapchain_extent(&self) -> Option<vk::Extent2D>;

    /// Replace the chain and everything sized by it
    fn rebuild(&mut self, request: SwapchainRequest) -> Result<RebuildOutcome>;

    fn acquire_exclusive(&mut self) -> VkResult<()>;

    fn release_exclusive(&mut self) -> VkResult<()>;
}
