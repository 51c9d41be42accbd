// Fullscreen exclusive - VK_EXT_full_screen_exclusive control
//
// Only usable on Windows: the swapchain must name the monitor (HMONITOR)
// it will own. Elsewhere there is no control object and acquisition reports
// the extension as missing.

use ash::extensions::ext;
use ash::prelude::VkResult;
use ash::vk;
use winit::window::Window;

use super::DeviceContext;

pub struct ExclusiveControl {
    loader: ext::FullScreenExclusive,
    monitor: isize,
}

impl ExclusiveControl {
    /// `None` when the device lacks the extension or there is no monitor handle
    pub fn new(device: &DeviceContext, monitor: Option<isize>) -> Option<Self> {
        if !device.supports_exclusive {
            return None;
        }
        let monitor = monitor?;

        Some(Self {
            loader: ext::FullScreenExclusive::new(&device.instance, &device.device),
            monitor,
        })
    }

    pub fn monitor(&self) -> vk::HMONITOR {
        self.monitor as vk::HMONITOR
    }

    pub fn acquire(&self, swapchain: vk::SwapchainKHR) -> VkResult<()> {
        unsafe { self.loader.acquire_full_screen_exclusive_mode(swapchain) }
    }

    pub fn release(&self, swapchain: vk::SwapchainKHR) -> VkResult<()> {
        unsafe { self.loader.release_full_screen_exclusive_mode(swapchain) }
    }
}

/// Native handle of the monitor the window is on
#[cfg(windows)]
pub fn monitor_handle(window: &Window) -> Option<isize> {
    use winit::platform::windows::MonitorHandleExtWindows;

    window
        .current_monitor()
        .map(|monitor| monitor.hmonitor() as isize)
}

#[cfg(not(windows))]
pub fn monitor_handle(_window: &Window) -> Option<isize> {
    None
}
