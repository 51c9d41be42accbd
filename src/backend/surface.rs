// Window surface - connection between the native window and Vulkan
//
// Owned by the DeviceContext (must die before the instance).

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;
use winit::window::Window;

pub struct Surface {
    pub loader: khr::Surface,
    pub handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.handle)
                .context("Failed to query surface capabilities")
        }
    }

    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.handle)
                .context("Failed to query surface formats")
        }
    }

    pub fn supports_queue_family(&self, physical_device: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.handle)
                .unwrap_or(false)
        }
    }
}

/// Instance extensions needed to create a surface on this display
pub fn required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let platform = match display_handle {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        other => anyhow::bail!("Unsupported display handle type: {:?}", other),
    };

    Ok(vec![khr::Surface::name(), platform])
}

/// Create a platform surface for `window`
///
/// # Safety
/// The instance must have been created with [`required_extensions`] for
/// this window's display, and the window must outlive the surface.
pub unsafe fn create_surface(
    entry: &Entry,
    instance: &ash::Instance,
    window: &Window,
) -> Result<vk::SurfaceKHR> {
    let window_handle = window
        .window_handle()
        .context("Failed to get window handle")?
        .as_raw();
    let display_handle = window
        .display_handle()
        .context("Failed to get display handle")?
        .as_raw();

    let surface = match (display_handle, window_handle) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance =
                handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display
                .display
                .context("Xlib display handle is null")?
                .as_ptr();
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy.cast())
                .window(handle.window);
            khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(handle.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)
        }
        _ => anyhow::bail!("Unsupported window handle type"),
    };

    surface.context("Failed to create window surface")
}
