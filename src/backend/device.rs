// Device context - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Window surface creation
// - Physical device selection (prefer discrete GPU that can present)
// - Logical device + queue creation
//
// Created once at startup, destroyed last.

use anyhow::{Context, Result};
use ash::extensions::{ext, khr};
use ash::{vk, Entry};
use raw_window_handle::HasDisplayHandle;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;
use winit::window::Window;

use super::surface::{self, Surface};

/// Device context with automatic cleanup
pub struct DeviceContext {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: Surface,
    pub instance: ash::Instance,
    _entry: Entry,

    // Queue handles
    pub queue: vk::Queue,
    pub queue_family: u32,

    /// Device was created with VK_EXT_full_screen_exclusive
    pub supports_exclusive: bool,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    pub properties: vk::PhysicalDeviceProperties,
}

impl DeviceContext {
    /// Create the device context for `window`
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    /// * `window` - Window the surface is created for
    pub fn new(app_name: &str, enable_validation: bool, window: &Window) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Create instance with the extensions this window needs
        let display_handle = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let (instance, has_surface_caps2) =
            Self::create_instance(&entry, app_name, enable_validation, display_handle)?;

        // Everything created from here on is destroyed again if a later step fails
        let mut teardown = Teardown::default();
        teardown.push({
            let instance = instance.clone();
            move || unsafe { instance.destroy_instance(None) }
        });

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            let (utils, messenger) = Self::setup_debug_messenger(&entry, &instance)?;
            teardown.push({
                let utils = utils.clone();
                move || unsafe { utils.destroy_debug_utils_messenger(messenger, None) }
            });
            Some((utils, messenger))
        } else {
            None
        };

        // Step 4: Surface
        let surface = Surface {
            loader: khr::Surface::new(&entry, &instance),
            handle: unsafe { surface::create_surface(&entry, &instance, window)? },
        };
        teardown.push({
            let loader = surface.loader.clone();
            let handle = surface.handle;
            move || unsafe { loader.destroy_surface(handle, None) }
        });

        // Step 5: Pick physical device (GPU) that can present to the surface
        let (physical_device, queue_family) = Self::pick_physical_device(&instance, &surface)?;

        // Step 6: Create logical device
        let supports_exclusive = has_surface_caps2
            && Self::has_device_extension(&instance, physical_device, ext::FullScreenExclusive::name())?;
        let (device, queue) = Self::create_logical_device(
            &instance,
            physical_device,
            queue_family,
            supports_exclusive,
        )?;
        teardown.disarm();

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!(
            "Fullscreen exclusive extension: {}",
            if supports_exclusive { "available" } else { "not available" }
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            surface,
            instance,
            _entry: entry,
            queue,
            queue_family,
            supports_exclusive,
            debug_utils,
            properties,
        }))
    }

    /// Returns the instance and whether surface-capabilities-2 got enabled
    fn create_instance(
        entry: &Entry,
        app_name: &str,
        enable_validation: bool,
        display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<(ash::Instance, bool)> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("Fullscreen Modes")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let available = entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate instance extensions")?;
        let is_available = |name: &CStr| {
            available
                .iter()
                .any(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) } == name)
        };

        // Surface extensions for this platform
        let mut extensions: Vec<*const c_char> = surface::required_extensions(display_handle)?
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        // Fullscreen exclusive depends on these two
        let has_surface_caps2 = is_available(vk::KhrGetSurfaceCapabilities2Fn::name())
            && is_available(vk::KhrGetPhysicalDeviceProperties2Fn::name());
        if has_surface_caps2 {
            extensions.push(vk::KhrGetPhysicalDeviceProperties2Fn::name().as_ptr());
            extensions.push(vk::KhrGetSurfaceCapabilities2Fn::name().as_ptr());
        }

        if enable_validation {
            extensions.push(ext::DebugUtils::name().as_ptr());
        }

        // Validation layers
        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok((instance, has_surface_caps2))
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        // Score each device
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let props = unsafe { instance.get_physical_device_properties(device) };

            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };

            // One queue does both graphics and present
            let family = queue_families
                .iter()
                .enumerate()
                .filter(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)
                .find(|&i| surface.supports_queue_family(device, i));

            let Some(family) = family else {
                log::debug!(
                    "Skipping {}: no queue can present to the surface",
                    unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy()
                );
                continue;
            };

            // Score device (prefer discrete GPU)
            let score = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            };

            if score > best_score {
                best_score = score;
                best_device = Some((device, family));
            }
        }

        best_device.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    fn has_device_extension(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        name: &CStr,
    ) -> Result<bool> {
        let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .context("Failed to enumerate device extensions")?;

        Ok(available
            .iter()
            .any(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) } == name))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        enable_exclusive: bool,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        // Required device extensions
        let mut extensions = vec![khr::Swapchain::name().as_ptr()];
        if enable_exclusive {
            extensions.push(ext::FullScreenExclusive::name().as_ptr());
        }

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        Ok((device, queue))
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_device(None);
            self.surface.loader.destroy_surface(self.surface.handle, None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

/// Undo steps for a half-built context, run newest first on drop
#[derive(Default)]
struct Teardown {
    steps: Vec<Box<dyn FnOnce()>>,
}

impl Teardown {
    fn push(&mut self, step: impl FnOnce() + 'static) {
        self.steps.push(Box::new(step));
    }

    /// Construction finished, ownership moved into the context
    fn disarm(mut self) {
        self.steps.clear();
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        while let Some(step) = self.steps.pop() {
            step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl FnOnce() {
        let log = log.clone();
        move || log.borrow_mut().push(name)
    }

    #[test]
    fn test_failed_init_destroys_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let result: Result<()> = (|| {
            let mut teardown = Teardown::default();
            teardown.push(recording(&log, "instance"));
            teardown.push(recording(&log, "messenger"));
            teardown.push(recording(&log, "surface"));
            anyhow::bail!("no suitable GPU found");
        })();

        assert!(result.is_err());
        assert_eq!(*log.borrow(), vec!["surface", "messenger", "instance"]);
    }

    #[test]
    fn test_finished_init_destroys_nothing() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut teardown = Teardown::default();
        teardown.push(recording(&log, "instance"));
        teardown.push(recording(&log, "surface"));
        teardown.disarm();

        assert!(log.borrow().is_empty());
    }
}
