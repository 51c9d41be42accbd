// Swapchain manager - Window presentation
//
// Manages the chain of images we render to and present to the screen, plus
// everything sized by it (image views, framebuffers, per-image frame
// resources). All of it is rebuilt together on resize or mode change.
//
// Rebuild hands the old chain to the driver (old_swapchain) and only
// destroys it once the new one exists.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

use super::exclusive::ExclusiveControl;
use super::frame::FrameResource;
use super::pipeline;
use super::DeviceContext;
use crate::present::{DeferReason, PresentationMode, RebuildOutcome, SwapchainRequest};

/// Pick the surface format: BGRA8 UNORM, then RGBA8 UNORM, then whatever comes first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    // A lone UNDEFINED entry means "anything goes"
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return Some(vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            });
        }
    }

    [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM]
        .iter()
        .find_map(|&wanted| formats.iter().find(|f| f.format == wanted).copied())
        .or_else(|| formats.first().copied())
}

/// Extent the surface asks for, or `fallback` clamped to the supported range
/// when it reports no preference (u32::MAX).
pub fn preferred_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    fallback: vk::Extent2D,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: fallback
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: fallback
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Swapchain extent for `mode`; both fullscreen modes take the maximum
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    mode: PresentationMode,
    fallback: vk::Extent2D,
) -> vk::Extent2D {
    if mode.is_fullscreen() {
        caps.max_image_extent
    } else {
        preferred_extent(caps, fallback)
    }
}

/// One image more than the minimum, capped by the maximum (0 means no cap)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// One `create` result per source item, in order. If any call fails the
/// items built before it are handed to `destroy` and the error is returned.
pub fn build_per_item<S, T>(
    sources: &[S],
    mut create: impl FnMut(&S) -> Result<T>,
    mut destroy: impl FnMut(T),
) -> Result<Vec<T>> {
    let mut built = Vec::with_capacity(sources.len());
    for source in sources {
        match create(source) {
            Ok(item) => built.push(item),
            Err(e) => {
                built.into_iter().rev().for_each(&mut destroy);
                return Err(e);
            }
        }
    }
    Ok(built)
}

/// A live chain and everything index-aligned with its images
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub frames: Vec<FrameResource>,
    pub request: SwapchainRequest,
    loader: khr::Swapchain,
    device: Arc<DeviceContext>,
}

impl SwapchainState {
    /// Take ownership of `handle` and build views, framebuffers and frame
    /// resources for its images. On failure everything built so far,
    /// including the chain, is destroyed.
    fn new(
        device: Arc<DeviceContext>,
        loader: khr::Swapchain,
        handle: vk::SwapchainKHR,
        extent: vk::Extent2D,
        format: vk::Format,
        request: SwapchainRequest,
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        let mut state = Self {
            handle,
            extent,
            format,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            frames: Vec::new(),
            request,
            loader,
            device,
        };

        state.images = unsafe { state.loader.get_swapchain_images(handle) }
            .context("Failed to get swapchain images")?;

        let device = state.device.clone();

        state.image_views = build_per_item(
            &state.images,
            |&image| create_image_view(&device, image, format),
            |view| unsafe { device.device.destroy_image_view(view, None) },
        )?;

        state.framebuffers = build_per_item(
            &state.image_views,
            |&view| pipeline::create_framebuffer(&device, view, render_pass, extent),
            |framebuffer| unsafe { device.device.destroy_framebuffer(framebuffer, None) },
        )?;

        state.frames = build_per_item(
            &state.images,
            |_| FrameResource::new(&device),
            |frame| frame.destroy(&device.device),
        )?;

        Ok(state)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for SwapchainState {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            for frame in &self.frames {
                frame.destroy(device);
            }
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

fn create_image_view(
    device: &DeviceContext,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device
            .device
            .create_image_view(&create_info, None)
            .context("Failed to create image view")
    }
}

pub struct SwapchainManager {
    // Dropped first: the chain references the device below
    state: Option<SwapchainState>,
    loader: khr::Swapchain,
    exclusive: Option<ExclusiveControl>,
    surface_format: vk::SurfaceFormatKHR,
    fallback_extent: vk::Extent2D,
    device: Arc<DeviceContext>,
}

impl SwapchainManager {
    /// Pick the surface format once; the render pass is built against it.
    pub fn new(
        device: Arc<DeviceContext>,
        exclusive: Option<ExclusiveControl>,
        fallback_extent: vk::Extent2D,
    ) -> Result<Self> {
        let formats = device.surface.formats(device.physical_device)?;
        let surface_format =
            choose_surface_format(&formats).context("Surface reports no formats")?;

        log::info!(
            "Surface format: {:?} / {:?}",
            surface_format.format,
            surface_format.color_space
        );

        Ok(Self {
            state: None,
            loader: khr::Swapchain::new(&device.instance, &device.device),
            exclusive,
            surface_format,
            fallback_extent,
            device,
        })
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn loader(&self) -> &khr::Swapchain {
        &self.loader
    }

    pub fn state(&self) -> Option<&SwapchainState> {
        self.state.as_ref()
    }

    /// Extent the surface currently reports (fallback if it has no preference)
    pub fn surface_extent(&self) -> Result<vk::Extent2D> {
        let caps = self.device.surface.capabilities(self.device.physical_device)?;
        Ok(preferred_extent(&caps, self.fallback_extent))
    }

    /// Extent `rebuild` would pick for `mode` right now
    pub fn target_extent(&self, mode: PresentationMode) -> Result<vk::Extent2D> {
        let caps = self.device.surface.capabilities(self.device.physical_device)?;
        Ok(choose_extent(&caps, mode, self.fallback_extent))
    }

    /// Replace the chain for `request`.
    ///
    /// A platform "initialization failed" leaves the current state in place
    /// and reports `Deferred`; any other failure is returned as an error.
    pub fn rebuild(
        &mut self,
        request: SwapchainRequest,
        render_pass: vk::RenderPass,
    ) -> Result<RebuildOutcome> {
        // Old chain's frames may still be in flight
        self.device.wait_idle()?;

        let caps = self.device.surface.capabilities(self.device.physical_device)?;
        let extent = choose_extent(&caps, request.mode, self.fallback_extent);

        if extent.width == 0 || extent.height == 0 {
            return Ok(RebuildOutcome::Deferred(DeferReason::Minimized));
        }

        let image_count = choose_image_count(&caps);
        let old_swapchain = self
            .state
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |state| state.handle);

        log::debug!(
            "Creating swapchain: {}x{}, min {} images, {:?}",
            extent.width,
            extent.height,
            image_count,
            request
        );

        let mut exclusive_info;
        let mut exclusive_win32_info;
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.device.surface.handle)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO) // Always supported
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Fullscreen-exclusive intent rides along in the pNext chain
        if let Some(exclusive) = &self.exclusive {
            exclusive_info = vk::SurfaceFullScreenExclusiveInfoEXT::builder()
                .full_screen_exclusive(request.intent.to_vk())
                .build();
            exclusive_win32_info = vk::SurfaceFullScreenExclusiveWin32InfoEXT::builder()
                .hmonitor(exclusive.monitor())
                .build();
            create_info = create_info
                .push_next(&mut exclusive_info)
                .push_next(&mut exclusive_win32_info);
        }

        let handle = match unsafe { self.loader.create_swapchain(&create_info, None) } {
            Ok(handle) => handle,
            Err(vk::Result::ERROR_INITIALIZATION_FAILED) => {
                return Ok(RebuildOutcome::Deferred(DeferReason::InitializationFailed));
            }
            Err(e) => return Err(e).context("Failed to create swapchain"),
        };

        let state = SwapchainState::new(
            self.device.clone(),
            self.loader.clone(),
            handle,
            extent,
            self.surface_format.format,
            request,
            render_pass,
        )?;

        let image_count = state.image_count();

        // Drops the previous chain, now that the driver is done with it
        self.state = Some(state);

        Ok(RebuildOutcome::Rebuilt {
            extent,
            image_count,
        })
    }

    pub fn acquire_exclusive(&self) -> VkResult<()> {
        let exclusive = self
            .exclusive
            .as_ref()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let state = self
            .state
            .as_ref()
            .ok_or(vk::Result::ERROR_OUT_OF_DATE_KHR)?;
        exclusive.acquire(state.handle)
    }

    /// Nothing to release without the extension or without a chain
    pub fn release_exclusive(&self) -> VkResult<()> {
        match (&self.exclusive, &self.state) {
            (Some(exclusive), Some(state)) => exclusive.release(state.handle),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    const FALLBACK: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_windowed_uses_current_extent() {
        let caps = caps((1024, 600), (2560, 1440));
        let extent = choose_extent(&caps, PresentationMode::Windowed, FALLBACK);
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 600 });
    }

    #[test]
    fn test_fullscreen_modes_use_max_extent() {
        let caps = caps((1280, 720), (2560, 1440));
        for mode in [
            PresentationMode::BorderlessFullscreen,
            PresentationMode::ExclusiveFullscreen,
        ] {
            assert_eq!(
                choose_extent(&caps, mode, FALLBACK),
                vk::Extent2D { width: 2560, height: 1440 }
            );
        }
    }

    #[test]
    fn test_no_preference_falls_back() {
        let caps = caps((u32::MAX, u32::MAX), (4096, 4096));
        assert_eq!(choose_extent(&caps, PresentationMode::Windowed, FALLBACK), FALLBACK);
    }

    #[test]
    fn test_fallback_clamped_to_supported_range() {
        let caps = caps((u32::MAX, u32::MAX), (800, 600));
        assert_eq!(
            preferred_extent(&caps, FALLBACK),
            vk::Extent2D { width: 800, height: 600 }
        );
    }

    #[test]
    fn test_image_count_one_above_minimum() {
        let caps = caps((1280, 720), (1280, 720));
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_capped_by_maximum() {
        let mut caps = caps((1280, 720), (1280, 720));
        caps.min_image_count = 3;
        caps.max_image_count = 3;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_zero_maximum_is_unbounded() {
        let mut caps = caps((1280, 720), (1280, 720));
        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_per_item_builds_one_entry_per_image() {
        let images = [vk::Image::null(); 3];
        let mut destroyed = 0;

        let built = build_per_item(&images, |_| Ok(7u32), |_| destroyed += 1).unwrap();

        assert_eq!(built.len(), images.len());
        assert_eq!(destroyed, 0);
    }

    #[test]
    fn test_per_item_failure_destroys_earlier_entries() {
        let sources = [0u32, 1, 2, 3];
        let mut destroyed = Vec::new();

        let result = build_per_item(
            &sources,
            |&index| {
                if index == 2 {
                    anyhow::bail!("out of device memory");
                }
                Ok(index * 10)
            },
            |item| destroyed.push(item),
        );

        assert!(result.is_err());
        assert_eq!(destroyed, vec![10, 0]);
    }

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_format_prefers_bgra_unorm() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
            format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
    }

    #[test]
    fn test_format_then_rgba_unorm_then_first() {
        let formats = [format(vk::Format::B8G8R8A8_SRGB), format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(
            choose_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::R8G8B8A8_UNORM)
        );

        let formats = [format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(
            choose_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::A2B10G10R10_UNORM_PACK32)
        );

        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_format_undefined_means_free_choice() {
        assert_eq!(
            choose_surface_format(&[format(vk::Format::UNDEFINED)]).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
    }
}
