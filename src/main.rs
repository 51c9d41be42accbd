// =============================================================================
// FULLSCREEN MODES - Windowed / borderless / exclusive presentation with Vulkan
// =============================================================================
//
// Draws one triangle and lets the user switch how it reaches the screen:
//
//   F1  windowed               (exclusive mode disallowed)
//   F2  borderless fullscreen  (exclusive mode allowed, driver decides)
//   F3  exclusive fullscreen   (exclusive mode acquired explicitly)
//   Esc quit
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop, keys, title/FPS)                        │
// │    ├── ModeController (present/)  - which mode, in what order   │
// │    └── Renderer                   - Vulkan resources            │
// │          ├── DeviceContext + Surface                            │
// │          ├── SwapchainManager (chain, views, framebuffers,      │
// │          │                     one frame resource per image)    │
// │          └── TrianglePipeline                                   │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW (render::run_frame, strictly sequential):
// 1. Acquire swapchain image
// 2. Wait for that image's fence, reset its command pool
// 3. Record: clear, bind pipeline, draw 3 vertices
// 4. Submit
// 5. Present
//
// =============================================================================

mod backend;
mod config;
mod notify;
mod present;
mod render;
mod renderer;

use anyhow::{Context, Result};
use config::{Action, Config, KeyBindings};
use present::{ExclusiveStatus, ModeChange, ModeController, PresentationMode, WindowChrome};
use render::{FrameError, FrameStatus};
use renderer::Renderer;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowAttributes},
};

const CONFIG_PATH: &str = "config.toml";

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, config_error) = Config::load_or_default(CONFIG_PATH);

    init_logging(&config);
    log::info!("Starting fullscreen modes sample");
    match config_error {
        Some(e) => log::warn!("Failed to load {}: {:#}. Using defaults.", CONFIG_PATH, e),
        None => log::debug!("Config: {:?}", config),
    }
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed size" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Runtime failures end the loop like a normal close; only a failed
    // startup is reported through the exit code.
    match app.init_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging: configured level, RUST_LOG on top, optional log file
fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};

    let (level, level_error) = match config.log_level() {
        Ok(level) => (level, None),
        Err(e) => (log::LevelFilter::Info, Some(e)),
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "=== Fullscreen Modes Log ===");
                let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                let _ = writeln!(file);
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", config.debug.log_file, e);
            }
        }
    }

    builder.init();

    if let Some(e) = level_error {
        log::warn!("{}, defaulting to info", e);
    }
}

/// Title bar text: base title, mode, and FPS when known
fn window_title(
    base: &str,
    mode: PresentationMode,
    exclusive: ExclusiveStatus,
    fps: Option<(f32, f32)>,
) -> String {
    let mut title = format!("{} [{}", base, mode.label());
    if exclusive == ExclusiveStatus::Requested {
        title.push_str(", not granted");
    }
    title.push(']');

    if let Some((fps, frame_ms)) = fps {
        title.push_str(&format!(" - {:.0} FPS ({:.2}ms)", fps, frame_ms));
    }
    title
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The renderer owns the surface
/// and must go before the window it was created for.
struct App {
    config: Config,
    bindings: KeyBindings,

    renderer: Option<Renderer>,
    controller: Option<ModeController>,
    window: Option<Arc<Window>>,

    /// Startup failure, returned from main once the loop has stopped
    init_error: Option<anyhow::Error>,

    /// Zero-size window: skip rendering until it comes back
    is_minimized: bool,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
    last_fps: Option<(f32, f32)>,
}

impl App {
    fn new(config: Config) -> Self {
        let bindings = config.key_bindings();
        let now = Instant::now();
        Self {
            config,
            bindings,
            renderer: None,
            controller: None,
            window: None,
            init_error: None,
            is_minimized: false,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
            last_fps: None,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Vulkan setup plus the first (windowed, driver-default intent) chain
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let mut renderer = Renderer::new(&self.config, window)?;

        // Chrome as the user first sees it; Windowed restores exactly this
        let mut controller = ModeController::new(window.capture());
        controller
            .refresh(&mut renderer)
            .context("Failed to create the initial swapchain")?;

        self.renderer = Some(renderer);
        self.controller = Some(controller);
        Ok(())
    }

    fn fail_init(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("Initialization failed: {:#}", error);
        self.init_error = Some(error);
        event_loop.exit();
    }

    // =========================================================================
    // MODE SWITCHING
    // =========================================================================

    fn select_mode(&mut self, mode: PresentationMode, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(controller), Some(window)) = (
            self.renderer.as_mut(),
            self.controller.as_mut(),
            self.window.as_ref(),
        ) else {
            return;
        };

        match controller.select(mode, renderer, &**window) {
            Ok(ModeChange::Switched { .. }) => self.update_title(),
            Ok(ModeChange::Unchanged) => {}
            Err(e) => {
                log::error!("Failed to switch to {} mode: {:#}", mode.label(), e);
                self.shutdown(event_loop);
            }
        }
    }

    fn handle_resize(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(controller)) = (self.renderer.as_mut(), self.controller.as_mut())
        else {
            return;
        };

        if let Err(e) = controller.handle_resize(renderer) {
            log::error!("Failed to rebuild swapchain after resize: {:#}", e);
            self.shutdown(event_loop);
        }
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        if self.is_minimized {
            return;
        }

        let (Some(renderer), Some(controller)) = (self.renderer.as_mut(), self.controller.as_mut())
        else {
            return;
        };

        // First chain was deferred: keep asking until the platform agrees
        let status = if renderer.is_ready() {
            render::run_frame(renderer)
        } else {
            Ok(FrameStatus::NeedsRebuild)
        };

        match status {
            Ok(FrameStatus::Presented) => self.update_fps(),
            Ok(FrameStatus::NeedsRebuild) => {
                if let Err(e) = controller.refresh(renderer) {
                    log::error!("Failed to rebuild swapchain: {:#}", e);
                    self.shutdown(event_loop);
                } else {
                    self.update_title();
                }
            }
            Err(FrameError::ExclusiveModeLost) => {
                controller.exclusive_lost();
                notify::show_error("Error", "VK_ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT");
                self.shutdown(event_loop);
            }
            Err(e) => {
                log::error!("Render error: {}", e);
                self.shutdown(event_loop);
            }
        }
    }

    /// Release exclusive mode, drain the GPU, stop the event loop
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("Shutting down...");

        if let (Some(renderer), Some(controller)) = (self.renderer.as_mut(), self.controller.as_mut()) {
            controller.shutdown(renderer);
            if let Err(e) = renderer.wait_idle() {
                log::warn!("Device wait idle failed: {:#}", e);
            }
        }

        event_loop.exit();
    }

    // =========================================================================
    // TITLE / FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            self.last_fps = Some((fps, frame_time * 1000.0));
            self.frame_count = 0;
            self.last_fps_update = now;
            self.update_title();
        }
    }

    fn update_title(&self) {
        let (Some(window), Some(controller)) = (self.window.as_ref(), self.controller.as_ref()) else {
            return;
        };

        window.set_title(&window_title(
            &self.config.window.title,
            controller.mode(),
            controller.exclusive_status(),
            self.last_fps,
        ));
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail_init(event_loop, anyhow::anyhow!("Failed to create window: {}", e));
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.fail_init(event_loop, e);
            return;
        }

        self.window = Some(window);
        self.update_title();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                self.is_minimized = size.width == 0 || size.height == 0;
                if !self.is_minimized {
                    self.handle_resize(event_loop);
                }
            }

            WindowEvent::RedrawRequested => self.render(event_loop),

            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };

                match self.bindings.action(key) {
                    Some(Action::SelectMode(mode)) => self.select_mode(mode, event_loop),
                    Some(Action::Quit) => {
                        log::info!("Quit key pressed, exiting...");
                        self.shutdown(event_loop);
                    }
                    None => {}
                }
            }

            _ => {}
        }
    }

    /// Continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        // Renderer waits for the GPU and tears down Vulkan before the window goes
        self.renderer = None;
        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_shows_mode() {
        let title = window_title(
            "Sample",
            PresentationMode::BorderlessFullscreen,
            ExclusiveStatus::Inactive,
            None,
        );
        assert_eq!(title, "Sample [borderless fullscreen]");
    }

    #[test]
    fn test_title_marks_ungranted_exclusive() {
        let title = window_title(
            "Sample",
            PresentationMode::ExclusiveFullscreen,
            ExclusiveStatus::Requested,
            Some((59.6, 16.78)),
        );
        assert_eq!(title, "Sample [exclusive fullscreen, not granted] - 60 FPS (16.78ms)");
    }
}
