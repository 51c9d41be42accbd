// Window chrome - decoration and placement of the native window
//
// Captured once after the window exists and handed to the mode controller,
// so going back to windowed mode restores exactly what the user had.

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::{Fullscreen, Window, WindowLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Outer position; some platforms (Wayland) never report one
    pub position: Option<PhysicalPosition<i32>>,
    pub size: PhysicalSize<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromeState {
    /// Border and title bar
    pub decorated: bool,
    pub always_on_top: bool,
    pub maximized: bool,
    /// Covers the whole monitor of the window
    pub fills_monitor: bool,
    pub placement: Placement,
}

impl ChromeState {
    /// Chrome for either fullscreen mode, derived from the windowed state
    pub fn fullscreen(&self) -> ChromeState {
        ChromeState {
            decorated: false,
            always_on_top: true,
            maximized: true,
            fills_monitor: true,
            placement: self.placement,
        }
    }
}

/// Read and change window decoration (the Surface Provider side of a mode switch)
pub trait WindowChrome {
    fn capture(&self) -> ChromeState;
    fn apply(&self, state: &ChromeState);
}

impl WindowChrome for Window {
    fn capture(&self) -> ChromeState {
        ChromeState {
            decorated: self.is_decorated(),
            always_on_top: false,
            maximized: self.is_maximized(),
            fills_monitor: self.fullscreen().is_some(),
            placement: Placement {
                position: self.outer_position().ok(),
                size: self.inner_size(),
            },
        }
    }

    fn apply(&self, state: &ChromeState) {
        self.set_decorations(state.decorated);
        self.set_window_level(if state.always_on_top {
            WindowLevel::AlwaysOnTop
        } else {
            WindowLevel::Normal
        });

        if state.fills_monitor {
            self.set_fullscreen(Some(Fullscreen::Borderless(self.current_monitor())));
            self.set_maximized(state.maximized);
            return;
        }

        self.set_fullscreen(None);
        self.set_maximized(state.maximized);
        if !state.maximized {
            if let Some(position) = state.placement.position {
                self.set_outer_position(position);
            }
            // Size change arrives later as a Resized event
            let _ = self.request_inner_size(state.placement.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed() -> ChromeState {
        ChromeState {
            decorated: true,
            always_on_top: false,
            maximized: false,
            fills_monitor: false,
            placement: Placement {
                position: Some(PhysicalPosition::new(120, 80)),
                size: PhysicalSize::new(1280, 720),
            },
        }
    }

    #[test]
    fn test_fullscreen_drops_decoration_and_goes_on_top() {
        let full = windowed().fullscreen();
        assert!(!full.decorated);
        assert!(full.always_on_top);
        assert!(full.maximized);
        assert!(full.fills_monitor);
    }

    #[test]
    fn test_fullscreen_keeps_saved_placement() {
        let saved = windowed();
        assert_eq!(saved.fullscreen().placement, saved.placement);
    }

    #[test]
    fn test_fullscreen_is_idempotent() {
        let full = windowed().fullscreen();
        assert_eq!(full.fullscreen(), full);
    }
}
