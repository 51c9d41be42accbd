// Presentation mode controller
//
// Owns the current mode, the exclusive intent baked into the swapchain and
// the window chrome captured at startup. Every switch runs in this order:
//
//   release exclusive -> set mode/intent -> rebuild chain -> chrome -> acquire exclusive
//
// Release must precede the rebuild: the old chain is destroyed inside it.

use anyhow::Result;

use super::chrome::{ChromeState, WindowChrome};
use super::mode::{plan_transition, ChromeTarget, ExclusiveIntent, PresentationMode};
use super::{DeferReason, PresentTarget, RebuildOutcome, SwapchainRequest};

/// Whether the platform actually granted exclusive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExclusiveStatus {
    #[default]
    Inactive,
    /// Mode is ExclusiveFullscreen but acquisition has not succeeded
    Requested,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged,
    Switched {
        from: PresentationMode,
        to: PresentationMode,
        outcome: RebuildOutcome,
    },
}

pub struct ModeController {
    mode: PresentationMode,
    intent: ExclusiveIntent,
    exclusive: ExclusiveStatus,
    saved_chrome: ChromeState,
}

impl ModeController {
    /// Start windowed with the driver-default exclusive intent
    pub fn new(saved_chrome: ChromeState) -> Self {
        Self {
            mode: PresentationMode::Windowed,
            intent: ExclusiveIntent::Default,
            exclusive: ExclusiveStatus::Inactive,
            saved_chrome,
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn intent(&self) -> ExclusiveIntent {
        self.intent
    }

    pub fn exclusive_status(&self) -> ExclusiveStatus {
        self.exclusive
    }

    pub fn saved_chrome(&self) -> &ChromeState {
        &self.saved_chrome
    }

    /// Request for a chain matching the current state
    pub fn request(&self) -> SwapchainRequest {
        SwapchainRequest {
            mode: self.mode,
            intent: self.intent,
        }
    }

    /// Switch to `target`. Re-selecting the current mode does nothing.
    pub fn select<T, W>(
        &mut self,
        target: PresentationMode,
        present: &mut T,
        window: &W,
    ) -> Result<ModeChange>
    where
        T: PresentTarget + ?Sized,
        W: WindowChrome + ?Sized,
    {
        let Some(transition) = plan_transition(self.mode, self.intent, target) else {
            log::debug!("Already in {} mode", target.label());
            return Ok(ModeChange::Unchanged);
        };

        log::info!(
            "Switching presentation mode: {} -> {}",
            transition.from.label(),
            transition.to.label()
        );

        if transition.release_exclusive {
            self.release_exclusive(present);
        }

        self.mode = transition.to;
        self.intent = transition.intent;
        self.exclusive = ExclusiveStatus::Inactive;

        let outcome = present.rebuild(self.request())?;
        log_outcome(outcome);

        let chrome = match transition.chrome {
            ChromeTarget::Fullscreen => self.saved_chrome.fullscreen(),
            ChromeTarget::Restore => self.saved_chrome,
        };
        window.apply(&chrome);

        if transition.acquire_exclusive {
            self.acquire_exclusive(present, outcome);
        }

        Ok(ModeChange::Switched {
            from: transition.from,
            to: transition.to,
            outcome,
        })
    }

    /// Window resized. Rebuilds only if the current mode would now pick a
    /// different extent than the live chain has.
    pub fn handle_resize<T>(&mut self, present: &mut T) -> Result<Option<RebuildOutcome>>
    where
        T: PresentTarget + ?Sized,
    {
        let reported = present.surface_extent()?;

        if reported.width == 0 || reported.height == 0 {
            log::debug!("Surface has zero area, keeping current swapchain");
            return Ok(None);
        }

        let target = present.target_extent(self.mode)?;
        if present.swapchain_extent() == Some(target) {
            return Ok(None);
        }

        log::debug!("Swapchain extent now {}x{}", target.width, target.height);
        self.refresh(present).map(Some)
    }

    /// Rebuild for the current mode, e.g. after the chain went out of date.
    pub fn refresh<T>(&mut self, present: &mut T) -> Result<RebuildOutcome>
    where
        T: PresentTarget + ?Sized,
    {
        if self.exclusive == ExclusiveStatus::Confirmed {
            self.release_exclusive(present);
        }

        let outcome = present.rebuild(self.request())?;
        log_outcome(outcome);

        if self.mode == PresentationMode::ExclusiveFullscreen {
            self.acquire_exclusive(present, outcome);
        }

        Ok(outcome)
    }

    /// The platform took exclusive mode away; there is nothing left to release
    pub fn exclusive_lost(&mut self) {
        self.exclusive = ExclusiveStatus::Inactive;
    }

    /// Give exclusive mode back before the chain is destroyed at exit
    pub fn shutdown<T: PresentTarget + ?Sized>(&mut self, present: &mut T) {
        if self.exclusive == ExclusiveStatus::Confirmed {
            self.release_exclusive(present);
        }
    }

    fn release_exclusive<T: PresentTarget + ?Sized>(&mut self, present: &mut T) {
        match present.release_exclusive() {
            Ok(()) => log::info!("Released fullscreen exclusive mode"),
            Err(e) if self.exclusive == ExclusiveStatus::Confirmed => {
                log::warn!("Releasing fullscreen exclusive mode failed: {:?}", e);
            }
            Err(e) => log::debug!("Exclusive mode was never granted ({:?})", e),
        }
        self.exclusive = ExclusiveStatus::Inactive;
    }

    // A refused acquisition keeps the mode; only the status says it is unconfirmed.
    fn acquire_exclusive<T: PresentTarget + ?Sized>(
        &mut self,
        present: &mut T,
        outcome: RebuildOutcome,
    ) {
        if !outcome.is_rebuilt() {
            log::warn!("No new swapchain, fullscreen exclusive acquisition postponed");
            self.exclusive = ExclusiveStatus::Requested;
            return;
        }

        match present.acquire_exclusive() {
            Ok(()) => {
                log::info!("Acquired fullscreen exclusive mode");
                self.exclusive = ExclusiveStatus::Confirmed;
            }
            Err(e) => {
                log::warn!("Acquiring fullscreen exclusive mode failed: {:?}", e);
                self.exclusive = ExclusiveStatus::Requested;
            }
        }
    }
}

fn log_outcome(outcome: RebuildOutcome) {
    match outcome {
        RebuildOutcome::Rebuilt { extent, image_count } => log::info!(
            "Swapchain rebuilt: {}x{}, {} images",
            extent.width,
            extent.height,
            image_count
        ),
        RebuildOutcome::Deferred(DeferReason::InitializationFailed) => {
            log::warn!("Swapchain creation refused by the platform, retrying on next event")
        }
        RebuildOutcome::Deferred(DeferReason::Minimized) => {
            log::debug!("Swapchain rebuild skipped while minimized")
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
