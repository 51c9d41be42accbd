// Presentation modes and the transition table between them
//
// The swapchain carries an "exclusive intent" alongside the mode. It is what
// the driver sees in the swapchain create info, so it has to move in lockstep
// with the mode on every edge.

use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentationMode {
    #[default]
    Windowed,
    BorderlessFullscreen,
    ExclusiveFullscreen,
}

impl PresentationMode {
    pub const ALL: [PresentationMode; 3] = [
        PresentationMode::Windowed,
        PresentationMode::BorderlessFullscreen,
        PresentationMode::ExclusiveFullscreen,
    ];

    /// Both fullscreen variants size the swapchain to the monitor
    pub fn is_fullscreen(self) -> bool {
        !matches!(self, PresentationMode::Windowed)
    }

    pub fn intent(self) -> ExclusiveIntent {
        match self {
            PresentationMode::Windowed => ExclusiveIntent::Disallowed,
            PresentationMode::BorderlessFullscreen => ExclusiveIntent::Allowed,
            PresentationMode::ExclusiveFullscreen => ExclusiveIntent::ApplicationControlled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PresentationMode::Windowed => "windowed",
            PresentationMode::BorderlessFullscreen => "borderless fullscreen",
            PresentationMode::ExclusiveFullscreen => "exclusive fullscreen",
        }
    }
}

/// Fullscreen-exclusive behaviour requested from the driver at swapchain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExclusiveIntent {
    /// Driver decides; used for the very first chain
    #[default]
    Default,
    Disallowed,
    Allowed,
    /// We acquire and release exclusive mode explicitly
    ApplicationControlled,
}

impl ExclusiveIntent {
    pub fn to_vk(self) -> vk::FullScreenExclusiveEXT {
        match self {
            ExclusiveIntent::Default => vk::FullScreenExclusiveEXT::DEFAULT,
            ExclusiveIntent::Disallowed => vk::FullScreenExclusiveEXT::DISALLOWED,
            ExclusiveIntent::Allowed => vk::FullScreenExclusiveEXT::ALLOWED,
            ExclusiveIntent::ApplicationControlled => {
                vk::FullScreenExclusiveEXT::APPLICATION_CONTROLLED
            }
        }
    }

    pub fn is_application_controlled(self) -> bool {
        self == ExclusiveIntent::ApplicationControlled
    }
}

/// Window decoration a transition ends with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeTarget {
    /// No border, no title bar, maximized and on top
    Fullscreen,
    /// The placement and decoration captured at startup
    Restore,
}

/// One edge of the mode graph, executed top to bottom by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PresentationMode,
    pub to: PresentationMode,
    /// Release exclusive mode before the old chain goes away
    pub release_exclusive: bool,
    pub intent: ExclusiveIntent,
    pub chrome: ChromeTarget,
    /// Acquire exclusive mode once the new chain exists
    pub acquire_exclusive: bool,
}

/// Plan the edge from `from` to `to`; `None` when `to` is already current.
pub fn plan_transition(
    from: PresentationMode,
    current_intent: ExclusiveIntent,
    to: PresentationMode,
) -> Option<Transition> {
    if from == to {
        return None;
    }

    Some(Transition {
        from,
        to,
        release_exclusive: current_intent.is_application_controlled(),
        intent: to.intent(),
        chrome: if to.is_fullscreen() {
            ChromeTarget::Fullscreen
        } else {
            ChromeTarget::Restore
        },
        acquire_exclusive: to == PresentationMode::ExclusiveFullscreen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentering_any_mode_is_a_no_op() {
        for mode in PresentationMode::ALL {
            assert_eq!(plan_transition(mode, mode.intent(), mode), None);
        }
    }

    #[test]
    fn test_intent_follows_target_mode() {
        for from in PresentationMode::ALL {
            for to in PresentationMode::ALL {
                if let Some(t) = plan_transition(from, from.intent(), to) {
                    assert_eq!(t.intent, to.intent());
                    assert_eq!(t.from, from);
                    assert_eq!(t.to, to);
                }
            }
        }
    }

    #[test]
    fn test_release_only_when_leaving_exclusive() {
        let leave = plan_transition(
            PresentationMode::ExclusiveFullscreen,
            ExclusiveIntent::ApplicationControlled,
            PresentationMode::BorderlessFullscreen,
        )
        .unwrap();
        assert!(leave.release_exclusive);
        assert!(!leave.acquire_exclusive);

        let between = plan_transition(
            PresentationMode::Windowed,
            ExclusiveIntent::Disallowed,
            PresentationMode::BorderlessFullscreen,
        )
        .unwrap();
        assert!(!between.release_exclusive);
    }

    #[test]
    fn test_first_transition_uses_default_intent() {
        let t = plan_transition(
            PresentationMode::Windowed,
            ExclusiveIntent::Default,
            PresentationMode::ExclusiveFullscreen,
        )
        .unwrap();
        assert!(!t.release_exclusive);
        assert!(t.acquire_exclusive);
        assert_eq!(t.chrome, ChromeTarget::Fullscreen);
        assert_eq!(t.intent, ExclusiveIntent::ApplicationControlled);
    }

    #[test]
    fn test_windowed_restores_chrome() {
        let t = plan_transition(
            PresentationMode::BorderlessFullscreen,
            ExclusiveIntent::Allowed,
            PresentationMode::Windowed,
        )
        .unwrap();
        assert_eq!(t.chrome, ChromeTarget::Restore);
        assert_eq!(t.intent, ExclusiveIntent::Disallowed);
    }

    #[test]
    fn test_vk_values() {
        assert_eq!(
            ExclusiveIntent::ApplicationControlled.to_vk(),
            vk::FullScreenExclusiveEXT::APPLICATION_CONTROLLED
        );
        assert_eq!(ExclusiveIntent::default().to_vk(), vk::FullScreenExclusiveEXT::DEFAULT);
    }
}
