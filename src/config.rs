// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;
use winit::keyboard::KeyCode;

use crate::present::PresentationMode;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub controls: ControlsConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Fullscreen Sample".to_string(),
            width: 1280,
            height: 720,
            resizable: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
    /// Swapchain size when the surface reports no preferred extent
    pub fallback_extent: [u32; 2],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [1.0, 0.6, 0.5, 1.0],
            fallback_extent: [1280, 720],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            log_to_file: false,
            log_file: "fullscreen_modes.log".to_string(),
            show_fps: true,
        }
    }
}

/// Control key bindings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub windowed_key: String,
    pub borderless_key: String,
    pub exclusive_key: String,
    pub quit_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            windowed_key: "F1".to_string(),
            borderless_key: "F2".to_string(),
            exclusive_key: "F3".to_string(),
            quit_key: "Escape".to_string(),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults. Runs before logging is set up,
    /// so a read or parse failure is handed back for the caller to report.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path; a missing file means defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Swapchain extent used when the surface leaves the choice to us
    pub fn fallback_extent(&self) -> vk::Extent2D {
        let [width, height] = self.graphics.fallback_extent;
        vk::Extent2D { width, height }
    }

    /// Configured log level filter
    pub fn log_level(&self) -> Result<log::LevelFilter> {
        self.debug
            .log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level '{}'", self.debug.log_level))
    }

    /// Resolve key bindings, falling back to the defaults on a bad table
    pub fn key_bindings(&self) -> KeyBindings {
        KeyBindings::from_config(&self.controls).unwrap_or_else(|e| {
            log::warn!("Invalid [controls] section: {:#}. Using default keys.", e);
            KeyBindings::default()
        })
    }
}

// =============================================================================
// KEY BINDINGS
// =============================================================================

/// What a bound key asks the application to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectMode(PresentationMode),
    Quit,
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: Vec<(KeyCode, Action)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            bindings: vec![
                (KeyCode::F1, Action::SelectMode(PresentationMode::Windowed)),
                (KeyCode::F2, Action::SelectMode(PresentationMode::BorderlessFullscreen)),
                (KeyCode::F3, Action::SelectMode(PresentationMode::ExclusiveFullscreen)),
                (KeyCode::Escape, Action::Quit),
            ],
        }
    }
}

impl KeyBindings {
    pub fn from_config(controls: &ControlsConfig) -> Result<Self> {
        let table = [
            (&controls.windowed_key, Action::SelectMode(PresentationMode::Windowed)),
            (&controls.borderless_key, Action::SelectMode(PresentationMode::BorderlessFullscreen)),
            (&controls.exclusive_key, Action::SelectMode(PresentationMode::ExclusiveFullscreen)),
            (&controls.quit_key, Action::Quit),
        ];

        let mut bindings: Vec<(KeyCode, Action)> = Vec::with_capacity(table.len());
        for (name, action) in table {
            let key = parse_key(name)
                .with_context(|| format!("Unknown key name '{}'", name))?;
            if let Some((_, other)) = bindings.iter().find(|(bound, _)| *bound == key) {
                anyhow::bail!("Key '{}' bound to both {:?} and {:?}", name, other, action);
            }
            bindings.push((key, action));
        }

        Ok(Self { bindings })
    }

    pub fn action(&self, key: KeyCode) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|&(_, action)| action)
    }
}

/// Map a key name from the config file to a physical key code
pub fn parse_key(name: &str) -> Option<KeyCode> {
    let key = match name.trim().to_ascii_lowercase().as_str() {
        "f1" => KeyCode::F1,
        "f2" => KeyCode::F2,
        "f3" => KeyCode::F3,
        "f4" => KeyCode::F4,
        "f5" => KeyCode::F5,
        "f6" => KeyCode::F6,
        "f7" => KeyCode::F7,
        "f8" => KeyCode::F8,
        "f9" => KeyCode::F9,
        "f10" => KeyCode::F10,
        "f11" => KeyCode::F11,
        "f12" => KeyCode::F12,
        "escape" | "esc" => KeyCode::Escape,
        "enter" | "return" => KeyCode::Enter,
        "space" => KeyCode::Space,
        "tab" => KeyCode::Tab,
        "1" => KeyCode::Digit1,
        "2" => KeyCode::Digit2,
        "3" => KeyCode::Digit3,
        "w" => KeyCode::KeyW,
        "b" => KeyCode::KeyB,
        "e" => KeyCode::KeyE,
        "f" => KeyCode::KeyF,
        "q" => KeyCode::KeyQ,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(!config.window.resizable);
        assert_eq!(config.graphics.clear_color, [1.0, 0.6, 0.5, 1.0]);
        assert_eq!(config.fallback_extent(), vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            title = "Modes"

            [controls]
            quit_key = "Q"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Modes");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.controls.quit_key, "Q");
        assert_eq!(config.controls.windowed_key, "F1");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        assert_eq!(config.log_level().unwrap(), log::LevelFilter::Info);

        config.debug.log_level = "trace".to_string();
        assert_eq!(config.log_level().unwrap(), log::LevelFilter::Trace);

        config.debug.log_level = "chatty".to_string();
        let err = config.log_level().unwrap_err();
        assert!(err.to_string().contains("chatty"));
    }

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults_without_error() {
        let path = std::env::temp_dir().join("fullscreen-modes-no-such-config.toml");
        let (config, error) = Config::load_or_default(&path);

        assert!(error.is_none());
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn test_malformed_file_gives_defaults_and_reports_error() {
        let path = scratch_file("malformed-config.toml", "[window]\nwidth = \"wide\"");
        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        let error = error.expect("malformed file must be reported");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.controls.quit_key, "Escape");
    }

    #[test]
    fn test_valid_file_is_loaded() {
        let path = scratch_file("valid-config.toml", "[window]\nwidth = 800");
        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(error.is_none());
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::from_config(&ControlsConfig::default()).unwrap();

        assert_eq!(
            bindings.action(KeyCode::F1),
            Some(Action::SelectMode(PresentationMode::Windowed))
        );
        assert_eq!(
            bindings.action(KeyCode::F2),
            Some(Action::SelectMode(PresentationMode::BorderlessFullscreen))
        );
        assert_eq!(
            bindings.action(KeyCode::F3),
            Some(Action::SelectMode(PresentationMode::ExclusiveFullscreen))
        );
        assert_eq!(bindings.action(KeyCode::Escape), Some(Action::Quit));
        assert_eq!(bindings.action(KeyCode::F4), None);
    }

    #[test]
    fn test_key_names_are_case_insensitive() {
        assert_eq!(parse_key("escape"), Some(KeyCode::Escape));
        assert_eq!(parse_key(" F11 "), Some(KeyCode::F11));
        assert_eq!(parse_key("PageDown"), None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let controls = ControlsConfig {
            exclusive_key: "Hyper".to_string(),
            ..ControlsConfig::default()
        };
        assert!(KeyBindings::from_config(&controls).is_err());
    }

    #[test]
    fn test_duplicate_key_rejected_and_defaults_used() {
        let mut config = Config::default();
        config.controls.borderless_key = "F1".to_string();
        assert!(KeyBindings::from_config(&config.controls).is_err());

        let bindings = config.key_bindings();
        assert_eq!(
            bindings.action(KeyCode::F2),
            Some(Action::SelectMode(PresentationMode::BorderlessFullscreen))
        );
    }
}
