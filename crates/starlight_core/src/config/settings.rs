//! # Settings files
//!
//! [`StarlightConfig`] bundles everything a host application may want to keep
//! in a settings file: the application info, the main window and the device
//! options. Every section has defaults so partial files are accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{app_info::set_app_info, AppInfo, Config, ConfigError};
use crate::device::WaitPolicy;

/// Main window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Window title
    pub title: String,
    /// Client area width in pixels
    pub width: u32,
    /// Client area height in pixels
    pub height: u32,
    /// Whether the window is visible right after creation
    pub visible: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Starlight".to_string(),
            width: 1280,
            height: 720,
            visible: true,
        }
    }
}

/// Device creation and frame loop options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Whether to enable Vulkan validation layers (auto-detected from the build type when unset)
    pub enable_validation: Option<bool>,
    /// Upper bound for every frame wait in milliseconds (unbounded when unset)
    pub frame_timeout_ms: Option<u64>,
}

impl DeviceSettings {
    /// Resolve the validation setting against the build type
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Wait policy for frame waits derived from these settings
    pub fn wait_policy(&self) -> WaitPolicy {
        match self.frame_timeout_ms {
            Some(ms) => WaitPolicy::with_timeout(Duration::from_millis(ms)),
            None => WaitPolicy::unbounded(),
        }
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that applications load from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarlightConfig {
    /// Application name and version
    pub app: AppInfo,
    /// Main window configuration
    pub window: WindowSettings,
    /// Device options
    pub device: DeviceSettings,
}

impl StarlightConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.app.validate()
    }

    /// Publish the application info of this configuration process-wide
    pub fn apply(&self) -> Result<(), ConfigError> {
        set_app_info(self.app.clone())
    }
}

impl Config for StarlightConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [app]
            name = "Beacon"
            major = 1
            minor = 2
            patch = 3

            [device]
            frame_timeout_ms = 250
        "#;

        let config = StarlightConfig::from_str_with_format(text, "beacon.toml").unwrap();
        assert_eq!(config.app, AppInfo::new("Beacon", 1, 2, 3));
        assert_eq!(config.window, WindowSettings::default());
        assert_eq!(config.device.frame_timeout_ms, Some(250));
        assert_eq!(config.device.wait_policy().timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_ron_window_section() {
        let text = r#"(window: (title: "Debug", width: 640, height: 480, visible: false))"#;

        let config = StarlightConfig::from_str_with_format(text, "debug.ron").unwrap();
        assert_eq!(config.window.title, "Debug");
        assert_eq!((config.window.width, config.window.height), (640, 480));
        assert!(!config.window.visible);
        assert!(config.device.wait_policy().timeout().is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = StarlightConfig::from_str_with_format("", "settings.ini").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(path) if path == "settings.ini"));
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("starlight-config-{}.toml", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let mut config = StarlightConfig::default();
        config.device.enable_validation = Some(false);
        config.save_to_file(&path).unwrap();

        let loaded = StarlightConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
        assert!(!loaded.device.validation_enabled());
    }

    #[test]
    fn test_validate_rejects_oversized_version() {
        let mut config = StarlightConfig::default();
        config.app.patch = 0x1000;
        assert!(config.validate().is_err());
    }
}
