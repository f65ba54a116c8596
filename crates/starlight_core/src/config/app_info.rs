//! Process-wide application information
//!
//! The application name and version live behind a read-write lock so any
//! thread may read them while a caller replaces all four fields at once with
//! [`set_app_info`]. Version components follow the packed Vulkan layout:
//! 10 bits major, 10 bits minor, 12 bits patch.

use std::sync::{LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::version;

/// Largest major version representable in the packed version
pub const MAX_MAJOR: u16 = 0x3ff;
/// Largest minor version representable in the packed version
pub const MAX_MINOR: u16 = 0x3ff;
/// Largest patch version representable in the packed version
pub const MAX_PATCH: u16 = 0xfff;

const _: () = assert!(version::MAJOR <= MAX_MAJOR as u32);
const _: () = assert!(version::MINOR <= MAX_MINOR as u32);
const _: () = assert!(version::PATCH <= MAX_PATCH as u32);

/// Name and version of the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// The name of the application
    pub name: String,
    /// The major version number (0..=1023)
    pub major: u16,
    /// The minor version number (0..=1023)
    pub minor: u16,
    /// The patch version number (0..=4095)
    pub patch: u16,
}

impl AppInfo {
    /// Create application info
    pub fn new(name: impl Into<String>, major: u16, minor: u16, patch: u16) -> Self {
        Self {
            name: name.into(),
            major,
            minor,
            patch,
        }
    }

    /// Check that every version component fits its bit width
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("major", self.major, MAX_MAJOR),
            ("minor", self.minor, MAX_MINOR),
            ("patch", self.patch, MAX_PATCH),
        ];
        for (component, value, max) in checks {
            if value > max {
                return Err(ConfigError::InvalidVersion {
                    component,
                    value,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Version packed the way `VkApplicationInfo` expects it
    pub fn packed_version(&self) -> u32 {
        ash::vk::make_api_version(
            0,
            u32::from(self.major),
            u32::from(self.minor),
            u32::from(self.patch),
        )
    }
}

impl Default for AppInfo {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self::new(
            "Starlight",
            version::MAJOR as u16,
            version::MINOR as u16,
            version::PATCH as u16,
        )
    }
}

static APP_INFO: LazyLock<RwLock<AppInfo>> = LazyLock::new(|| RwLock::new(AppInfo::default()));

/// Snapshot of the current application info
pub fn app_info() -> AppInfo {
    APP_INFO
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Get the name of the application
pub fn app_name() -> String {
    APP_INFO
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .name
        .clone()
}

/// Get the major version number of the application
pub fn app_major() -> u16 {
    APP_INFO.read().unwrap_or_else(PoisonError::into_inner).major
}

/// Get the minor version number of the application
pub fn app_minor() -> u16 {
    APP_INFO.read().unwrap_or_else(PoisonError::into_inner).minor
}

/// Get the patch version number of the application
pub fn app_patch() -> u16 {
    APP_INFO.read().unwrap_or_else(PoisonError::into_inner).patch
}

/// Replace the application info atomically
///
/// Readers see either the old or the new info, never a mix of both.
pub fn set_app_info(info: AppInfo) -> Result<(), ConfigError> {
    info.validate()?;
    log::debug!(
        "Application info set to {} {}.{}.{}",
        info.name,
        info.major,
        info.minor,
        info.patch
    );
    *APP_INFO.write().unwrap_or_else(PoisonError::into_inner) = info;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_limits() {
        assert!(AppInfo::new("ok", MAX_MAJOR, MAX_MINOR, MAX_PATCH).validate().is_ok());

        let err = AppInfo::new("major", MAX_MAJOR + 1, 0, 0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersion { component: "major", .. }));

        let err = AppInfo::new("minor", 0, 1024, 0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersion { component: "minor", .. }));

        let err = AppInfo::new("patch", 0, 0, 4096).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersion { component: "patch", max: 0xfff, .. }));
    }

    #[test]
    fn test_packed_version_layout() {
        let info = AppInfo::new("packed", 1, 2, 3);
        assert_eq!(info.packed_version(), (1 << 22) | (2 << 12) | 3);
    }

    #[test]
    fn test_set_app_info_is_all_or_nothing() {
        let before = app_info();

        // Rejected info leaves the stored info untouched
        assert!(set_app_info(AppInfo::new("Broken", 0, 0, 5000)).is_err());
        assert_eq!(app_info(), before);

        set_app_info(AppInfo::new("Sandbox", 3, 14, 159)).unwrap();
        assert_eq!(app_name(), "Sandbox");
        assert_eq!((app_major(), app_minor(), app_patch()), (3, 14, 159));

        set_app_info(before).unwrap();
    }
}
