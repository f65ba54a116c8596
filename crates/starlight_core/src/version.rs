//! Library name and version
//!
//! Reported to the driver as the engine name/version of the Vulkan instance.

/// Name of the library
pub const NAME: &str = "Starlight Core Library";

/// Major version number of the library
pub const MAJOR: u32 = 0;

/// Minor version number of the library
pub const MINOR: u32 = 1;

/// Patch version number of the library
pub const PATCH: u32 = 0;

/// Packed Vulkan version of the library
pub fn packed() -> u32 {
    ash::vk::make_api_version(0, MAJOR, MINOR, PATCH)
}
