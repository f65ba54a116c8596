//! # Starlight Core
//!
//! GPU device bring-up and frame presentation on Vulkan.
//!
//! ## Features
//!
//! - **Device selection**: scores every physical device and picks the best one
//! - **Queue assignment**: graphics, compute and transfer queues with one command pool each
//! - **Presentation**: surface, swapchain, depth-stencil target, render pass and framebuffers
//! - **Frame loop**: blocking acquire → record → submit → present with per-image fences
//! - **Headless mode**: compute/transfer capable device without any window
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use starlight_core::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let window = Window::shared("Starlight", 1280, 720, false)?;
//!     let mut device = Device::new(Some(window.clone()))?;
//!
//!     while !window.borrow().should_close() {
//!         device.clear(0.1, 0.1, 0.2)?;
//!         window.borrow_mut().poll_events();
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod device;
pub mod foundation;
pub mod version;
pub mod window;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{AppInfo, Config, ConfigError, StarlightConfig},
        device::{
            CancellationToken, Device, FrameState, QueueRole, VulkanError, VulkanResult,
            WaitPolicy,
        },
        window::{SharedWindow, Window, WindowError},
    };
}
