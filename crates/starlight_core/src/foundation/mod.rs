//! Foundation module - Core utilities shared by the other subsystems
//!
//! - Logging utilities

pub mod logging;
