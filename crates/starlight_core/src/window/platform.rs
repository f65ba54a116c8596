//! Process-wide window subsystem
//!
//! GLFW is global state with an init/terminate lifecycle and must be driven
//! from a single thread. This module owns that lifecycle:
//!
//! - The first [`glfw`] call claims the calling thread as the window thread
//!   (a process-wide one-time guard) and initializes GLFW on it.
//! - Every [`Window`](super::Window) holds a clone of the same handle.
//! - GLFW is terminated when the last handle is released, which is at the
//!   latest when the window thread's thread-local storage is torn down.
//!
//! Calls from any other thread fail instead of initializing GLFW twice.

use std::cell::{OnceCell, RefCell};
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use super::{WindowError, WindowResult};

static WINDOW_THREAD: OnceLock<ThreadId> = OnceLock::new();

thread_local! {
    static GLFW: OnceCell<glfw::Glfw> = const { OnceCell::new() };
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Shared handle to the initialized window subsystem
pub fn glfw() -> WindowResult<glfw::Glfw> {
    let current = thread::current().id();
    let owner = *WINDOW_THREAD.get_or_init(|| current);
    if owner != current {
        return Err(WindowError::InitializationFailed(format!(
            "window subsystem is owned by thread {owner:?}, called from {current:?}"
        )));
    }

    GLFW.with(|cell| {
        if let Some(glfw) = cell.get() {
            return Ok(glfw.clone());
        }

        let glfw = glfw::init(record_error).map_err(|e| {
            WindowError::InitializationFailed(last_error().unwrap_or_else(|| format!("{e:?}")))
        })?;
        log::info!("Window subsystem initialized (GLFW {})", glfw::get_version_string());

        Ok(cell.get_or_init(|| glfw).clone())
    })
}

/// Most recent diagnostic reported by GLFW on this thread
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Take the most recent diagnostic, or describe the failed operation
pub(crate) fn take_error_or(fallback: &str) -> String {
    LAST_ERROR
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| fallback.to_string())
}

#[allow(clippy::needless_pass_by_value)]
fn record_error(error: glfw::Error, description: String) {
    log::error!("GLFW error {error:?}: {description}");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(description));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_error_falls_back_when_empty() {
        LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
        assert_eq!(take_error_or("surface creation"), "surface creation");
    }

    #[test]
    fn test_take_error_consumes_recorded_message() {
        record_error(glfw::Error::ApiUnavailable, "no Vulkan loader".to_string());
        assert_eq!(last_error().as_deref(), Some("no Vulkan loader"));
        assert_eq!(take_error_or("fallback"), "no Vulkan loader");
        assert!(last_error().is_none());
    }
}
