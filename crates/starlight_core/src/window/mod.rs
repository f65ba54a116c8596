//! Window management using GLFW
//!
//! Provides window creation and event handling for Vulkan presentation.
//!
//! - **`platform`**: the process-wide GLFW lifecycle
//! - **`backend`**: the [`SurfaceProvider`] contract the device consumes

pub mod backend;
pub mod platform;

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use glfw::WindowEvent;
use thiserror::Error;

pub use backend::SurfaceProvider;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The window could not be created
    #[error("Window creation failed: {0}")]
    CreationFailed(String),

    /// Any other error reported by GLFW
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Called with the new framebuffer width and height after a resize
pub type ResizeCallback = Box<dyn FnMut(u32, u32)>;

/// Window shared between the application loop and the device
pub type SharedWindow = Rc<RefCell<Window>>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    resize: Option<ResizeCallback>,
}

impl Window {
    /// Create a window with the given title and client area size
    ///
    /// The window is not resizable and has no client API attached, so it can
    /// only be presented to through Vulkan.
    pub fn new(title: &str, width: u32, height: u32, visible: bool) -> WindowResult<Self> {
        let mut glfw = platform::glfw()?;

        glfw.default_window_hints();
        glfw.window_hint(glfw::WindowHint::Resizable(false));
        glfw.window_hint(glfw::WindowHint::Visible(visible));
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or_else(|| {
                WindowError::CreationFailed(platform::take_error_or("glfwCreateWindow returned null"))
            })?;

        window.set_framebuffer_size_polling(true);
        window.set_close_polling(true);

        log::debug!("Created window '{title}' ({width}x{height}, visible: {visible})");

        Ok(Self {
            glfw,
            window,
            events,
            resize: None,
        })
    }

    /// Create a window wrapped for sharing with a device
    pub fn shared(title: &str, width: u32, height: u32, visible: bool) -> WindowResult<SharedWindow> {
        Ok(Rc::new(RefCell::new(Self::new(title, width, height, visible)?)))
    }

    /// Set the callback invoked when the framebuffer is resized
    ///
    /// The callback runs inside [`Window::poll_events`].
    pub fn set_resize_callback(&mut self, resize: impl FnMut(u32, u32) + 'static) {
        self.resize = Some(Box::new(resize));
    }

    /// Whether a close has been requested
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Withdraw a pending close request
    pub fn cancel_close(&mut self) {
        self.window.set_should_close(false);
    }

    /// Process all pending window events
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let WindowEvent::FramebufferSize(width, height) = event {
                log::trace!("Framebuffer resized to {width}x{height}");
                if let Some(resize) = self.resize.as_mut() {
                    resize(clamp_dimension(width), clamp_dimension(height));
                }
            }
        }
    }

    /// Make the cursor visible over the window
    pub fn show_cursor(&mut self) {
        self.window.set_cursor_mode(glfw::CursorMode::Normal);
    }

    /// Hide the cursor while it is over the window
    pub fn hide_cursor(&mut self) {
        self.window.set_cursor_mode(glfw::CursorMode::Hidden);
    }

    /// Make the window visible
    pub fn show_window(&mut self) {
        self.window.show();
    }

    /// Make the window invisible
    pub fn hide_window(&mut self) {
        self.window.hide();
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (clamp_dimension(width), clamp_dimension(height))
    }
}

impl SurfaceProvider for Window {
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            WindowError::GlfwError(platform::take_error_or(
                "Vulkan is not available for window presentation",
            ))
        })
    }

    fn presentation_support(
        &self,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> bool {
        self.glfw
            .get_physical_device_presentation_support_raw(instance, physical_device, queue_family)
    }

    fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(platform::take_error_or(&format!(
                "Failed to create Vulkan surface: {result:?}"
            ))))
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        Self::framebuffer_size(self)
    }

    fn poll_events(&mut self) {
        Self::poll_events(self);
    }

    fn show_window(&mut self) {
        Self::show_window(self);
    }
}

fn clamp_dimension(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_dimensions_clamp_to_zero() {
        assert_eq!(clamp_dimension(-1), 0);
        assert_eq!(clamp_dimension(0), 0);
        assert_eq!(clamp_dimension(1280), 1280);
    }
}
