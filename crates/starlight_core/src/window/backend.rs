//! Window interface consumed by the device
//!
//! The device never touches GLFW directly. Everything it needs from the
//! platform window goes through [`SurfaceProvider`], which keeps the device
//! code independent of the windowing crate.

use ash::vk;

use super::WindowResult;

/// Platform window as seen by the device
///
/// # Thread Safety
/// Implementations are expected to live on the window thread; the device
/// that consumes them is not `Send` either.
pub trait SurfaceProvider {
    /// Instance extensions the platform needs for presentation
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Whether `queue_family` of `physical_device` can present on this platform
    fn presentation_support(
        &self,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> bool;

    /// Create a presentation surface for this window
    ///
    /// The caller owns the returned surface and must destroy it before the
    /// instance and before the window itself.
    fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Process pending window events
    fn poll_events(&mut self);

    /// Make the window visible
    fn show_window(&mut self);
}
