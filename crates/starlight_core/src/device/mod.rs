//! GPU device bring-up and frame presentation
//!
//! [`Device`] composes the pieces in dependency order:
//!
//! 1. [`instance`]: Vulkan instance with windowed or headless extensions
//! 2. [`selector`]: scores the physical devices and picks one
//! 3. [`logical`] and [`queues`]: logical device, one queue and command pool per role
//! 4. [`presentation`] (windowed only): surface, swapchain, render target, sync
//! 5. [`frame`]: the blocking acquire/record/submit/present loop
//!
//! Each piece owns its Vulkan handles and releases them on drop; the façade's
//! field order makes teardown run in reverse creation order.

pub mod commands;
pub mod error;
pub mod frame;
pub mod instance;
pub mod logical;
pub mod presentation;
pub mod queues;
pub mod render_target;
pub mod selector;
pub mod swapchain;
pub mod sync;

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;

pub use error::{VulkanError, VulkanResult};
pub use frame::{CancellationToken, FrameState, FrameSubmitter, WaitFailure, WaitPolicy};
pub use instance::VulkanInstance;
pub use logical::LogicalDevice;
pub use presentation::Presentation;
pub use queues::{QueueFamilyAssignment, QueueRole, QueueRoles, QueueSlot};
pub use selector::DeviceCandidate;

use crate::config::{self, DeviceSettings};
use crate::window::{SharedWindow, SurfaceProvider};

/// Window as the device sees it
pub type SharedSurfaceProvider = Rc<RefCell<dyn SurfaceProvider>>;

/// GPU device, optionally bound to a window for presentation
///
/// Not `Send`: it shares the window with the application loop and GLFW
/// windows belong to the main thread.
pub struct Device {
    presentation: Option<Presentation>,
    frame: FrameSubmitter,
    logical: LogicalDevice,
    physical: DeviceCandidate,
    instance: VulkanInstance,
    window: Option<SharedSurfaceProvider>,
    wait_policy: WaitPolicy,
}

impl Device {
    /// Create a device presenting to `window`, or a headless one
    pub fn new(window: Option<SharedWindow>) -> VulkanResult<Self> {
        Self::with_settings(window, &DeviceSettings::default())
    }

    /// Create a device without any window
    pub fn headless() -> VulkanResult<Self> {
        Self::new(None)
    }

    /// Create a device with explicit validation and frame wait settings
    pub fn with_settings(
        window: Option<SharedWindow>,
        settings: &DeviceSettings,
    ) -> VulkanResult<Self> {
        let window = window.map(|window| window as SharedSurfaceProvider);
        Self::with_surface_provider(window, settings)
    }

    /// Create a device presenting through any [`SurfaceProvider`]
    pub fn with_surface_provider(
        window: Option<SharedSurfaceProvider>,
        settings: &DeviceSettings,
    ) -> VulkanResult<Self> {
        let app = config::app_info();

        let borrowed = window.as_ref().map(|window| window.borrow());
        let provider = borrowed.as_deref();

        let instance = VulkanInstance::new(&app, provider, settings.validation_enabled())?;
        let physical = selector::select(&instance, provider)?;
        let logical = LogicalDevice::new(&instance, &physical)?;
        let presentation = provider
            .map(|provider| Presentation::new(&instance, &logical, &physical, provider))
            .transpose()?;
        drop(borrowed);

        if let Some(window) = &window {
            let mut window = window.borrow_mut();
            window.poll_events();
            window.show_window();
        }

        let assignment = logical.assignment();
        log::info!(
            "Device ready on {} ({}; graphics family {}, compute family {}, transfer family {})",
            physical.name,
            if presentation.is_some() { "windowed" } else { "headless" },
            assignment.family(QueueRole::Graphics),
            assignment.family(QueueRole::Compute),
            assignment.family(QueueRole::Transfer),
        );

        Ok(Self {
            presentation,
            frame: FrameSubmitter::new(),
            logical,
            physical,
            instance,
            window,
            wait_policy: settings.wait_policy(),
        })
    }

    /// Clear the next swapchain image to an opaque color and present it
    ///
    /// Waits according to the policy the device was created with.
    pub fn clear(&mut self, r: f32, g: f32, b: f32) -> VulkanResult<()> {
        let policy = self.wait_policy.clone();
        self.clear_with(r, g, b, &policy)
    }

    /// [`clear`](Self::clear) with an explicit wait policy
    pub fn clear_with(&mut self, r: f32, g: f32, b: f32, policy: &WaitPolicy) -> VulkanResult<()> {
        let presentation = self
            .presentation
            .as_ref()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "cannot present from a headless device".to_string(),
            })?;

        let image = self
            .frame
            .run(&self.logical, presentation, [r, g, b, 1.0], policy)?;
        log::trace!("Presented frame {} on image {image}", self.frame.frames_presented());
        Ok(())
    }

    /// Queue serving `role`
    pub fn queue(&self, role: QueueRole) -> vk::Queue {
        self.logical.queue(role)
    }

    /// Role → queue family table
    pub fn assignment(&self) -> &QueueFamilyAssignment {
        self.logical.assignment()
    }

    /// The physical device that was selected
    pub fn physical_device(&self) -> &DeviceCandidate {
        &self.physical
    }

    /// Vulkan instance
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// Logical device, queues and command pools
    pub fn logical(&self) -> &LogicalDevice {
        &self.logical
    }

    /// Presentation objects, `None` for a headless device
    pub fn presentation(&self) -> Option<&Presentation> {
        self.presentation.as_ref()
    }

    /// Whether the device was created without a window
    pub fn is_headless(&self) -> bool {
        self.window.is_none()
    }

    /// Number of frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.frame.frames_presented()
    }

    /// Swapchain image of the last presented frame
    pub fn last_image_index(&self) -> Option<u32> {
        self.frame.last_image()
    }

    /// State of the frame loop; not [`FrameState::Idle`] after a failed frame
    pub fn frame_state(&self) -> FrameState {
        self.frame.state()
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.logical.wait_idle()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Presentation objects are destroyed right after this
        logical::report_teardown_wait("device", self.logical.wait_idle());
    }
}
