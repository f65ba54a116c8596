//! Windowed presentation pipeline
//!
//! Everything a windowed device needs on top of the logical device: surface,
//! swapchain, render target, per-image command buffers and frame sync.

use super::commands::CommandBufferSet;
use super::instance::VulkanInstance;
use super::logical::LogicalDevice;
use super::queues::QueueRole;
use super::render_target::RenderTarget;
use super::selector::DeviceCandidate;
use super::swapchain::{Surface, Swapchain};
use super::sync::FrameSyncSet;
use super::{VulkanError, VulkanResult};
use crate::window::SurfaceProvider;

/// Presentation objects of a windowed device
///
/// Fields are declared in destruction order; the surface outlives the
/// swapchain created from it.
pub struct Presentation {
    sync: FrameSyncSet,
    command_buffers: [CommandBufferSet; 3],
    render_target: RenderTarget,
    swapchain: Swapchain,
    surface: Surface,
}

impl Presentation {
    /// Build the presentation pipeline for `window` on an existing logical device
    pub fn new(
        instance: &VulkanInstance,
        logical: &LogicalDevice,
        physical: &DeviceCandidate,
        window: &dyn SurfaceProvider,
    ) -> VulkanResult<Self> {
        let surface = Surface::new(instance, window)?;

        let graphics_family = logical.assignment().family(QueueRole::Graphics);
        if !surface.supports_present(physical.handle, graphics_family)? {
            return Err(VulkanError::SurfaceCreation(format!(
                "graphics queue family {graphics_family} of {} cannot present to the window surface",
                physical.name
            )));
        }

        let swapchain = Swapchain::new(logical, physical.handle, &surface, window.framebuffer_size())?;
        let render_target = RenderTarget::new(logical.device(), instance, physical.handle, &swapchain)?;

        let image_count = swapchain.image_count();
        let [graphics, compute, transfer] = QueueRole::ALL;
        let command_buffers = [
            logical.command_pool(graphics).allocate_set(image_count)?,
            logical.command_pool(compute).allocate_set(image_count)?,
            logical.command_pool(transfer).allocate_set(image_count)?,
        ];

        let sync = FrameSyncSet::new(logical.device(), image_count)?;

        log::debug!("Presentation ready with {image_count} swapchain image(s)");

        Ok(Self {
            sync,
            command_buffers,
            render_target,
            swapchain,
            surface,
        })
    }

    /// Number of swapchain images, framebuffers, fences and buffers per role
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Swapchain presented to
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Views, depth buffer, render pass and framebuffers
    pub fn render_target(&self) -> &RenderTarget {
        &self.render_target
    }

    /// Per-image command buffers allocated from the pool of `role`
    pub fn command_buffers(&self, role: QueueRole) -> &CommandBufferSet {
        &self.command_buffers[role.index()]
    }

    /// Fences and semaphores of the frame loop
    pub fn sync(&self) -> &FrameSyncSet {
        &self.sync
    }
}
