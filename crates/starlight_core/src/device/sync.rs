//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, and the [`FrameSyncSet`] that
//! paces the frame loop:
//!
//! ```text
//! acquire ──signals──▶ present_completed ──waited by──▶ submit
//! submit  ──signals──▶ render_completed  ──waited by──▶ present
//! submit  ──signals──▶ fences[image]     ──waited by──▶ next frame on the same image
//! ```
//!
//! The two semaphores are shared by every frame. The fences are per
//! swapchain image and start signaled so the first wait on each image
//! returns immediately.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for the fence for at most `timeout_ns` nanoseconds
    ///
    /// Returns the raw result so callers can tell `TIMEOUT` from real failures.
    pub fn wait(&self, timeout_ns: u64) -> Result<(), vk::Result> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) }
    }

    /// Reset the fence to the unsignaled state
    pub fn reset(&self) -> Result<(), vk::Result> {
        unsafe { self.device.reset_fences(&[self.fence]) }
    }

    /// Whether the fence is currently signaled
    pub fn is_signaled(&self) -> VulkanResult<bool> {
        unsafe {
            self.device
                .get_fence_status(self.fence)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for the presentation loop
pub struct FrameSyncSet {
    /// Signaled when the acquired image is ready to be rendered to
    pub present_completed: Semaphore,
    /// Signaled when the frame's command buffer has finished executing
    pub render_completed: Semaphore,
    fences: Vec<Fence>,
}

impl FrameSyncSet {
    /// Create one signaled fence per swapchain image and the two shared semaphores
    pub fn new(device: &Device, image_count: usize) -> VulkanResult<Self> {
        let fences = (0..image_count)
            .map(|_| Fence::new(device.clone(), true))
            .collect::<VulkanResult<Vec<_>>>()?;
        let present_completed = Semaphore::new(device.clone())?;
        let render_completed = Semaphore::new(device.clone())?;

        Ok(Self {
            present_completed,
            render_completed,
            fences,
        })
    }

    /// Fence guarding the given swapchain image
    pub fn fence(&self, image_index: usize) -> VulkanResult<&Fence> {
        self.fences
            .get(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!(
                    "image index {image_index} out of range for {} fences",
                    self.fences.len()
                ),
            })
    }

    /// Number of per-image fences
    pub fn fence_count(&self) -> usize {
        self.fences.len()
    }
}
