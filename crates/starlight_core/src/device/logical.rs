//! Logical device creation
//!
//! Creates the `VkDevice` with exactly the queues the [`QueueFamilyAssignment`]
//! asks for, fetches one queue per role and creates one command pool per role.

use std::ffi::CStr;

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::commands::CommandPool;
use super::instance::VulkanInstance;
use super::queues::{QueueFamilyAssignment, QueueRole};
use super::selector::DeviceCandidate;
use super::{VulkanError, VulkanResult};

/// Owner of the raw `VkDevice`
struct OwnedDevice(Device);

impl Drop for OwnedDevice {
    fn drop(&mut self) {
        unsafe {
            self.0.destroy_device(None);
        }
    }
}

/// Logical device wrapper with RAII cleanup
///
/// The command pools are declared before the device handle so they are
/// destroyed first.
pub struct LogicalDevice {
    command_pools: [CommandPool; 3],
    queues: [vk::Queue; 3],
    assignment: QueueFamilyAssignment,
    swapchain_loader: SwapchainLoader,
    device: OwnedDevice,
}

impl LogicalDevice {
    /// Extension every logical device is created with
    pub fn required_extensions() -> [&'static CStr; 1] {
        [SwapchainLoader::name()]
    }

    /// Create a new logical device with one queue and command pool per role
    pub fn new(instance: &VulkanInstance, candidate: &DeviceCandidate) -> VulkanResult<Self> {
        let assignment = QueueFamilyAssignment::derive(&candidate.queue_families)?;

        let priorities: Vec<(u32, Vec<f32>)> = assignment
            .queue_requests()
            .map(|(family, count)| (family, vec![1.0; count as usize]))
            .collect();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = priorities
            .iter()
            .map(|(family, priorities)| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*family)
                    .queue_priorities(priorities)
                    .build()
            })
            .collect();

        let extension_names = Self::required_extensions().map(CStr::as_ptr);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names);

        let device = unsafe {
            instance
                .instance()
                .create_device(candidate.handle, &create_info, None)
                .map_err(VulkanError::Api)?
        };
        let device = OwnedDevice(device);

        for (family, priorities) in &priorities {
            log::debug!("Requested {} queue(s) from family {family}", priorities.len());
        }

        let queues = QueueRole::ALL.map(|role| {
            let slot = assignment.slot(role);
            unsafe { device.0.get_device_queue(slot.family, slot.index) }
        });

        let [graphics, compute, transfer] = QueueRole::ALL;
        let command_pools = [
            CommandPool::new(device.0.clone(), graphics, assignment.family(graphics))?,
            CommandPool::new(device.0.clone(), compute, assignment.family(compute))?,
            CommandPool::new(device.0.clone(), transfer, assignment.family(transfer))?,
        ];

        let swapchain_loader = SwapchainLoader::new(instance.instance(), &device.0);

        Ok(Self {
            command_pools,
            queues,
            assignment,
            swapchain_loader,
            device,
        })
    }

    /// Get the raw device handle
    pub fn device(&self) -> &Device {
        &self.device.0
    }

    /// Queue serving `role`
    pub fn queue(&self, role: QueueRole) -> vk::Queue {
        self.queues[role.index()]
    }

    /// Command pool serving `role`
    pub fn command_pool(&self, role: QueueRole) -> &CommandPool {
        &self.command_pools[role.index()]
    }

    /// Role → family table used to create the device
    pub fn assignment(&self) -> &QueueFamilyAssignment {
        &self.assignment
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.0.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        // Pools and the device are destroyed right after this, in field order
        report_teardown_wait("logical device", self.wait_idle());
    }
}

/// Log a failed idle wait during teardown; returns whether the wait succeeded
pub(crate) fn report_teardown_wait(owner: &str, result: VulkanResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to wait for device idle while dropping {owner}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_wait_reports_failure() {
        crate::foundation::logging::init_for_tests();

        assert!(report_teardown_wait("test", Ok(())));
        assert!(!report_teardown_wait(
            "test",
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }
}
