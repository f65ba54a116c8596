//! Physical device selection
//!
//! Every enumerated device is turned into a [`DeviceCandidate`] snapshot.
//! Candidates that cannot serve all three queue roles, lack the swapchain
//! extension, or (with a window) cannot present from any graphics family are
//! rejected. The rest are ranked by `(device type, device-local memory)` and
//! the best one wins; ties keep the device enumerated first.

use std::ffi::CStr;

use ash::{vk, Instance};

use super::instance::VulkanInstance;
use super::logical::LogicalDevice;
use super::queues::QueueRoles;
use super::{VulkanError, VulkanResult};
use crate::window::SurfaceProvider;

/// Snapshot of one physical device taken at enumeration time
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Physical device handle, owned by the instance
    pub handle: vk::PhysicalDevice,
    /// Driver-reported device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Properties of every queue family, by family index
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Union of the roles the device's families can serve
    pub roles: QueueRoles,
    /// Total size of all device-local heaps in bytes
    pub device_local_memory: u64,
    /// Whether some graphics family can present (always true when headless)
    pub presentable: bool,
    /// Whether `VK_KHR_swapchain` is available
    pub supports_swapchain: bool,
}

impl DeviceCandidate {
    /// 2 for discrete GPUs, 1 for integrated GPUs, 0 for everything else
    pub fn type_rank(&self) -> u8 {
        match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 2,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
            _ => 0,
        }
    }

    /// Ordering key used to pick between suitable devices
    pub fn score(&self) -> (u8, u64) {
        (self.type_rank(), self.device_local_memory)
    }

    /// Check the hard requirements, returning why the device was rejected
    pub fn is_suitable(&self, windowed: bool) -> Result<(), String> {
        if !self.roles.contains(QueueRoles::all()) {
            return Err(format!(
                "queue families only cover {:?}",
                self.roles
            ));
        }
        if !self.supports_swapchain {
            return Err("VK_KHR_swapchain is not supported".to_string());
        }
        if windowed && !self.presentable {
            return Err("no graphics queue family can present to the window".to_string());
        }
        Ok(())
    }
}

/// Sum of the sizes of every heap flagged `DEVICE_LOCAL`
pub fn device_local_total(memory: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory.memory_heaps[..memory.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

/// Best suitable candidate, the earliest one on equal scores
pub fn pick_best(candidates: &[DeviceCandidate], windowed: bool) -> Option<&DeviceCandidate> {
    candidates
        .iter()
        .filter(|candidate| match candidate.is_suitable(windowed) {
            Ok(()) => true,
            Err(reason) => {
                log::debug!("Rejected GPU {}: {reason}", candidate.name);
                false
            }
        })
        .fold(None, |best: Option<&DeviceCandidate>, candidate| match best {
            Some(current) if current.score() >= candidate.score() => Some(current),
            _ => Some(candidate),
        })
}

fn query(
    instance: &Instance,
    handle: vk::PhysicalDevice,
    window: Option<&dyn SurfaceProvider>,
) -> VulkanResult<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(handle) };
    let memory = unsafe { instance.get_physical_device_memory_properties(handle) };
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(handle) };
    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(handle)
            .map_err(VulkanError::Api)?
    };

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let supports_swapchain = LogicalDevice::required_extensions().iter().all(|required| {
        extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == *required
        })
    });

    let presentable = window.map_or(true, |window| {
        (0u32..).zip(&queue_families).any(|(index, family)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && window.presentation_support(instance.handle(), handle, index)
        })
    });

    Ok(DeviceCandidate {
        handle,
        name,
        device_type: properties.device_type,
        roles: QueueRoles::of_families(&queue_families),
        queue_families,
        device_local_memory: device_local_total(&memory),
        presentable,
        supports_swapchain,
    })
}

/// Enumerate the instance's physical devices and pick the best one
pub fn select(
    instance: &VulkanInstance,
    window: Option<&dyn SurfaceProvider>,
) -> VulkanResult<DeviceCandidate> {
    let handles = unsafe {
        instance
            .instance()
            .enumerate_physical_devices()
            .map_err(VulkanError::Api)?
    };

    let candidates = handles
        .into_iter()
        .map(|handle| query(instance.instance(), handle, window))
        .collect::<VulkanResult<Vec<_>>>()?;

    let chosen = pick_best(&candidates, window.is_some()).ok_or_else(|| {
        VulkanError::NoSuitableDevice(format!(
            "none of the {} enumerated device(s) meets the requirements",
            candidates.len()
        ))
    })?;

    let (rank, memory) = chosen.score();
    log::info!(
        "Selected GPU: {} ({:?}, rank {rank}, {} MiB device-local)",
        chosen.name,
        chosen.device_type,
        memory / (1024 * 1024)
    );

    Ok(chosen.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, device_type: vk::PhysicalDeviceType, memory: u64) -> DeviceCandidate {
        DeviceCandidate {
            handle: vk::PhysicalDevice::null(),
            name: name.to_string(),
            device_type,
            queue_families: Vec::new(),
            roles: QueueRoles::all(),
            device_local_memory: memory,
            presentable: true,
            supports_swapchain: true,
        }
    }

    #[test]
    fn test_discrete_beats_integrated_with_more_memory() {
        let candidates = [
            candidate("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU, 16 << 30),
            candidate("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, 4 << 30),
            candidate("cpu", vk::PhysicalDeviceType::CPU, 64 << 30),
        ];

        assert_eq!(pick_best(&candidates, false).unwrap().name, "dgpu");
    }

    #[test]
    fn test_memory_breaks_rank_ties() {
        let candidates = [
            candidate("small", vk::PhysicalDeviceType::DISCRETE_GPU, 4 << 30),
            candidate("large", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30),
        ];

        assert_eq!(pick_best(&candidates, false).unwrap().name, "large");
    }

    #[test]
    fn test_equal_scores_keep_first_enumerated() {
        let candidates = [
            candidate("first", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30),
            candidate("second", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30),
        ];

        assert_eq!(pick_best(&candidates, false).unwrap().name, "first");
    }

    #[test]
    fn test_missing_role_is_rejected() {
        let mut no_compute = candidate("no-compute", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30);
        no_compute.roles = QueueRoles::GRAPHICS | QueueRoles::TRANSFER;
        let candidates = [
            no_compute,
            candidate("other", vk::PhysicalDeviceType::VIRTUAL_GPU, 1 << 30),
        ];

        assert_eq!(pick_best(&candidates, false).unwrap().name, "other");
    }

    #[test]
    fn test_presentability_only_matters_when_windowed() {
        let mut offscreen = candidate("offscreen", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30);
        offscreen.presentable = false;
        let candidates = [offscreen];

        assert!(pick_best(&candidates, false).is_some());
        assert!(pick_best(&candidates, true).is_none());
        assert!(candidates[0].is_suitable(true).unwrap_err().contains("present"));
    }

    #[test]
    fn test_swapchain_extension_is_required() {
        let mut old = candidate("old", vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30);
        old.supports_swapchain = false;

        assert!(old.is_suitable(false).is_err());
        assert!(pick_best(&[old], false).is_none());
    }

    #[test]
    fn test_no_candidates() {
        assert!(pick_best(&[], false).is_none());
    }

    #[test]
    fn test_device_local_total_skips_host_heaps() {
        let mut memory = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 3,
            ..Default::default()
        };
        memory.memory_heaps[0] = vk::MemoryHeap {
            size: 8 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory.memory_heaps[1] = vk::MemoryHeap {
            size: 32 << 30,
            flags: vk::MemoryHeapFlags::empty(),
        };
        memory.memory_heaps[2] = vk::MemoryHeap {
            size: 256 << 20,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        // Beyond memory_heap_count, must be ignored
        memory.memory_heaps[3] = vk::MemoryHeap {
            size: 1 << 40,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        assert_eq!(device_local_total(&memory), (8 << 30) + (256 << 20));
    }
}
