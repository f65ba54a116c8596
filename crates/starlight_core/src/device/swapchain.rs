//! Presentation surface and swapchain
//!
//! The swapchain is created once for the window's initial size and never
//! recreated. It uses FIFO presentation, the first format the surface
//! reports and at least two images.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::vk;

use super::instance::VulkanInstance;
use super::logical::LogicalDevice;
use super::{VulkanError, VulkanResult};
use crate::window::SurfaceProvider;

/// Presentation surface wrapper with RAII cleanup
///
/// Must be dropped before the instance and the window it was created from.
pub struct Surface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for the window
    pub fn new(instance: &VulkanInstance, window: &dyn SurfaceProvider) -> VulkanResult<Self> {
        let loader = SurfaceLoader::new(instance.entry(), instance.instance());
        let surface = window
            .create_surface(instance.handle())
            .map_err(|e| VulkanError::SurfaceCreation(e.to_string()))?;

        Ok(Self { loader, surface })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Whether `queue_family` of `physical_device` can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface formats for a physical device
    pub fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Number of swapchain images to request: 2, within the surface's limits
///
/// A `max_image_count` of 0 means the surface has no upper limit.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let max = if caps.max_image_count == 0 {
        u32::MAX
    } else {
        caps.max_image_count
    };
    2u32.max(caps.min_image_count).min(max)
}

/// Swapchain extent, falling back to the window size when the surface leaves it open
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_size: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = window_size;
    vk::Extent2D {
        width: width
            .max(caps.min_image_extent.width)
            .min(caps.max_image_extent.width),
        height: height
            .max(caps.min_image_extent.height)
            .min(caps.max_image_extent.height),
    }
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    requested_image_count: u32,
}

impl Swapchain {
    /// Create the swapchain for `surface`
    pub fn new(
        logical: &LogicalDevice,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        window_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let caps = surface.capabilities(physical_device)?;
        let format = surface
            .formats(physical_device)?
            .first()
            .copied()
            .ok_or_else(|| {
                VulkanError::SurfaceCreation("surface reports no formats".to_string())
            })?;

        let requested_image_count = choose_image_count(&caps);
        let extent = choose_extent(&caps, window_size);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(requested_image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(caps.supported_usage_flags)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = logical.swapchain_loader().clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        log::info!(
            "Created swapchain: {}x{}, {:?}, {} image(s) ({requested_image_count} requested)",
            extent.width,
            extent.height,
            format.format,
            images.len()
        );

        Ok(Self {
            loader,
            swapchain,
            images,
            format,
            extent,
            requested_image_count,
        })
    }

    /// Get the swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain extension loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.loader
    }

    /// Images owned by the swapchain
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Number of images the driver actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Image count passed at creation
    pub fn requested_image_count(&self) -> u32 {
        self.requested_image_count
    }

    /// Surface format of the images
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Size of the images
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_image_count_prefers_two() {
        assert_eq!(choose_image_count(&caps(1, 8)), 2);
        assert_eq!(choose_image_count(&caps(2, 3)), 2);
    }

    #[test]
    fn test_image_count_respects_surface_limits() {
        assert_eq!(choose_image_count(&caps(3, 8)), 3);
        assert_eq!(choose_image_count(&caps(1, 1)), 1);
    }

    #[test]
    fn test_image_count_unbounded_max() {
        assert_eq!(choose_image_count(&caps(1, 0)), 2);
        assert_eq!(choose_image_count(&caps(4, 0)), 4);
    }

    #[test]
    fn test_extent_uses_current_extent() {
        let extent = choose_extent(&caps(2, 3), (800, 600));
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_extent_falls_back_to_clamped_window_size() {
        let mut caps = caps(2, 3);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };

        let extent = choose_extent(&caps, (800, 600));
        assert_eq!((extent.width, extent.height), (800, 600));

        let extent = choose_extent(&caps, (8000, 0));
        assert_eq!((extent.width, extent.height), (4096, 1));
    }
}
