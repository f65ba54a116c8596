//! Render target: color views, depth-stencil buffer, render pass and framebuffers
//!
//! Every swapchain image gets a color view and a framebuffer. All framebuffers
//! share one depth-stencil image sized to the swapchain extent.

use ash::{vk, Device};

use super::instance::VulkanInstance;
use super::swapchain::Swapchain;
use super::{VulkanError, VulkanResult};

/// Format of the shared depth-stencil attachment
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT_S8_UINT;

/// First memory type allowed by `type_bits` that has all of `properties`
pub fn find_memory_type(
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    device: Device,
    image_view: vk::ImageView,
}

impl ImageView {
    /// Create a 2D view over the first mip level and layer of `image`
    pub fn new(
        device: Device,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let image_view = unsafe {
            device
                .create_image_view(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, image_view })
    }

    /// Get the image view handle
    pub fn handle(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}

/// Depth-stencil image, its memory and its view
///
/// Handles start out null and are filled in as creation progresses, so a
/// failure halfway only releases what was created.
pub struct DepthStencil {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
}

impl DepthStencil {
    /// Create a depth-stencil buffer of the given size in device-local memory
    pub fn new(
        device: Device,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let mut depth = Self {
            device,
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            image_view: vk::ImageView::null(),
        };

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(DEPTH_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        depth.image = unsafe {
            depth
                .device
                .create_image(&image_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { depth.device.get_image_memory_requirements(depth.image) };
        let memory_properties = unsafe {
            instance
                .instance()
                .get_physical_device_memory_properties(physical_device)
        };
        let memory_type_index = find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            &memory_properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        depth.memory = unsafe {
            depth
                .device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            depth
                .device
                .bind_image_memory(depth.image, depth.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let view_create_info = vk::ImageViewCreateInfo::builder()
            .image(depth.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        depth.image_view = unsafe {
            depth
                .device
                .create_image_view(&view_create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!(
            "Created {}x{} depth-stencil buffer in memory type {memory_type_index}",
            extent.width,
            extent.height
        );

        Ok(depth)
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for DepthStencil {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create the clear-only pass: color then depth-stencil, one subpass
    pub fn new(device: Device, color_format: vk::Format) -> VulkanResult<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let attachments = [color_attachment, depth_attachment];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build()];

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            render_pass,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Everything a frame renders into
///
/// Fields are declared in destruction order: framebuffers go first, the
/// views they reference go last.
pub struct RenderTarget {
    framebuffers: Vec<Framebuffer>,
    render_pass: RenderPass,
    depth: DepthStencil,
    color_views: Vec<ImageView>,
    extent: vk::Extent2D,
}

impl RenderTarget {
    /// Build the views, depth buffer, render pass and framebuffers for `swapchain`
    pub fn new(
        device: &Device,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
        swapchain: &Swapchain,
    ) -> VulkanResult<Self> {
        let extent = swapchain.extent();
        let color_format = swapchain.format().format;

        let depth = DepthStencil::new(device.clone(), instance, physical_device, extent)?;

        let color_views = swapchain
            .images()
            .iter()
            .map(|&image| {
                ImageView::new(device.clone(), image, color_format, vk::ImageAspectFlags::COLOR)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let render_pass = RenderPass::new(device.clone(), color_format)?;

        let framebuffers = color_views
            .iter()
            .map(|view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    &[view.handle(), depth.image_view()],
                    extent,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self {
            framebuffers,
            render_pass,
            depth,
            color_views,
            extent,
        })
    }

    /// Get the render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for the given swapchain image
    pub fn framebuffer(&self, image_index: usize) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!(
                    "image index {image_index} out of range for {} framebuffers",
                    self.framebuffers.len()
                ),
            })
    }

    /// Number of framebuffers
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of color views
    pub fn color_view_count(&self) -> usize {
        self.color_views.len()
    }

    /// Shared depth-stencil view
    pub fn depth_view(&self) -> vk::ImageView {
        self.depth.image_view()
    }

    /// Area covered by every framebuffer
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn test_first_device_local_type_in_mask() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let index = find_memory_type(0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL, &properties);
        assert_eq!(index.unwrap(), 1);
    }

    #[test]
    fn test_mask_excludes_types() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(0b110, vk::MemoryPropertyFlags::DEVICE_LOCAL, &properties);
        assert_eq!(index.unwrap(), 2);
    }

    #[test]
    fn test_no_suitable_memory_type() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        let err = find_memory_type(0b01, vk::MemoryPropertyFlags::DEVICE_LOCAL, &properties);
        assert!(matches!(err, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn test_types_past_count_are_ignored() {
        let mut properties = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;

        let err = find_memory_type(0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL, &properties);
        assert!(matches!(err, Err(VulkanError::NoSuitableMemoryType)));
    }
}
