//! Command pool and command buffer management
//!
//! One pool per queue role, one [`CommandBufferSet`] per role with a primary
//! buffer for every swapchain image, and a type-safe recorder whose render
//! pass scope ends when the guard is dropped.

use ash::{vk, Device};

use super::queues::QueueRole;
use super::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
///
/// Buffers are re-recorded every frame rather than reallocated, so the pool
/// is created with `RESET_COMMAND_BUFFER`.
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
    role: QueueRole,
}

impl CommandPool {
    /// Create a command pool bound to `queue_family_index` for the given role
    pub fn new(device: Device, role: QueueRole, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Created {role} command pool on queue family {queue_family_index}");

        Ok(Self {
            device,
            command_pool,
            role,
        })
    }

    /// Allocate `count` primary command buffers owned by the returned set
    pub fn allocate_set(&self, count: usize) -> VulkanResult<CommandBufferSet> {
        let count = u32::try_from(count).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("cannot allocate {count} command buffers"),
        })?;

        let buffers = if count == 0 {
            Vec::new()
        } else {
            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(count);

            unsafe {
                self.device
                    .allocate_command_buffers(&alloc_info)
                    .map_err(VulkanError::Api)?
            }
        };

        Ok(CommandBufferSet {
            device: self.device.clone(),
            pool: self.command_pool,
            role: self.role,
            buffers,
        })
    }

    /// Role this pool serves
    pub fn role(&self) -> QueueRole {
        self.role
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees any buffers still allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Primary command buffers for one role, one per swapchain image
///
/// Must be dropped before the pool it was allocated from.
pub struct CommandBufferSet {
    device: Device,
    pool: vk::CommandPool,
    role: QueueRole,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBufferSet {
    /// Role of the pool these buffers come from
    pub fn role(&self) -> QueueRole {
        self.role
    }

    /// Number of buffers in the set
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the set holds no buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffer for the given swapchain image
    pub fn get(&self, image_index: usize) -> VulkanResult<vk::CommandBuffer> {
        self.buffers
            .get(image_index)
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!(
                    "image index {image_index} out of range for {} {} command buffers",
                    self.buffers.len(),
                    self.role
                ),
            })
    }

    /// Start recording into the buffer for the given swapchain image
    pub fn record(&self, image_index: usize) -> VulkanResult<CommandRecorder> {
        let command_buffer = self.get(image_index)?;
        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        recorder.begin()?;
        Ok(recorder)
    }
}

impl Drop for CommandBufferSet {
    fn drop(&mut self) {
        if self.buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.pool, &self.buffers);
        }
    }
}

/// Type-safe command buffer recorder
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Create a new command recorder
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Begin command recording
    ///
    /// The buffer is implicitly reset because its pool allows individual resets.
    pub fn begin(&mut self) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Submit)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin render pass; it ends when the returned guard is dropped
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// End command recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Submit)?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }
}

/// Active render pass scope
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    /// Command buffer the pass is being recorded into
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
