//! Device error types
//!
//! Every variant is fatal at the point of detection: nothing in the device
//! retries or recovers locally, callers are expected to shut down.

use ash::vk;
use thiserror::Error;

use super::frame::FrameState;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Instance, layer or extension discovery failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device passed the capability filter
    #[error("No suitable physical device found: {0}")]
    NoSuitableDevice(String),

    /// A queue family was asked for more queues than it exposes
    #[error("Queue family {family} needs {required} queues but only has {available}")]
    QueueOversubscription {
        /// Queue family index
        family: u32,
        /// Number of queues the role assignment needs
        required: u32,
        /// Number of queues the family declares
        available: u32,
    },

    /// The platform rejected the presentation surface
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Acquiring the next swapchain image failed
    #[error("Failed to acquire swapchain image: {0:?}")]
    Acquire(vk::Result),

    /// Waiting on or resetting a frame fence failed
    #[error("Failed to wait for frame fence: {0:?}")]
    FenceWait(vk::Result),

    /// Recording or submitting the frame's command buffer failed
    #[error("Failed to submit frame: {0:?}")]
    Submit(vk::Result),

    /// Presenting the frame failed
    #[error("Failed to present frame: {0:?}")]
    Present(vk::Result),

    /// A bounded wait ran out of time
    #[error("Timed out waiting for the GPU")]
    Timeout,

    /// A wait was cancelled through its cancellation token
    #[error("Wait cancelled")]
    Cancelled,

    /// An earlier frame failed midway and left shared sync objects in an unknown state
    #[error("Previous frame aborted while {0:?}")]
    FrameAborted(FrameState),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
