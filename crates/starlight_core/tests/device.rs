//! End-to-end device tests
//!
//! These need a Vulkan driver, and the windowed ones a display, so they are
//! ignored by default. Run them with `cargo test -- --ignored`.

use std::time::Duration;

use starlight_core::device::{
    CancellationToken, Device, FrameState, QueueRole, VulkanError, WaitPolicy,
};
use starlight_core::foundation::logging;
use starlight_core::window::{SharedWindow, Window};

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_headless_device_has_every_queue() {
    logging::init_for_tests();

    let device = Device::headless().unwrap();

    assert!(device.is_headless());
    assert!(device.presentation().is_none());
    for role in QueueRole::ALL {
        assert_ne!(device.queue(role), ash::vk::Queue::null());
    }
    let family_count = device.physical_device().queue_families.len();
    for role in QueueRole::ALL {
        assert!((device.assignment().family(role) as usize) < family_count);
    }
    let requested: u32 = device.assignment().queue_requests().map(|(_, count)| count).sum();
    assert_eq!(requested, 3);
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_headless_clear_is_rejected() {
    logging::init_for_tests();

    let mut device = Device::headless().unwrap();
    let err = device.clear(0.0, 0.0, 0.0).unwrap_err();

    assert!(matches!(err, VulkanError::InvalidOperation { .. }));
    assert_eq!(device.frames_presented(), 0);
}

fn single_clear(window: &SharedWindow) {
    let mut device = Device::new(Some(window.clone())).unwrap();

    let presentation = device.presentation().unwrap();
    let image_count = presentation.image_count();
    assert!(image_count >= 2);
    assert_eq!(presentation.render_target().framebuffer_count(), image_count);
    assert_eq!(presentation.render_target().color_view_count(), image_count);
    assert_eq!(presentation.sync().fence_count(), image_count);
    for role in QueueRole::ALL {
        assert_eq!(presentation.command_buffers(role).len(), image_count);
    }

    device.clear(1.0, 0.0, 0.0).unwrap();
    device.wait_idle().unwrap();

    let image = device.last_image_index().unwrap() as usize;
    let fence = device.presentation().unwrap().sync().fence(image).unwrap();
    assert!(fence.is_signaled().unwrap());
    assert_eq!(device.frames_presented(), 1);
    assert_eq!(device.frame_state(), FrameState::Idle);
}

fn repeated_clears(window: &SharedWindow) {
    let mut device = Device::new(Some(window.clone())).unwrap();
    let image_count = device.presentation().unwrap().image_count();
    let frames = image_count * 3;
    let policy = WaitPolicy::with_timeout(Duration::from_secs(5))
        .with_cancellation(CancellationToken::new());

    for frame in 0..frames {
        let shade = frame as f32 / frames as f32;
        device.clear_with(shade, shade, shade, &policy).unwrap();
        window.borrow_mut().poll_events();
    }
    device.wait_idle().unwrap();

    assert_eq!(device.frames_presented(), frames as u64);
    assert!((device.last_image_index().unwrap() as usize) < image_count);
}

fn cancelled_before_acquire(window: &SharedWindow) {
    let mut device = Device::new(Some(window.clone())).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let policy = WaitPolicy::unbounded().with_cancellation(token);

    let err = device.clear_with(0.0, 0.0, 0.0, &policy).unwrap_err();
    assert!(matches!(err, VulkanError::Cancelled));
    // Nothing was acquired, so the next frame may proceed
    assert_eq!(device.frame_state(), FrameState::Idle);
    device.clear(0.0, 0.0, 0.0).unwrap();
    assert_eq!(device.frames_presented(), 1);
}

// GLFW belongs to the first thread that uses it, so every windowed scenario
// runs inside this one test, each with a fresh device on the same window.
#[test]
#[ignore = "requires a Vulkan driver and a display"]
fn test_windowed_device() {
    logging::init_for_tests();

    let window = Window::shared("Starlight test", 1280, 720, false).unwrap();

    single_clear(&window);
    repeated_clears(&window);
    cancelled_before_acquire(&window);
}
