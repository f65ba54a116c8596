//! Clear-screen demo
//!
//! Builds a windowed device and clears every frame to a slowly shifting
//! color until the window is closed. An optional settings file (`.toml` or
//! `.ron`) can be passed as the only argument.

use std::time::Instant;

use starlight_core::config::{Config, StarlightConfig};
use starlight_core::device::Device;
use starlight_core::foundation::logging;
use starlight_core::window::Window;

fn load_config() -> Result<StarlightConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading settings from {path}");
            let config = StarlightConfig::load_from_file(&path)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(StarlightConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = load_config()?;
    config.apply()?;

    let window = Window::shared(
        &config.window.title,
        config.window.width,
        config.window.height,
        false,
    )?;
    window.borrow_mut().set_resize_callback(|width, height| {
        log::warn!("Window resized to {width}x{height}; the swapchain keeps its original size");
    });

    let mut device = Device::with_settings(Some(window.clone()), &config.device)?;

    let start = Instant::now();
    while !window.borrow().should_close() {
        let t = start.elapsed().as_secs_f32();
        device.clear(
            0.5 + 0.5 * t.sin(),
            0.5 + 0.5 * (t * 0.7).sin(),
            0.5 + 0.5 * (t * 0.3).sin(),
        )?;
        window.borrow_mut().poll_events();
    }

    device.wait_idle()?;
    log::info!("Presented {} frame(s)", device.frames_presented());
    Ok(())
}
