//! Starlight entry point
//!
//! Opens the main window and keeps it responsive until it is closed.

use std::thread;
use std::time::Duration;

use starlight_core::config::WindowSettings;
use starlight_core::foundation::logging;
use starlight_core::window::Window;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let settings = WindowSettings::default();
    let mut window = Window::new(&settings.title, settings.width, settings.height, settings.visible)?;
    log::info!("Starlight started");

    while !window.should_close() {
        window.poll_events();
        thread::sleep(POLL_INTERVAL);
    }

    log::info!("Starlight finished");
    Ok(())
}
