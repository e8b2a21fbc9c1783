//! Light gun demo - Main Application
//!
//! Runs the whole pipeline against simulated hardware: a simulated Wiimote
//! answering over the Bluetooth stack, a paced mock composite-sync source and
//! logging trigger outputs. The simulated IR spot sweeps across the screen
//! and the trigger is pulled now and then.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wiigun_rs::backend::{MockTriggers, MockVideo, SimWiimote};
use wiigun_rs::mapping::config::Config;
use wiigun_rs::wiimote::Button;
use wiigun_rs::GunManager;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Wiimote Light Gun ===");
    println!();
    println!("This demo will:");
    println!("1. Bring up a simulated Wiimote over the Bluetooth stack");
    println!("2. Render the reticle against a mock PAL sync source");
    println!("3. Sweep the IR spot and pull the trigger periodically");
    println!();
    println!("Set RUST_LOG=debug for protocol detail. Press Ctrl+C to stop");
    println!();

    let config = Config::load_default()?;
    println!("✓ Loaded configuration from configs/default.toml");

    let wiimote = SimWiimote::new();
    let streaming = Arc::new(AtomicBool::new(true));
    let streamer = wiimote.spawn_streamer(Arc::clone(&streaming), Duration::from_millis(10))?;

    let mut manager = GunManager::new(config, wiimote.clone(), MockVideo::pal().paced(), MockTriggers::new());
    manager.start()?;

    let mut step: u32 = 0;
    while manager.is_running() {
        thread::sleep(Duration::from_millis(20));

        // Sweep left to right across the mirrored camera frame
        let x = 1000 - (step % 100) * 10;
        wiimote.set_spot(Some((x as u16, 384)));
        let trigger = if step % 50 < 5 { Button::A.mask() } else { 0 };
        wiimote.set_buttons(trigger);
        step = step.wrapping_add(1);

        if !wiimote.is_connected() && step % 250 == 0 {
            println!("Waiting for the simulated Wiimote...");
        }
    }

    streaming.store(false, Ordering::SeqCst);
    let _ = streamer.join();
    Ok(())
}
