//! wiigun-rs: Wiimote light gun core
//!
//! Tracks a Wiimote's IR camera over a small Bluetooth host stack and draws a
//! reticle on a CRT by emitting light pulses timed against composite sync.

pub mod backend;
pub mod bluetooth;
pub mod manager;
pub mod mapping;
pub mod video;
pub mod wiimote;

// Re-export commonly used items
pub use backend::{RadioLink, TriggerOutputs, VideoHardware};
pub use bluetooth::BluetoothStack;
pub use manager::GunManager;
pub use mapping::{AimProcessor, Calibration, Config};
pub use video::{ReticleShared, SpotGenerator};
pub use wiimote::{WiimoteData, WiimoteManager};
