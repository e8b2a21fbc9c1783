//! Wiimote support on top of the Bluetooth stack
//!
//! - `constants`: report ids, PSMs and camera registers
//! - `types`: decoded report data
//! - `session`: per-Wiimote bring-up and report decoding
//! - `manager`: owns the stack and all sessions

pub mod constants;
pub mod manager;
pub mod session;
pub mod types;

pub use manager::{WiimoteId, WiimoteManager};
pub use session::{SessionState, WiimoteSession};
pub use types::{Accel, Button, Buttons, IrSpot, WiimoteData};
