//! Backend abstraction for the hardware around the core
//!
//! This module defines the three hardware seams the firmware talks to:
//! - [`RadioLink`]: raw H4 packets to and from the Bluetooth controller
//! - [`VideoHardware`]: composite-sync input and the pulse peripheral
//! - [`TriggerOutputs`]: the trigger-pulled lines for each gun
//!
//! Host builds use the mock and simulated implementations below.

pub mod mock_radio;
pub mod mock_triggers;
pub mod mock_video;
pub mod sim_wiimote;

pub use mock_radio::MockRadio;
pub use mock_triggers::MockTriggers;
pub use mock_video::{FiredLine, MockVideo, VideoLog};
pub use sim_wiimote::SimWiimote;

use crate::bluetooth::PacketRouter;
use crate::video::pulse::PulseTrain;
use std::hint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("Unsupported H4 packet type: {0}")]
    UnsupportedPacket(u8),

    #[error("No such output: {0}")]
    UnknownOutput(usize),
}

/// Two-way packet interface to a Bluetooth controller
pub trait RadioLink: Send {
    /// Hand the radio the receive path. Every packet the controller delivers
    /// afterwards goes through `router`.
    fn attach(&mut self, router: PacketRouter);

    /// Transmit one H4-tagged packet
    fn send_packet(&mut self, packet: &[u8]) -> Result<(), BackendError>;

    /// False while the controller can't take another packet
    fn ready_to_send(&self) -> bool {
        true
    }
}

/// Which outputs the pulse peripheral drives on the next line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputRouting {
    /// Light-gun LED outputs, player 1 then player 2
    pub guns: [bool; 2],
    /// Screen-dim output (draws the spot on the picture)
    pub screen_dim: bool,
}

impl OutputRouting {
    /// Picture only, no gun output
    pub fn screen_only() -> Self {
        Self {
            guns: [false, false],
            screen_dim: true,
        }
    }
}

/// Composite-sync input plus a one-shot pulse peripheral
pub trait VideoHardware: Send {
    /// True while the composite-sync pulse is asserted
    fn sync_active(&mut self) -> bool;

    /// Free-running counter in 80ths of a microsecond
    fn ticks(&mut self) -> u32;

    /// Copy a pulse train into the peripheral's memory
    fn load_pulse_train(&mut self, train: &PulseTrain);

    /// Select outputs for the next transmission
    fn route_outputs(&mut self, routing: OutputRouting);

    /// Start transmitting the loaded train now
    fn start_transmit(&mut self);

    /// Spin until sync ends
    fn wait_sync_inactive(&mut self) {
        while self.sync_active() {
            hint::spin_loop();
        }
    }

    /// Spin until the next sync pulse starts
    fn wait_sync_active(&mut self) {
        while !self.sync_active() {
            hint::spin_loop();
        }
    }

    /// Spin until the sync falling edge, then start the loaded train.
    /// Targets with a faster primitive should override this.
    fn fire_on_sync_edge(&mut self) {
        self.wait_sync_active();
        self.start_transmit();
    }
}

/// Trigger-pulled lines, one per gun
pub trait TriggerOutputs: Send {
    fn set_trigger(&mut self, gun: usize, pulled: bool) -> Result<(), BackendError>;
}
