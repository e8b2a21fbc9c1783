//! Trigger executor - drives the gun trigger outputs from gun events
//!
//! Runs on its own thread so a slow output backend never holds up Wiimote
//! polling. It only tracks the level it last wrote for each gun.

use crate::backend::TriggerOutputs;
use crate::mapping::aim::{GunEvent, PLAYERS};
use log::{debug, trace, warn};

pub struct TriggerExecutor<T: TriggerOutputs> {
    outputs: T,
    levels: [bool; PLAYERS],
}

impl<T: TriggerOutputs> TriggerExecutor<T> {
    pub fn new(outputs: T) -> Self {
        Self {
            outputs,
            levels: [false; PLAYERS],
        }
    }

    /// Apply one event to the outputs
    pub fn process_event(&mut self, event: &GunEvent) {
        match *event {
            GunEvent::Trigger { gun, pulled } => self.set(gun, pulled),
            GunEvent::ReleaseAll => {
                debug!("Releasing all triggers");
                self.release_all();
            }
        }
    }

    /// Drive every trigger to released
    pub fn release_all(&mut self) {
        for gun in 0..PLAYERS {
            self.set(gun, false);
        }
    }

    pub fn level(&self, gun: usize) -> bool {
        self.levels.get(gun).copied().unwrap_or(false)
    }

    fn set(&mut self, gun: usize, pulled: bool) {
        match self.outputs.set_trigger(gun, pulled) {
            Ok(()) => {
                trace!("Gun {} trigger {}", gun, pulled);
                if let Some(level) = self.levels.get_mut(gun) {
                    *level = pulled;
                }
            }
            Err(e) => warn!("Failed to set trigger {}: {}", gun, e),
        }
    }
}
