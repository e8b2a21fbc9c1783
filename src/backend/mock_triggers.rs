//! Mock trigger outputs for testing.
//!
//! Logs trigger changes instead of driving GPIO lines and remembers the last
//! level of each gun.

use crate::backend::{BackendError, TriggerOutputs};
use log::info;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock trigger outputs that log events instead of driving pins.
#[derive(Clone, Debug, Default)]
pub struct MockTriggers {
    levels: Arc<Mutex<[bool; 2]>>,
}

impl MockTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of both trigger lines
    pub fn levels(&self) -> [bool; 2] {
        *self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TriggerOutputs for MockTriggers {
    fn set_trigger(&mut self, gun: usize, pulled: bool) -> Result<(), BackendError> {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        let level = levels.get_mut(gun).ok_or(BackendError::UnknownOutput(gun))?;
        if *level != pulled {
            info!("[MOCK TRIGGER] Gun {} {}", gun + 1, if pulled { "PULLED" } else { "RELEASED" });
        }
        *level = pulled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_triggers_track_levels() {
        let mut triggers = MockTriggers::new();
        let view = triggers.clone();
        assert!(triggers.set_trigger(1, true).is_ok());
        assert_eq!(view.levels(), [false, true]);
        assert!(matches!(triggers.set_trigger(2, true), Err(BackendError::UnknownOutput(2))));
    }
}
