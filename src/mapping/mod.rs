//! Mapping module - converts Wiimote reports into reticle positions and trigger levels

pub mod aim;
pub mod calibration;
pub mod config;
pub mod executor;

pub use aim::{AimProcessor, GunEvent};
pub use calibration::{Calibration, CalibrationError, CalibrationStore, Point};
pub use config::{Config, ConfigError, Settings, VideoConfig};
pub use executor::TriggerExecutor;
