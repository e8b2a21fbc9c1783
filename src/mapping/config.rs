//! Configuration loader and validator
//!
//! Loads runtime settings and video timing from TOML files in the configs/
//! directory. Every field has a default, so a partial file is fine.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Composite video timing
    #[serde(default)]
    pub video: VideoConfig,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Input task cadence in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Route the spot to the screen-dim output at startup
    #[serde(default = "default_true")]
    pub show_pointer: bool,

    /// Start in co-op mode (both players on gun 1)
    #[serde(default)]
    pub coop: bool,

    /// Show the splash overlay until a Wiimote is connected
    #[serde(default = "default_true")]
    pub show_splash: bool,

    /// Where captured calibrations are kept
    #[serde(default = "default_calibration_file")]
    pub calibration_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            show_pointer: true,
            coop: false,
            show_splash: true,
            calibration_file: default_calibration_file(),
        }
    }
}

fn default_poll_interval() -> u64 { 1 }
fn default_true() -> bool { true }
fn default_calibration_file() -> String { "calibration.json".to_string() }

/// Video timing, in 80ths of a microsecond and scan lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Reticle half-width on its widest line
    #[serde(default = "default_reticle_width")]
    pub reticle_width: f32,

    /// Sync edge to left edge of the usable picture
    #[serde(default = "default_back_porch")]
    pub back_porch: u16,

    /// Usable part of the active line
    #[serde(default = "default_line_duration")]
    pub line_duration: u16,

    /// Lines after vertical sync before the picture
    #[serde(default = "default_blanked_lines")]
    pub blanked_lines: u16,

    /// Usable picture lines
    #[serde(default = "default_visible_lines")]
    pub visible_lines: u16,

    /// Gap between line starts that means a vertical interval
    #[serde(default = "default_vsync_threshold")]
    pub vsync_threshold: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            reticle_width: default_reticle_width(),
            back_porch: default_back_porch(),
            line_duration: default_line_duration(),
            blanked_lines: default_blanked_lines(),
            visible_lines: default_visible_lines(),
            vsync_threshold: default_vsync_threshold(),
        }
    }
}

// PAL values; NTSC wants a narrower reticle
fn default_reticle_width() -> f32 { 75.0 }
fn default_back_porch() -> u16 { 8 * 80 }
fn default_line_duration() -> u16 { 8 * 465 }
fn default_blanked_lines() -> u16 { 24 }
fn default_visible_lines() -> u16 { 250 }
fn default_vsync_threshold() -> u32 { 96 * 80 }

/// Longest segment the pulse peripheral can time
const MAX_PULSE_TICKS: f32 = 32767.0;

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        info!("✓ Config validation passed");
        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        debug!("  - Settings: {:?}", config.settings);
        debug!("  - Video: {:?}", config.video);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let video = &self.video;

        if !video.reticle_width.is_finite() || video.reticle_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "reticle_width must be a positive number".into()
            ));
        }

        if video.reticle_width >= video.back_porch as f32 {
            return Err(ConfigError::Invalid(
                "reticle_width must be smaller than back_porch".into()
            ));
        }

        if video.line_duration == 0 || video.visible_lines == 0 || video.vsync_threshold == 0 {
            return Err(ConfigError::Invalid(
                "line_duration, visible_lines and vsync_threshold must be non-zero".into()
            ));
        }

        let right_edge = video.back_porch as f32 + video.line_duration as f32 + video.reticle_width;
        if right_edge > MAX_PULSE_TICKS {
            return Err(ConfigError::Invalid(format!(
                "back_porch + line_duration + reticle_width is {} ticks, the pulse peripheral stops at {}",
                right_edge, MAX_PULSE_TICKS
            )));
        }

        if self.settings.poll_interval_ms > 1000 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at most 1000".into()
            ));
        }

        Ok(())
    }
}
