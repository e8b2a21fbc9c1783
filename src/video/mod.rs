//! Composite-sync locked spot generator
//!
//! - `pulse`: pulse-train descriptors
//! - `reticle`: reticle shape and interval merging
//! - `position`: reticle state shared with the input task
//! - `overlay`: splash and calibration banners
//! - `generator`: per-line composition and the real-time loop

pub mod generator;
pub mod overlay;
pub mod position;
pub mod pulse;
pub mod reticle;

pub use generator::{FrameComposer, SpotGenerator};
pub use overlay::Overlay;
pub use position::{ReticleShared, ReticleSnapshot, ScreenPosition};
pub use pulse::{PulseSegment, PulseSpan, PulseTrain};
pub use reticle::{merge_spans, ReticleTable};
