//! Composite-sync spot generator
//!
//! Per scan line:
//! - wait for the line sync to end and time it against the previous line
//! - a long gap means a vertical interval: restart the line count and take a
//!   fresh snapshot of the shared reticle state
//! - build the pulse train for the line into the idle bank
//! - route outputs, then fire on the next sync falling edge
//!
//! Nothing in the per-line path logs or allocates. A line that misses its
//! edge simply isn't drawn.

use crate::backend::{OutputRouting, VideoHardware};
use crate::mapping::config::VideoConfig;
use crate::video::overlay::Overlays;
use crate::video::position::{ReticleShared, ReticleSnapshot};
use crate::video::pulse::PulseTrain;
use crate::video::reticle::{merge_spans, ReticleTable};
use log::info;
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Turns a field snapshot into per-line pulse trains
#[derive(Debug, Clone)]
pub struct FrameComposer {
    table: ReticleTable,
    overlays: Overlays,
}

impl FrameComposer {
    pub fn new(video: &VideoConfig) -> Self {
        Self {
            table: ReticleTable::new(video.reticle_width),
            overlays: Overlays::new(video),
        }
    }

    /// Build `line`'s train. Returns the routing to use, or `None` when the
    /// line stays dark.
    pub fn compose(&self, line: u16, frame: &ReticleSnapshot, train: &mut PulseTrain) -> Option<OutputRouting> {
        let overlay = self.overlays.spans(frame.overlay, line);
        if !overlay.is_empty() {
            train.fill(overlay.iter().copied());
            return Some(OutputRouting::screen_only());
        }

        let first = self.table.span(frame.positions[0], line);
        let second = if frame.two_player {
            self.table.span(frame.positions[1], line)
        } else {
            None
        };

        let mut routing = OutputRouting {
            guns: [false, false],
            screen_dim: frame.show_pointer,
        };
        let gun = |player: usize| if frame.coop { 0 } else { player };

        match (first, second) {
            (None, None) => return None,
            (Some(span), None) => {
                routing.guns[gun(0)] = true;
                train.fill(iter::once(span));
            }
            (None, Some(span)) => {
                routing.guns[gun(1)] = true;
                train.fill(iter::once(span));
            }
            (Some(a), Some(b)) => {
                routing.guns[gun(0)] = true;
                routing.guns[gun(1)] = true;
                let (left, right) = merge_spans(a, b);
                train.fill(iter::once(left).chain(right));
            }
        }
        Some(routing)
    }
}

/// Real-time loop driving the pulse peripheral
pub struct SpotGenerator<H: VideoHardware> {
    hardware: H,
    composer: FrameComposer,
    shared: Arc<ReticleShared>,
    vsync_threshold: u32,
    frame: ReticleSnapshot,
    line: u16,
    last_edge: u32,
    trains: [PulseTrain; 2],
    bank: usize,
    fields: u32,
}

impl<H: VideoHardware> SpotGenerator<H> {
    pub fn new(hardware: H, video: &VideoConfig, shared: Arc<ReticleShared>) -> Self {
        Self {
            hardware,
            composer: FrameComposer::new(video),
            shared,
            vsync_threshold: video.vsync_threshold,
            frame: ReticleSnapshot::default(),
            line: 0,
            last_edge: 0,
            trains: [PulseTrain::new(), PulseTrain::new()],
            bank: 0,
            fields: 0,
        }
    }

    /// Handle one sync edge. Returns after the line's train has been fired
    /// (or skipped) and the next sync pulse has started.
    pub fn service_line(&mut self) {
        self.hardware.wait_sync_inactive();
        let now = self.hardware.ticks();
        let gap = now.wrapping_sub(self.last_edge);
        self.last_edge = now;

        if gap > self.vsync_threshold {
            self.line = 0;
            self.frame = self.shared.snapshot();
            self.fields = self.fields.wrapping_add(1);
        }

        let train = &mut self.trains[self.bank];
        match self.composer.compose(self.line, &self.frame, train) {
            Some(routing) => {
                self.hardware.load_pulse_train(train);
                self.hardware.route_outputs(routing);
                self.hardware.fire_on_sync_edge();
            }
            None => self.hardware.wait_sync_active(),
        }

        self.line = self.line.saturating_add(1);
        self.bank ^= 1;
    }

    /// Service lines until `running` clears
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Spot generator running");
        self.hardware.wait_sync_active();
        while running.load(Ordering::Relaxed) {
            self.service_line();
        }
        info!("Spot generator stopped after {} fields", self.fields);
    }

    /// Vertical intervals seen so far
    pub fn fields(&self) -> u32 {
        self.fields
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }
}
