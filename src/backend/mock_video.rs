//! Mock composite-video source for testing.
//!
//! Generates a synthetic composite-sync signal on a virtual clock that
//! advances every time the sync input is polled, and records each pulse train
//! the generator fires together with the line it landed on.
//!
//! Field layout: a vertical interval with sync held for [`VSYNC_LINES`] line
//! periods, then `field_lines` lines each opening with a [`SYNC_WIDTH`] pulse.

use crate::backend::{OutputRouting, VideoHardware};
use crate::video::pulse::{PulseSpan, PulseTrain};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// 64 µs in 80ths of a microsecond
pub const LINE_PERIOD: u32 = 5120;
/// 4.7 µs line sync
pub const SYNC_WIDTH: u32 = 376;
/// Lines after the vertical interval in a PAL field
pub const PAL_FIELD_LINES: u32 = 309;
/// Length of the vertical interval, in line periods
pub const VSYNC_LINES: u32 = 3;

const POLL_STEP: u64 = 8;
const MAX_LOGGED_LINES: usize = 4096;

/// One pulse train as it left the peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredLine {
    pub field: u32,
    /// Line the train started on, or `None` if it fired in the vertical interval
    pub line: Option<u32>,
    pub spans: Vec<PulseSpan>,
    pub routing: OutputRouting,
}

/// Shared record of fired lines, readable from another thread
#[derive(Clone, Default)]
pub struct VideoLog {
    lines: Arc<Mutex<VecDeque<FiredLine>>>,
}

impl VideoLog {
    /// Everything recorded since the last call
    pub fn take(&self) -> Vec<FiredLine> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn record(&self, line: FiredLine) {
        let mut lines = self.lock();
        if lines.len() == MAX_LOGGED_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<FiredLine>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock video hardware on a virtual clock.
pub struct MockVideo {
    now: u64,
    field_lines: u32,
    pacing: Option<Duration>,
    paced_field: u64,
    loaded: Vec<PulseSpan>,
    routing: OutputRouting,
    log: VideoLog,
}

impl MockVideo {
    pub fn new(field_lines: u32) -> Self {
        Self {
            now: 0,
            field_lines,
            pacing: None,
            paced_field: 0,
            loaded: Vec::new(),
            routing: OutputRouting::default(),
            log: VideoLog::default(),
        }
    }

    pub fn pal() -> Self {
        Self::new(PAL_FIELD_LINES)
    }

    /// Sleep one field's worth of wall time per field, so a generator thread
    /// running on this mock doesn't spin a core flat out.
    pub fn paced(mut self) -> Self {
        let field_micros = (self.field_lines + VSYNC_LINES) as u64 * LINE_PERIOD as u64 / 80;
        self.pacing = Some(Duration::from_micros(field_micros));
        self
    }

    pub fn log(&self) -> VideoLog {
        self.log.clone()
    }

    fn field_period(&self) -> u64 {
        (self.field_lines + VSYNC_LINES) as u64 * LINE_PERIOD as u64
    }

    fn vsync_length(&self) -> u64 {
        VSYNC_LINES as u64 * LINE_PERIOD as u64
    }

    fn field(&self) -> u64 {
        self.now / self.field_period()
    }

    fn line(&self) -> Option<u32> {
        let position = self.now % self.field_period();
        position
            .checked_sub(self.vsync_length())
            .map(|active| (active / LINE_PERIOD as u64) as u32)
    }
}

impl VideoHardware for MockVideo {
    fn sync_active(&mut self) -> bool {
        self.now += POLL_STEP;
        if let Some(pace) = self.pacing {
            let field = self.field();
            if field != self.paced_field {
                self.paced_field = field;
                thread::sleep(pace);
            }
        }
        let position = self.now % self.field_period();
        match position.checked_sub(self.vsync_length()) {
            None => true,
            Some(active) => active % (LINE_PERIOD as u64) < SYNC_WIDTH as u64,
        }
    }

    fn ticks(&mut self) -> u32 {
        self.now as u32
    }

    fn load_pulse_train(&mut self, train: &PulseTrain) {
        self.loaded = train.spans();
    }

    fn route_outputs(&mut self, routing: OutputRouting) {
        self.routing = routing;
    }

    fn start_transmit(&mut self) {
        self.log.record(FiredLine {
            field: self.field() as u32,
            line: self.line(),
            spans: std::mem::take(&mut self.loaded),
            routing: self.routing,
        });
    }
}
