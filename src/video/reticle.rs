//! Reticle shape and two-player interval merging

use crate::video::position::ScreenPosition;
use crate::video::pulse::PulseSpan;

/// Height of a reticle in scan lines
pub const RETICLE_LINES: usize = 14;

/// Half-width of the reticle on each of its lines, so the spot renders as a
/// round dot: `w(i) = width * sqrt(1 - y²)` with `y` the line's offset from
/// the centre, normalised to half the height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReticleTable {
    half_widths: [u16; RETICLE_LINES],
}

impl ReticleTable {
    pub fn new(reticle_width: f32) -> Self {
        let half_height = RETICLE_LINES as f32 / 2.0;
        let middle = (RETICLE_LINES as f32 - 1.0) / 2.0;
        let mut half_widths = [0u16; RETICLE_LINES];
        for (i, width) in half_widths.iter_mut().enumerate() {
            let y = (i as f32 - middle) / half_height;
            *width = (reticle_width * (1.0 - y * y).sqrt()) as u16;
        }
        Self { half_widths }
    }

    pub fn half_width(&self, row: usize) -> Option<u16> {
        self.half_widths.get(row).copied()
    }

    /// Interval covered by the reticle at `position` on `line`, if any
    pub fn span(&self, position: ScreenPosition, line: u16) -> Option<PulseSpan> {
        if position.is_hidden() {
            return None;
        }
        let row = line.checked_sub(position.start_line)? as usize;
        let half_width = self.half_width(row)?;
        Some(PulseSpan {
            start: position.x.saturating_sub(half_width),
            end: position.x.saturating_add(half_width),
        })
    }
}

/// Combine two reticle intervals on one line. Overlapping or touching
/// intervals become one; otherwise both come back in ascending start order.
pub fn merge_spans(a: PulseSpan, b: PulseSpan) -> (PulseSpan, Option<PulseSpan>) {
    if a.start <= b.end && b.start <= a.end {
        let merged = PulseSpan {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
        };
        return (merged, None);
    }
    if a.start < b.start {
        (a, Some(b))
    } else {
        (b, Some(a))
    }
}
