//! Pulse-train descriptors
//!
//! A line's output is a short list of `(level, duration)` segments, the way
//! the pulse peripheral consumes them. Durations are counter ticks measured
//! from the sync falling edge; a zero duration ends the train.

/// Output level between spots
pub const LEVEL_IDLE: u8 = 1;
/// Output level while a spot is drawn
pub const LEVEL_SPOT: u8 = 0;
/// Segment slots in one peripheral memory block
pub const MAX_SEGMENTS: usize = 64;
/// Widest duration a segment can hold (15 bits)
pub const MAX_DURATION: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseSegment {
    pub level: u8,
    pub duration: u16,
}

/// Half-open interval `[start, end)` of a spot on one line, in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSpan {
    pub start: u16,
    pub end: u16,
}

impl PulseSpan {
    pub fn width(&self) -> u16 {
        self.end.saturating_sub(self.start)
    }
}

/// Fixed-capacity segment list for one line
#[derive(Debug, Clone)]
pub struct PulseTrain {
    segments: [PulseSegment; MAX_SEGMENTS],
    len: usize,
}

impl PulseTrain {
    pub fn new() -> Self {
        Self {
            segments: [PulseSegment::default(); MAX_SEGMENTS],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append a segment. Returns false when the train is full.
    pub fn push(&mut self, level: u8, duration: u16) -> bool {
        if self.len == MAX_SEGMENTS {
            return false;
        }
        self.segments[self.len] = PulseSegment { level, duration };
        self.len += 1;
        true
    }

    /// Lay out ascending, disjoint spans as spot pulses on an idle line and
    /// terminate the train. Spans that are empty, out of order or don't fit
    /// are skipped.
    pub fn fill<I: IntoIterator<Item = PulseSpan>>(&mut self, spans: I) {
        self.clear();
        let mut cursor: u16 = 0;
        for span in spans {
            // idle gap + spot + terminator
            if self.len + 3 > MAX_SEGMENTS {
                break;
            }
            if span.end <= span.start || span.start < cursor {
                continue;
            }
            let gap = span.start - cursor;
            if gap > 0 {
                self.push(LEVEL_IDLE, gap.min(MAX_DURATION));
            }
            self.push(LEVEL_SPOT, span.width().min(MAX_DURATION));
            cursor = span.end;
        }
        self.push(LEVEL_IDLE, 0);
    }

    pub fn segments(&self) -> &[PulseSegment] {
        &self.segments[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spot intervals described by the train, up to its terminator
    pub fn spans(&self) -> Vec<PulseSpan> {
        let mut spans = Vec::new();
        let mut time: u32 = 0;
        for segment in self.segments() {
            if segment.duration == 0 {
                break;
            }
            let end = time + segment.duration as u32;
            if segment.level == LEVEL_SPOT {
                spans.push(PulseSpan {
                    start: time as u16,
                    end: end as u16,
                });
            }
            time = end;
        }
        spans
    }
}

impl Default for PulseTrain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_spot_layout() {
        let mut train = PulseTrain::new();
        train.fill([PulseSpan { start: 1900, end: 2100 }]);
        assert_eq!(
            train.segments(),
            &[
                PulseSegment { level: LEVEL_IDLE, duration: 1900 },
                PulseSegment { level: LEVEL_SPOT, duration: 200 },
                PulseSegment { level: LEVEL_IDLE, duration: 0 },
            ]
        );
    }

    #[test]
    fn two_spots_decode_back() {
        let spans = [PulseSpan { start: 700, end: 800 }, PulseSpan { start: 900, end: 950 }];
        let mut train = PulseTrain::new();
        train.fill(spans);
        assert_eq!(train.len(), 5);
        assert_eq!(train.spans(), spans.to_vec());
    }

    #[test]
    fn spot_at_edge_has_no_leading_gap() {
        let mut train = PulseTrain::new();
        train.fill([PulseSpan { start: 0, end: 10 }]);
        assert_eq!(train.segments()[0], PulseSegment { level: LEVEL_SPOT, duration: 10 });
    }

    #[test]
    fn out_of_order_and_empty_spans_are_skipped() {
        let mut train = PulseTrain::new();
        train.fill([
            PulseSpan { start: 500, end: 600 },
            PulseSpan { start: 550, end: 700 },
            PulseSpan { start: 800, end: 800 },
        ]);
        assert_eq!(train.spans(), vec![PulseSpan { start: 500, end: 600 }]);
    }

    #[test]
    fn overfull_train_stays_terminated() {
        let spans = (0..100u16).map(|i| PulseSpan { start: i * 10 + 1, end: i * 10 + 5 });
        let mut train = PulseTrain::new();
        train.fill(spans);
        assert!(train.len() <= MAX_SEGMENTS);
        assert_eq!(train.segments().last().map(|s| s.duration), Some(0));
    }
}
