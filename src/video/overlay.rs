//! Text overlays drawn with the screen-dim output
//!
//! Overlays are tiny bitmaps rendered from a 5x5 font. Each bitmap row is
//! precomputed into the spans it covers, so drawing a line is just a lookup.

use crate::mapping::config::VideoConfig;
use crate::video::pulse::PulseSpan;

/// Ticks per bitmap column
const PIXEL_TICKS: u16 = 80;
/// Scan lines per bitmap row
const ROW_LINES: u16 = 6;
const GLYPH_HEIGHT: usize = 5;
const GLYPH_WIDTH: usize = 5;

const SPLASH_TEXT: &str = "WIIGUN";
const CALIBRATING_TEXT: &str = "CAL";

/// Which overlay, if any, covers the current field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Splash,
    Calibrating,
}

fn glyph(c: char) -> [u8; GLYPH_HEIGHT] {
    match c {
        'A' => [0b01110, 0b10001, 0b11111, 0b10001, 0b10001],
        'C' => [0b01111, 0b10000, 0b10000, 0b10000, 0b01111],
        'G' => [0b01111, 0b10000, 0b10011, 0b10001, 0b01111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'W' => [0b10001, 0b10001, 0b10101, 0b10101, 0b01010],
        _ => [0; GLYPH_HEIGHT],
    }
}

/// One rendered text block
#[derive(Debug, Clone)]
pub struct OverlayImage {
    first_line: u16,
    rows: Vec<Vec<PulseSpan>>,
}

impl OverlayImage {
    /// Render `text` horizontally centred, with its top row on `first_line`
    pub fn from_text(text: &str, first_line: u16, video: &VideoConfig) -> Self {
        let glyphs: Vec<[u8; GLYPH_HEIGHT]> = text.chars().map(glyph).collect();
        let columns = (glyphs.len() * (GLYPH_WIDTH + 1)).saturating_sub(1) as u16;
        let left = video.back_porch + video.line_duration.saturating_sub(columns * PIXEL_TICKS) / 2;

        let rows = (0..GLYPH_HEIGHT)
            .map(|row| {
                let bits: Vec<bool> = glyphs
                    .iter()
                    .flat_map(|g| {
                        (0..GLYPH_WIDTH)
                            .map(move |col| g[row] & (1 << (GLYPH_WIDTH - 1 - col)) != 0)
                            .chain(std::iter::once(false))
                    })
                    .collect();
                runs(&bits, left)
            })
            .collect();

        Self { first_line, rows }
    }

    /// Spans to draw on `line`, empty when the line misses the image
    pub fn spans(&self, line: u16) -> &[PulseSpan] {
        let Some(offset) = line.checked_sub(self.first_line) else {
            return &[];
        };
        self.rows
            .get((offset / ROW_LINES) as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn height(&self) -> u16 {
        self.rows.len() as u16 * ROW_LINES
    }
}

/// Collapse lit columns into spans starting at `left`
fn runs(bits: &[bool], left: u16) -> Vec<PulseSpan> {
    let mut spans = Vec::new();
    let mut start = None;
    for (col, lit) in bits.iter().chain(std::iter::once(&false)).enumerate() {
        let x = left + col as u16 * PIXEL_TICKS;
        match (start, *lit) {
            (None, true) => start = Some(x),
            (Some(s), false) => {
                spans.push(PulseSpan { start: s, end: x });
                start = None;
            }
            _ => {}
        }
    }
    spans
}

/// The splash and calibration banners for one video timing
#[derive(Debug, Clone)]
pub struct Overlays {
    splash: OverlayImage,
    calibrating: OverlayImage,
}

impl Overlays {
    pub fn new(video: &VideoConfig) -> Self {
        let height = GLYPH_HEIGHT as u16 * ROW_LINES;
        let centre = video.blanked_lines + video.visible_lines.saturating_sub(height) / 2;
        Self {
            splash: OverlayImage::from_text(SPLASH_TEXT, centre, video),
            calibrating: OverlayImage::from_text(CALIBRATING_TEXT, video.blanked_lines + ROW_LINES, video),
        }
    }

    pub fn spans(&self, overlay: Overlay, line: u16) -> &[PulseSpan] {
        match overlay {
            Overlay::None => &[],
            Overlay::Splash => self.splash.spans(line),
            Overlay::Calibrating => self.calibrating.spans(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_merge_adjacent_pixels() {
        let spans = runs(&[true, true, false, true], 1000);
        assert_eq!(
            spans,
            vec![
                PulseSpan { start: 1000, end: 1160 },
                PulseSpan { start: 1240, end: 1320 },
            ]
        );
    }

    #[test]
    fn text_is_centred_and_row_sized() {
        let video = VideoConfig::default();
        let image = OverlayImage::from_text("L", 50, &video);
        assert_eq!(image.height(), 30);
        // One 5-column glyph, centred in the 3720-tick line
        let left = 640 + (3720 - 5 * 80) / 2;
        assert_eq!(image.spans(50), &[PulseSpan { start: left, end: left + 80 }]);
        assert_eq!(image.spans(79), &[PulseSpan { start: left, end: left + 400 }]);
        assert!(image.spans(49).is_empty());
        assert!(image.spans(80).is_empty());
    }

    #[test]
    fn splash_sits_in_the_middle_of_the_picture() {
        let video = VideoConfig::default();
        let overlays = Overlays::new(&video);
        // 24 + (250 - 30) / 2
        assert!(overlays.spans(Overlay::Splash, 133).is_empty());
        assert!(!overlays.spans(Overlay::Splash, 134).is_empty());
        assert!(overlays.spans(Overlay::None, 134).is_empty());
        assert!(!overlays.spans(Overlay::Calibrating, 30).is_empty());
    }
}
