//! Four-point aim calibration
//!
//! A calibration is the camera-space position of the IR spot when the gun
//! points at each screen corner, in the order top-left, top-right,
//! bottom-left, bottom-right. Aim points inside that quadrilateral are
//! mapped to the unit square; anything outside is not drawn.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Failed to access calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode calibration file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Camera-space point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub corners: [Point; 4],
}

impl Default for Calibration {
    /// The whole camera frame. The camera sees the scene mirrored, so the
    /// screen's left edge is at camera x = 1023.
    fn default() -> Self {
        Self {
            corners: [
                Point::new(1023.0, 0.0),
                Point::new(0.0, 0.0),
                Point::new(1023.0, 767.0),
                Point::new(0.0, 767.0),
            ],
        }
    }
}

/// Smallest quad area, in squared camera pixels, that still maps an aim point
const MIN_AREA: f64 = 1.0;

fn cross(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
    ux * vy - uy * vx
}

impl Calibration {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// True if the corners enclose no area (all equal or all on one line)
    pub fn is_degenerate(&self) -> bool {
        let c = &self.corners;
        let mut twice_area = 0.0;
        for (a, b) in [(0, 1), (1, 3), (3, 2), (2, 0)] {
            twice_area += cross(c[a].x as f64, c[a].y as f64, c[b].x as f64, c[b].y as f64);
        }
        twice_area.abs() < 2.0 * MIN_AREA
    }

    /// True if `p` lies inside the quadrilateral (edges included). Either
    /// winding is accepted, so mirrored calibrations work too. A degenerate
    /// quad contains nothing.
    pub fn within(&self, p: Point) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let c = &self.corners;
        let mut all_left = true;
        let mut all_right = true;
        for (a, b) in [(0, 1), (1, 3), (3, 2), (2, 0)] {
            let side = cross(
                (c[b].x - c[a].x) as f64,
                (c[b].y - c[a].y) as f64,
                (p.x - c[a].x) as f64,
                (p.y - c[a].y) as f64,
            );
            all_left &= side >= 0.0;
            all_right &= side <= 0.0;
        }
        all_left || all_right
    }

    /// Map `p` into the unit square. `None` when it is outside the quad.
    pub fn remap(&self, p: Point) -> Option<(f32, f32)> {
        if !self.within(p) {
            return None;
        }
        let u = self.solve(p, [0, 2, 1, 3]).clamp(0.0, 1.0);
        let v = self.solve(p, [0, 1, 2, 3]).clamp(0.0, 1.0);
        Some((u as f32, v as f32))
    }

    /// Find `t` such that the segment from lerp(a, c, t) to lerp(b, d, t)
    /// passes through `p`. Solved as a quadratic with the corners moved so
    /// `p` is the origin.
    fn solve(&self, p: Point, [a, b, c, d]: [usize; 4]) -> f64 {
        let k = self
            .corners
            .map(|corner| ((corner.x - p.x) as f64, (corner.y - p.y) as f64));

        let qa = cross(k[b].0 - k[d].0, k[b].1 - k[d].1, k[c].0 - k[a].0, k[c].1 - k[a].1);
        let qb = 2.0 * cross(k[b].0, k[b].1, k[a].0, k[a].1)
            - cross(k[b].0, k[b].1, k[c].0, k[c].1)
            - cross(k[d].0, k[d].1, k[a].0, k[a].1);
        let qc = cross(k[a].0, k[a].1, k[b].0, k[b].1);

        if qa == 0.0 {
            return if qb == 0.0 { -1.0 } else { -qc / qb };
        }
        let discriminant = qb * qb - 4.0 * qa * qc;
        if discriminant < 0.0 {
            return -1.0;
        }
        // Cancellation-free form, so a nearly rectangular quad stays accurate
        let q = -0.5 * (qb + qb.signum() * discriminant.sqrt());
        let near = if q == 0.0 { -1.0 } else { qc / q };
        if (0.0..=1.0).contains(&near) {
            near
        } else {
            q / qa
        }
    }
}

/// Per-player calibrations kept on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStore {
    pub players: [Calibration; 2],
}

impl CalibrationStore {
    /// Load from disk, falling back to the full camera frame
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(store) => {
                    debug!("Loaded calibration from: {}", path.display());
                    store
                }
                Err(e) => {
                    warn!("Failed to parse calibration file: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No calibration file at: {}", path.display());
                Self::default()
            }
        }
    }

    /// Save to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved calibration to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn close(actual: (f32, f32), expected: (f32, f32)) -> bool {
        (actual.0 - expected.0).abs() < EPSILON && (actual.1 - expected.1).abs() < EPSILON
    }

    fn skewed() -> Calibration {
        Calibration::new([
            Point::new(900.0, 120.0),
            Point::new(150.0, 90.0),
            Point::new(870.0, 700.0),
            Point::new(180.0, 650.0),
        ])
    }

    #[test]
    fn corners_map_to_unit_square_corners() {
        for calibration in [Calibration::default(), skewed()] {
            let c = calibration.corners;
            assert!(close(calibration.remap(c[0]).unwrap(), (0.0, 0.0)));
            assert!(close(calibration.remap(c[1]).unwrap(), (1.0, 0.0)));
            assert!(close(calibration.remap(c[2]).unwrap(), (0.0, 1.0)));
            assert!(close(calibration.remap(c[3]).unwrap(), (1.0, 1.0)));
        }
    }

    #[test]
    fn default_calibration_is_mirrored_linear() {
        let calibration = Calibration::default();
        let (u, v) = calibration.remap(Point::new(1023.0 * 0.75, 767.0 * 0.5)).unwrap();
        assert!((u - 0.25).abs() < EPSILON);
        assert!((v - 0.5).abs() < EPSILON);
    }

    #[test]
    fn points_outside_are_rejected() {
        let calibration = skewed();
        assert!(calibration.within(Point::new(500.0, 400.0)));
        assert!(!calibration.within(Point::new(100.0, 400.0)));
        assert!(!calibration.within(Point::new(500.0, 50.0)));
        assert!(calibration.remap(Point::new(950.0, 400.0)).is_none());
    }

    #[test]
    fn degenerate_quad_maps_nothing() {
        let spot = Point::new(500.0, 400.0);
        let collapsed = Calibration::new([spot; 4]);
        assert!(collapsed.is_degenerate());
        assert!(!collapsed.within(spot));
        assert!(!collapsed.within(Point::new(10.0, 10.0)));
        assert_eq!(collapsed.remap(spot), None);

        let line = Calibration::new([
            Point::new(100.0, 100.0),
            Point::new(200.0, 200.0),
            Point::new(300.0, 300.0),
            Point::new(400.0, 400.0),
        ]);
        assert!(line.is_degenerate());
        assert_eq!(line.remap(Point::new(250.0, 250.0)), None);

        assert!(!Calibration::default().is_degenerate());
        assert!(!skewed().is_degenerate());
    }

    #[test]
    fn centre_of_skewed_quad_is_near_middle() {
        let (u, v) = skewed().remap(Point::new(525.0, 390.0)).unwrap();
        assert!((u - 0.5).abs() < 0.05, "u = {}", u);
        assert!((v - 0.5).abs() < 0.05, "v = {}", v);
    }

    #[test]
    fn store_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("wiigun-calibration-{}.json", std::process::id()));
        let mut store = CalibrationStore::default();
        store.players[1] = skewed();
        store.save(&path).unwrap();
        assert_eq!(CalibrationStore::load(&path), store);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unreadable_store_falls_back_to_default() {
        let path = std::env::temp_dir().join(format!("wiigun-bad-calibration-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(CalibrationStore::load(&path), CalibrationStore::default());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(CalibrationStore::load(&path), CalibrationStore::default());
    }
}
