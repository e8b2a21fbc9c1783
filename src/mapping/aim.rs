//! Aim processing - turns Wiimote reports into reticle positions and trigger levels
//!
//! Runs on the input thread. For each player it:
//! - Reacts once per new IR frame (`frame_number` changes)
//! - Handles the mode buttons (Home, Plus/Minus, Two for calibration)
//! - Remaps the first IR spot through the player's calibration
//! - Publishes the reticle to the shared cell read by the spot generator
//!
//! Trigger output changes are produced as [`GunEvent`]s for the executor.

use crate::mapping::calibration::{Calibration, CalibrationStore, Point};
use crate::mapping::config::{Settings, VideoConfig};
use crate::video::{ReticleShared, ScreenPosition};
use crate::wiimote::{Button, WiimoteData};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

pub const PLAYERS: usize = 2;

/// Events sent from the input thread to the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GunEvent {
    Trigger { gun: usize, pulled: bool },
    ReleaseAll,
}

/// Corners recorded so far during a calibration
#[derive(Debug, Clone, Copy)]
struct Capture {
    corners: [Point; 4],
    next: usize,
}

impl Capture {
    fn new() -> Self {
        Self {
            corners: [Point::new(0.0, 0.0); 4],
            next: 0,
        }
    }

    /// LED pattern naming the corner to aim at next
    fn leds(&self) -> u8 {
        1 << self.next
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    frame_number: u32,
    home_held: bool,
    b_held: bool,
    pulled: bool,
    capture: Option<Capture>,
}

pub struct AimProcessor {
    video: VideoConfig,
    shared: Arc<ReticleShared>,
    store: CalibrationStore,
    calibration_path: PathBuf,
    players: [PlayerState; PLAYERS],
    /// Levels last sent to the executor
    outputs: [bool; PLAYERS],
}

impl AimProcessor {
    pub fn new(
        settings: &Settings,
        video: &VideoConfig,
        shared: Arc<ReticleShared>,
        store: CalibrationStore,
    ) -> Self {
        shared.set_coop(settings.coop);
        shared.set_show_pointer(settings.show_pointer);
        Self {
            video: video.clone(),
            shared,
            store,
            calibration_path: PathBuf::from(&settings.calibration_file),
            players: Default::default(),
            outputs: [false; PLAYERS],
        }
    }

    pub fn calibration(&self, player: usize) -> Option<&Calibration> {
        self.store.players.get(player)
    }

    pub fn is_calibrating(&self, player: usize) -> bool {
        self.players
            .get(player)
            .is_some_and(|state| state.capture.is_some())
    }

    /// Feed the latest data of one player's Wiimote.
    ///
    /// Returns an LED pattern to show on that Wiimote, if it should change.
    pub fn update(&mut self, player: usize, data: &WiimoteData) -> Option<u8> {
        let Some(state) = self.players.get_mut(player) else {
            warn!("No aim state for player {}", player);
            return None;
        };
        if data.frame_number == state.frame_number {
            return None;
        }
        state.frame_number = data.frame_number;

        let buttons = data.buttons;
        let spot = data.ir_spots[0];

        let home = buttons.is_pressed(Button::Home);
        if home && !state.home_held {
            let shown = self.shared.toggle_show_pointer();
            info!("Pointer {}", if shown { "shown" } else { "hidden" });
        }
        state.home_held = home;

        if buttons.is_pressed(Button::Plus) && !self.shared.coop() {
            info!("Co-op mode on");
            self.shared.set_coop(true);
        }
        if buttons.is_pressed(Button::Minus) && self.shared.coop() {
            info!("Co-op mode off");
            self.shared.set_coop(false);
        }
        if player == 1 && !self.shared.two_player() {
            info!("Second player joined");
            self.shared.set_two_player(true);
        }

        // Calibration: Two starts it, each B press on a visible spot records a corner
        let was_calibrating = state.capture.is_some();
        let mut leds = None;
        let mut finished = None;
        if buttons.is_pressed(Button::Two) && state.capture.is_none() {
            info!("Player {} calibrating, aim at each corner and press B", player + 1);
            let capture = Capture::new();
            leds = Some(capture.leds());
            state.capture = Some(capture);
        }
        let b = buttons.is_pressed(Button::B);
        if let Some(capture) = state.capture.as_mut() {
            if b && !state.b_held && spot.is_visible() {
                capture.corners[capture.next] = Point::new(spot.x as f32, spot.y as f32);
                debug!("Corner {} at ({}, {})", capture.next, spot.x, spot.y);
                capture.next += 1;
                if capture.next == capture.corners.len() {
                    finished = Some(Calibration::new(capture.corners));
                    state.capture = None;
                    leds = Some(1 << player);
                } else {
                    leds = Some(capture.leds());
                }
            }
        }
        state.b_held = b;

        state.pulled = !was_calibrating && buttons.any(&[Button::A, Button::B]);

        if let Some(calibration) = finished {
            if calibration.is_degenerate() {
                warn!(
                    "Player {} calibration corners enclose no area, keeping the previous calibration",
                    player + 1
                );
            } else {
                self.store.players[player] = calibration;
                info!("Player {} calibration complete", player + 1);
                if let Err(e) = self.store.save(&self.calibration_path) {
                    warn!("Failed to save calibration: {}", e);
                }
            }
        }
        self.shared
            .set_calibrating(self.players.iter().any(|p| p.capture.is_some()));

        let position = if spot.is_visible() {
            self.store.players[player]
                .remap(Point::new(spot.x as f32, spot.y as f32))
                .map(|(u, v)| screen_position(u, v, &self.video))
        } else {
            None
        };
        self.shared
            .set_position(player, position.unwrap_or(ScreenPosition::HIDDEN));

        leds
    }

    /// Forget a player whose Wiimote went away
    pub fn disconnect(&mut self, player: usize) {
        if let Some(state) = self.players.get_mut(player) {
            *state = PlayerState::default();
            self.shared.set_position(player, ScreenPosition::HIDDEN);
            self.shared
                .set_calibrating(self.players.iter().any(|p| p.capture.is_some()));
        }
    }

    /// Trigger output changes since the last call
    pub fn trigger_events(&mut self) -> Vec<GunEvent> {
        let pulled = [self.players[0].pulled, self.players[1].pulled];
        let levels = if self.shared.coop() {
            [pulled[0] || pulled[1], false]
        } else {
            pulled
        };

        let mut events = Vec::new();
        for (gun, level) in levels.into_iter().enumerate() {
            if self.outputs[gun] != level {
                self.outputs[gun] = level;
                events.push(GunEvent::Trigger { gun, pulled: level });
            }
        }
        events
    }
}

/// Unit-square aim point to the line timing of the reticle
fn screen_position(u: f32, v: f32, video: &VideoConfig) -> ScreenPosition {
    ScreenPosition {
        x: video.back_porch + (video.line_duration as f32 * u) as u16,
        start_line: video.blanked_lines + (video.visible_lines as f32 * v) as u16,
    }
}
