//! Reticle state shared between the input task and the spot generator
//!
//! The input task writes, the generator reads once per field at vertical
//! sync. Each player's position is packed into a single atomic word so a
//! reader never sees `x` from one update and `start_line` from another, and
//! the mode flags share one word for the same reason. There is no lock: the
//! generator must never wait on the input task.

use crate::video::overlay::Overlay;
use std::sync::atomic::{AtomicU32, Ordering};

const FLAG_TWO_PLAYER: u32 = 1 << 0;
const FLAG_COOP: u32 = 1 << 1;
const FLAG_SHOW_POINTER: u32 = 1 << 2;
const FLAG_SPLASH: u32 = 1 << 3;
const FLAG_CALIBRATING: u32 = 1 << 4;

/// Start line that keeps a reticle off screen
pub const HIDDEN_LINE: u16 = 0xFFFF;

/// Reticle placement: ticks after the sync edge, and its top scan line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPosition {
    pub x: u16,
    pub start_line: u16,
}

impl ScreenPosition {
    pub const HIDDEN: ScreenPosition = ScreenPosition {
        x: 0,
        start_line: HIDDEN_LINE,
    };

    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE
    }

    fn pack(self) -> u32 {
        ((self.x as u32) << 16) | self.start_line as u32
    }

    fn unpack(word: u32) -> Self {
        Self {
            x: (word >> 16) as u16,
            start_line: word as u16,
        }
    }
}

/// Everything the generator needs for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReticleSnapshot {
    pub positions: [ScreenPosition; 2],
    pub two_player: bool,
    pub coop: bool,
    pub show_pointer: bool,
    pub overlay: Overlay,
}

impl Default for ReticleSnapshot {
    fn default() -> Self {
        Self {
            positions: [ScreenPosition::HIDDEN; 2],
            two_player: false,
            coop: false,
            show_pointer: false,
            overlay: Overlay::None,
        }
    }
}

/// Lock-free reticle cell
#[derive(Debug)]
pub struct ReticleShared {
    positions: [AtomicU32; 2],
    flags: AtomicU32,
}

impl ReticleShared {
    pub fn new() -> Self {
        Self {
            positions: [
                AtomicU32::new(ScreenPosition::HIDDEN.pack()),
                AtomicU32::new(ScreenPosition::HIDDEN.pack()),
            ],
            flags: AtomicU32::new(FLAG_SHOW_POINTER),
        }
    }

    pub fn set_position(&self, player: usize, position: ScreenPosition) {
        if let Some(slot) = self.positions.get(player) {
            slot.store(position.pack(), Ordering::Release);
        }
    }

    pub fn position(&self, player: usize) -> ScreenPosition {
        self.positions
            .get(player)
            .map_or(ScreenPosition::HIDDEN, |slot| ScreenPosition::unpack(slot.load(Ordering::Acquire)))
    }

    pub fn set_two_player(&self, on: bool) {
        self.set_flag(FLAG_TWO_PLAYER, on);
    }

    pub fn set_coop(&self, on: bool) {
        self.set_flag(FLAG_COOP, on);
    }

    pub fn two_player(&self) -> bool {
        self.flag(FLAG_TWO_PLAYER)
    }

    pub fn coop(&self) -> bool {
        self.flag(FLAG_COOP)
    }

    pub fn set_show_pointer(&self, on: bool) {
        self.set_flag(FLAG_SHOW_POINTER, on);
    }

    /// Flip pointer visibility, returning the new state
    pub fn toggle_show_pointer(&self) -> bool {
        let previous = self.flags.fetch_xor(FLAG_SHOW_POINTER, Ordering::AcqRel);
        previous & FLAG_SHOW_POINTER == 0
    }

    pub fn set_splash(&self, on: bool) {
        self.set_flag(FLAG_SPLASH, on);
    }

    pub fn set_calibrating(&self, on: bool) {
        self.set_flag(FLAG_CALIBRATING, on);
    }

    /// Read the whole state for the coming field
    pub fn snapshot(&self) -> ReticleSnapshot {
        let flags = self.flags.load(Ordering::Acquire);
        let overlay = if flags & FLAG_SPLASH != 0 {
            Overlay::Splash
        } else if flags & FLAG_CALIBRATING != 0 {
            Overlay::Calibrating
        } else {
            Overlay::None
        };
        ReticleSnapshot {
            positions: [self.position(0), self.position(1)],
            two_player: flags & FLAG_TWO_PLAYER != 0,
            coop: flags & FLAG_COOP != 0,
            show_pointer: flags & FLAG_SHOW_POINTER != 0,
            overlay,
        }
    }

    fn set_flag(&self, flag: u32, on: bool) {
        if on {
            self.flags.fetch_or(flag, Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!flag, Ordering::AcqRel);
        }
    }

    fn flag(&self, flag: u32) -> bool {
        self.flags.load(Ordering::Acquire) & flag != 0
    }
}

impl Default for ReticleShared {
    fn default() -> Self {
        Self::new()
    }
}
