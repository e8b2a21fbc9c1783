//! Wiimote report data
//!
//! [`WiimoteData`] is the most recent decoded state of one Wiimote. Consumers
//! poll it and watch `frame_number` to notice a new IR sample.

use serde::{Deserialize, Serialize};

/// Physical buttons and their bit in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Left,
    Right,
    Down,
    Up,
    Plus,
    Two,
    One,
    B,
    A,
    Minus,
    Home,
}

impl Button {
    pub fn mask(self) -> u16 {
        match self {
            Button::Left => 1 << 0,
            Button::Right => 1 << 1,
            Button::Down => 1 << 2,
            Button::Up => 1 << 3,
            Button::Plus => 1 << 4,
            Button::Two => 1 << 8,
            Button::One => 1 << 9,
            Button::B => 1 << 10,
            Button::A => 1 << 11,
            Button::Minus => 1 << 12,
            Button::Home => 1 << 15,
        }
    }
}

/// Button bitmask as reported, with the accelerometer bits removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buttons(pub u16);

impl Buttons {
    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    /// True if any of the buttons is held
    pub fn any(self, buttons: &[Button]) -> bool {
        buttons.iter().any(|b| self.is_pressed(*b))
    }
}

/// Raw 10-bit accelerometer counts (0..=1023, about 512 at rest on an axis).
///
/// The fields are unsigned as reported; use [`Accel::centered`] for the
/// signed value around zero g.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accel {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl Accel {
    /// Signed values around the zero-g midpoint
    pub fn centered(&self) -> (i16, i16, i16) {
        (
            self.x as i16 - 512,
            self.y as i16 - 512,
            self.z as i16 - 512,
        )
    }
}

/// One tracked IR blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrSpot {
    /// 0..=1023
    pub x: u16,
    /// 0..=767 (1023 when no blob)
    pub y: u16,
    /// 4-bit size repeated in both nibbles
    pub size: u8,
}

impl IrSpot {
    /// Value the camera reports for an empty slot
    pub const NONE: IrSpot = IrSpot {
        x: 0x3FF,
        y: 0x3FF,
        size: 0xFF,
    };

    pub fn is_visible(&self) -> bool {
        self.x != 0x3FF || self.y != 0x3FF
    }
}

impl Default for IrSpot {
    fn default() -> Self {
        Self { x: 0, y: 0, size: 0 }
    }
}

/// Latest decoded state of a Wiimote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiimoteData {
    pub buttons: Buttons,
    pub battery_level: u8,
    /// Player LED pattern (low 4 bits)
    pub leds: u8,
    pub accel: Accel,
    /// Incremented once per buttons+accel+IR report
    pub frame_number: u32,
    pub ir_spots: [IrSpot; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_masks_match_report_layout() {
        let buttons = Buttons(0x8C00);
        assert!(buttons.is_pressed(Button::Home));
        assert!(buttons.is_pressed(Button::A));
        assert!(buttons.is_pressed(Button::B));
        assert!(!buttons.is_pressed(Button::Minus));
        assert!(buttons.any(&[Button::One, Button::A]));
        assert!(!buttons.any(&[Button::One, Button::Two]));
    }

    #[test]
    fn empty_spot_is_hidden() {
        assert!(!IrSpot::NONE.is_visible());
        assert!(IrSpot { x: 0x3FF, y: 0x100, size: 0 }.is_visible());
    }

    #[test]
    fn accel_centering() {
        let accel = Accel { x: 512, y: 0, z: 1023 };
        assert_eq!(accel.centered(), (0, -512, 511));
    }
}
