//! Wiimote protocol constants
//!
//! This module contains the Wiimote-specific numbers:
//! - L2CAP PSMs and the local channel ids used for them
//! - Report ids in both directions
//! - Camera registers and the values written during bring-up

// ============================================================================
// Channels
// ============================================================================

/// HID control PSM
pub const CONTROL_PSM: u16 = 0x11;

/// HID interrupt (data) PSM
pub const DATA_PSM: u16 = 0x13;

/// Local channel ids, as used by a Wii console
pub const SRC_CONTROL_CID: u16 = 0x48;
pub const SRC_DATA_CID: u16 = 0x49;

/// Number of Wiimotes the manager can hold
pub const MAX_WIIMOTES: usize = 8;

// ============================================================================
// Reports
// ============================================================================

/// HID header for output reports (DATA | OUTPUT)
pub const WIIMOTE_OUTPUT_MAGIC: u8 = 0xA2;

/// HID header for input reports (DATA | INPUT)
pub const WIIMOTE_INPUT_MAGIC: u8 = 0xA1;

pub const REPORT_SET_LEDS: u8 = 0x11;
pub const REPORT_REQUEST_REPORT: u8 = 0x12;
pub const REPORT_IR_ENABLE_1: u8 = 0x13;
pub const REPORT_WRITE_MEMORY: u8 = 0x16;
pub const REPORT_IR_ENABLE_2: u8 = 0x1A;
pub const REPORT_STATUS_INFORMATION: u8 = 0x20;
pub const REPORT_READ_MEMORY: u8 = 0x21;
pub const REPORT_ACKNOWLEDGE: u8 = 0x22;
pub const REPORT_CORE_BUTTONS: u8 = 0x30;
pub const REPORT_CORE_BUTTONS_ACC_IR12: u8 = 0x33;

/// Button bits that actually carry accelerometer low bits
pub const ACCEL_BUTTON_BITS: u16 = 0x6060;

// ============================================================================
// Registers
// ============================================================================

/// Address space selector for control registers
pub const REGISTER_SPACE: u8 = 0x04;

/// Largest single register write
pub const MAX_WRITE_SIZE: usize = 16;

pub const IR_ENABLE: u8 = 0x04;

pub const REG_CAMERA_ENABLE: u32 = 0xB00030;
pub const CAMERA_ENABLE: u8 = 0x08;

pub const REG_SENSITIVITY_1: u32 = 0xB00000;
pub const SENSITIVITY_BLOCK_1: [u8; 9] = [0x02, 0x00, 0x00, 0x71, 0x01, 0x00, 0xAA, 0x00, 0x64];

pub const REG_SENSITIVITY_2: u32 = 0xB0001A;
pub const SENSITIVITY_BLOCK_2: [u8; 2] = [0x63, 0x03];

pub const REG_IR_MODE: u32 = 0xB00033;
pub const IR_MODE_EXTENDED: u8 = 0x03;
