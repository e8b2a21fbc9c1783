//! Bluetooth protocol constants
//!
//! This module contains the numbers the host stack needs on the wire:
//! - H4 transport packet types
//! - HCI command opcodes and event codes
//! - L2CAP signaling codes and channel ids
//! - Buffer and pool sizes

// ============================================================================
// Sizes
// ============================================================================

/// Largest frame the builders will assemble (matches the negotiated MTU)
pub const MAX_MESSAGE_LENGTH: usize = 185;

/// Ring buffer capacity in bytes (must be a power of two)
pub const RING_BUFFER_SIZE: usize = 1024;

/// Scratch size used when draining a ring buffer
pub const RECEIVE_BUFFER_SIZE: usize = 128;

/// Number of ACL connection slots
pub const MAX_ACL_CONNECTIONS: usize = 16;

/// Number of L2CAP channel slots across all links
pub const MAX_L2CAP_CHANNELS: usize = 32;

// ============================================================================
// H4 Transport
// ============================================================================

pub const H4_TYPE_COMMAND: u8 = 1;
pub const H4_TYPE_ACL: u8 = 2;
pub const H4_TYPE_SCO: u8 = 3;
pub const H4_TYPE_EVENT: u8 = 4;

// ============================================================================
// HCI Commands
// ============================================================================

const OGF_LINK_CONTROL: u16 = 1 << 10;
const OGF_BASEBAND_CONTROL: u16 = 3 << 10;

pub const HCI_INQUIRY: u16 = OGF_LINK_CONTROL | 0x01;
pub const HCI_CREATE_CONNECTION: u16 = OGF_LINK_CONTROL | 0x05;
pub const HCI_DISCONNECT: u16 = OGF_LINK_CONTROL | 0x06;
pub const HCI_RESET: u16 = OGF_BASEBAND_CONTROL | 0x03;
pub const HCI_SET_EVENT_FILTER: u16 = OGF_BASEBAND_CONTROL | 0x05;

/// General Inquiry Access Code LAP
pub const GIAC_LAP: u32 = 0x9E8B33;

/// Inquiry length in units of 1.28s
pub const INQUIRY_LENGTH: u8 = 8;

/// Stop the inquiry after this many responses
pub const INQUIRY_MAX_RESPONSES: u8 = 1;

/// Class of device reported by a Wiimote
pub const WIIMOTE_DEVICE_CLASS: u32 = 0x000500;

/// Class bits that differ between Wiimote hardware revisions
pub const WIIMOTE_DEVICE_CLASS_MASK: u32 = !0x00200C & 0xFFFFFF;

/// Packet types allowed on the link (all DM and DH)
pub const CONNECTION_PACKET_TYPES: u16 = 0xCC18;

/// Disconnect reason: remote user terminated connection
pub const DISCONNECT_REASON_USER: u8 = 0x13;

// ============================================================================
// HCI Events
// ============================================================================

pub const HCI_EVENT_INQUIRY_COMPLETE: u8 = 0x01;
pub const HCI_EVENT_INQUIRY_RESULT: u8 = 0x02;
pub const HCI_EVENT_CONNECTION_COMPLETE: u8 = 0x03;
pub const HCI_EVENT_DISCONNECTION_COMPLETE: u8 = 0x05;
pub const HCI_EVENT_QOS_SETUP_COMPLETE: u8 = 0x0D;
pub const HCI_EVENT_COMMAND_COMPLETE: u8 = 0x0E;
pub const HCI_EVENT_COMMAND_STATUS: u8 = 0x0F;
pub const HCI_EVENT_NUM_COMPLETED_PACKETS: u8 = 0x13;
pub const HCI_EVENT_DATA_BUFFER_OVERFLOW: u8 = 0x1A;

// ============================================================================
// ACL
// ============================================================================

/// Packet boundary flag: first automatically flushable packet
pub const ACL_PB_FLUSHABLE: u16 = 2 << 12;

/// Mask selecting the connection handle out of the ACL header word
pub const ACL_HANDLE_MASK: u16 = 0x0FFF;

// ============================================================================
// L2CAP
// ============================================================================

pub const L2CAP_SIGNALING_CHANNEL: u16 = 0x0001;

pub const L2CAP_COMMAND_REJECT: u8 = 0x01;
pub const L2CAP_CONNECTION_REQUEST: u8 = 0x02;
pub const L2CAP_CONNECTION_RESPONSE: u8 = 0x03;
pub const L2CAP_CONFIGURATION_REQUEST: u8 = 0x04;
pub const L2CAP_CONFIGURATION_RESPONSE: u8 = 0x05;
pub const L2CAP_DISCONNECTION_REQUEST: u8 = 0x06;
pub const L2CAP_DISCONNECTION_RESPONSE: u8 = 0x07;
pub const L2CAP_INFORMATION_REQUEST: u8 = 0x0A;
pub const L2CAP_INFORMATION_RESPONSE: u8 = 0x0B;

pub const L2CAP_RESULT_SUCCESS: u16 = 0x0000;
pub const L2CAP_RESULT_PENDING: u16 = 0x0001;

/// Configuration option type for MTU
pub const L2CAP_OPTION_MTU: u8 = 0x01;

/// Information response result: not supported
pub const L2CAP_INFO_NOT_SUPPORTED: u16 = 0x0001;
