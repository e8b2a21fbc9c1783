//! Outgoing message builders
//!
//! Every outgoing packet is assembled in one fixed-capacity [`Packet`]. Each
//! protocol layer opens a reserved length field when it starts and the fields
//! are patched innermost-first by [`Packet::finish`], so an L2CAP signaling
//! request nests inside an L2CAP frame, inside an ACL packet, inside an H4
//! frame without any layer knowing about the others.

use crate::bluetooth::constants::*;
use std::ops::Deref;

/// Width of a reserved length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U8,
    U16,
}

#[derive(Debug, Clone, Copy)]
struct LengthField {
    /// Offset of the placeholder bytes
    at: usize,
    width: LengthWidth,
    /// Offset where the counted payload begins
    start: usize,
}

/// A packet under construction
#[derive(Debug, Clone)]
pub struct Packet {
    buf: [u8; MAX_MESSAGE_LENGTH],
    len: usize,
    layers: Vec<LengthField>,
}

impl Packet {
    /// Start a packet tagged with an H4 transport type
    pub fn new(h4_type: u8) -> Self {
        let mut packet = Self {
            buf: [0; MAX_MESSAGE_LENGTH],
            len: 0,
            layers: Vec::with_capacity(4),
        };
        packet.add_u8(h4_type);
        packet
    }

    fn reserve(&mut self, n: usize) -> &mut [u8] {
        assert!(
            self.len + n <= MAX_MESSAGE_LENGTH,
            "message exceeds {} bytes",
            MAX_MESSAGE_LENGTH
        );
        let start = self.len;
        self.len += n;
        &mut self.buf[start..self.len]
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.reserve(1)[0] = value;
        self
    }

    /// Little-endian 16-bit
    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.reserve(2).copy_from_slice(&value.to_le_bytes());
        self
    }

    /// Little-endian 24-bit
    pub fn add_u24(&mut self, value: u32) -> &mut Self {
        let bytes = value.to_le_bytes();
        self.reserve(3).copy_from_slice(&bytes[..3]);
        self
    }

    /// Big-endian 24-bit
    pub fn add_u24_be(&mut self, value: u32) -> &mut Self {
        let bytes = value.to_be_bytes();
        self.reserve(3).copy_from_slice(&bytes[1..]);
        self
    }

    pub fn append(&mut self, data: &[u8]) -> &mut Self {
        self.reserve(data.len()).copy_from_slice(data);
        self
    }

    /// Reserve a length field that will count every byte written after `header`.
    pub fn open_length(&mut self, width: LengthWidth, header: &[u8]) -> &mut Self {
        let at = self.len;
        match width {
            LengthWidth::U8 => self.add_u8(0),
            LengthWidth::U16 => self.add_u16(0),
        };
        self.append(header);
        self.layers.push(LengthField {
            at,
            width,
            start: self.len,
        });
        self
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Patch every open length field, innermost first, and return the finished frame
    pub fn finish(mut self) -> Frame {
        while let Some(field) = self.layers.pop() {
            let value = self.len - field.start;
            match field.width {
                LengthWidth::U8 => {
                    assert!(value <= u8::MAX as usize);
                    self.buf[field.at] = value as u8;
                }
                LengthWidth::U16 => {
                    self.buf[field.at..field.at + 2].copy_from_slice(&(value as u16).to_le_bytes());
                }
            }
        }
        Frame {
            buf: self.buf,
            len: self.len,
        }
    }
}

/// A finished packet ready for the transport
#[derive(Clone)]
pub struct Frame {
    buf: [u8; MAX_MESSAGE_LENGTH],
    len: usize,
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({:02x?})", &**self)
    }
}

// ============================================================================
// Layer constructors
// ============================================================================

/// HCI command: `[01][opcode:2][len:1]...`
pub fn hci_command(opcode: u16) -> Packet {
    let mut packet = Packet::new(H4_TYPE_COMMAND);
    packet.add_u16(opcode).open_length(LengthWidth::U8, &[]);
    packet
}

/// ACL data packet: `[02][handle|flags:2][len:2]...`
pub fn acl_data(handle: u16) -> Packet {
    let mut packet = Packet::new(H4_TYPE_ACL);
    packet
        .add_u16((handle & ACL_HANDLE_MASK) | ACL_PB_FLUSHABLE)
        .open_length(LengthWidth::U16, &[]);
    packet
}

/// L2CAP basic frame on channel `cid`: `[len:2][cid:2]...`
pub fn l2cap_frame(handle: u16, cid: u16) -> Packet {
    let mut packet = acl_data(handle);
    packet.open_length(LengthWidth::U16, &cid.to_le_bytes());
    packet
}

/// L2CAP signaling command: `[code][id][len:2]...` on the signaling channel
pub fn l2cap_signal(handle: u16, code: u8, id: u8) -> Packet {
    let mut packet = l2cap_frame(handle, L2CAP_SIGNALING_CHANNEL);
    packet.add_u8(code).add_u8(id).open_length(LengthWidth::U16, &[]);
    packet
}

/// Wiimote output report on the remote data channel `dcid`
pub fn wiimote_report(handle: u16, dcid: u16, report: u8) -> Packet {
    let mut packet = l2cap_frame(handle, dcid);
    packet
        .add_u8(crate::wiimote::constants::WIIMOTE_OUTPUT_MAGIC)
        .add_u8(report);
    packet
}

/// Identifier source for L2CAP signaling requests.
///
/// Shared across all channels. Responses echo the peer's identifier and the
/// allocator steps over it when it collides with the next local id.
#[derive(Debug, Clone)]
pub struct SignalIds {
    next: u8,
}

impl SignalIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Identifier for a new request
    pub fn next_request(&mut self) -> u8 {
        let id = self.next;
        self.advance();
        id
    }

    /// Identifier for a response to a peer request carrying `peer_id`
    pub fn response(&mut self, peer_id: u8) -> u8 {
        if peer_id == self.next {
            self.advance();
        }
        peer_id
    }

    fn advance(&mut self) {
        // 0 is not a valid signaling identifier
        self.next = self.next.wrapping_add(1).max(1);
    }
}

impl Default for SignalIds {
    fn default() -> Self {
        Self::new()
    }
}
