//! Cursor over a received packet
//!
//! Every read carries a label that is only used for trace output, which makes a
//! `RUST_LOG=trace` run a field-by-field dump of the traffic.

use crate::bluetooth::constants::ACL_HANDLE_MASK;
use log::{trace, warn};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Truncated packet reading {field}: needed {needed} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
}

/// ACL data packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclHeader {
    pub handle: u16,
    pub length: u16,
}

/// L2CAP basic frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2capHeader {
    pub length: u16,
    pub channel: u16,
}

/// L2CAP signaling command header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalHeader {
    pub code: u8,
    pub id: u8,
    pub length: u16,
}

pub struct MessageParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        trace!("** Packet start ({} bytes) **", data.len());
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::Truncated {
                field,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, ParseError> {
        let value = self.take(field, 1)?[0];
        trace!("B: {} = {:#x} ({})", field, value, value);
        Ok(value)
    }

    /// Little-endian 16-bit
    pub fn read_u16(&mut self, field: &'static str) -> Result<u16, ParseError> {
        let b = self.take(field, 2)?;
        let value = u16::from_le_bytes([b[0], b[1]]);
        trace!("W: {} = {:#x} ({})", field, value, value);
        Ok(value)
    }

    /// Little-endian 24-bit
    pub fn read_u24(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let b = self.take(field, 3)?;
        let value = u32::from_le_bytes([b[0], b[1], b[2], 0]);
        trace!("T: {} = {:#x} ({})", field, value, value);
        Ok(value)
    }

    /// Big-endian 24-bit
    pub fn read_u24_be(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let b = self.take(field, 3)?;
        let value = u32::from_be_bytes([0, b[0], b[1], b[2]]);
        trace!("T: {} = {:#x} ({})", field, value, value);
        Ok(value)
    }

    /// Little-endian 32-bit
    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let b = self.take(field, 4)?;
        let value = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        trace!("Q: {} = {:#x} ({})", field, value, value);
        Ok(value)
    }

    pub fn read_bytes(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], ParseError> {
        let bytes = self.take(field, n)?;
        trace!("D: {} (size {}) = {:02x?}", field, n, bytes);
        Ok(bytes)
    }

    /// Consume and trace whatever is left
    pub fn dump_remaining(&mut self, field: &'static str) {
        if self.remaining() > 0 {
            trace!(
                "N: {} (size {}) = {:02x?}",
                field,
                self.remaining(),
                &self.data[self.pos..]
            );
            self.pos = self.data.len();
        }
    }

    /// Read the ACL header; a length that disagrees with the packet is logged
    pub fn read_acl_header(&mut self) -> Result<AclHeader, ParseError> {
        let handle = self.read_u16("ACLHandle")? & ACL_HANDLE_MASK;
        let length = self.read_u16("ACLLength")?;
        if length as usize != self.remaining() {
            warn!(
                "ACL length mismatch: header says {}, packet has {}",
                length,
                self.remaining()
            );
        }
        Ok(AclHeader { handle, length })
    }

    pub fn read_l2cap_header(&mut self, acl: &AclHeader) -> Result<L2capHeader, ParseError> {
        let length = self.read_u16("L2CAPLength")?;
        let channel = self.read_u16("L2CAPChannelId")?;
        if length as usize + 4 != acl.length as usize {
            warn!(
                "L2CAP length mismatch: {} in a {} byte ACL payload",
                length, acl.length
            );
        }
        Ok(L2capHeader { length, channel })
    }

    pub fn read_signal_header(&mut self, l2cap: &L2capHeader) -> Result<SignalHeader, ParseError> {
        let code = self.read_u8("L2CAPCode")?;
        let id = self.read_u8("L2CAPMsgId")?;
        let length = self.read_u16("RequestLength")?;
        if length as usize + 4 != l2cap.length as usize {
            warn!(
                "L2CAP signal length mismatch: {} in a {} byte frame",
                length, l2cap.length
            );
        }
        Ok(SignalHeader { code, id, length })
    }
}

impl Drop for MessageParser<'_> {
    fn drop(&mut self) {
        if self.remaining() > 0 {
            warn!(
                "Message parser left with {} bytes: {:02x?}",
                self.remaining(),
                &self.data[self.pos..]
            );
        }
        trace!("** Packet end **");
    }
}
