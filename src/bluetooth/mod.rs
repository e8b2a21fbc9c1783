//! Minimal Bluetooth host stack
//!
//! This module implements just enough of Bluetooth to talk to a Wiimote over a
//! raw H4 packet interface:
//! - `ring_buffer`: SPSC queues between the radio callback and the poll loop
//! - `message` / `parser`: layered frame builders and a field cursor
//! - `transport`: the radio adapter
//! - `hci`: reset, inquiry and ACL connection management
//! - `l2cap`: connection-oriented channels over ACL links

pub mod constants;
pub mod hci;
pub mod l2cap;
pub mod message;
pub mod parser;
pub mod ring_buffer;
pub mod transport;

pub use hci::{AclConnection, AclId, HciController, HciState};
pub use l2cap::{ChannelId, ChannelListener, ChannelState, L2capMux, ListenerId};
pub use message::{Frame, Packet, SignalIds};
pub use parser::{MessageParser, ParseError};
pub use ring_buffer::{FrameConsumer, FrameProducer, RingBuffer};
pub use transport::{HciTransport, PacketRouter};

use crate::backend::RadioLink;

/// Transport, HCI and L2CAP layers ticked together
pub struct BluetoothStack<R: RadioLink> {
    pub transport: HciTransport<R>,
    pub hci: HciController,
    pub l2cap: L2capMux,
}

impl<R: RadioLink> BluetoothStack<R> {
    pub fn new(radio: R) -> Self {
        Self {
            transport: HciTransport::new(radio),
            hci: HciController::new(),
            l2cap: L2capMux::new(),
        }
    }

    /// Pump HCI events, then L2CAP traffic, delivering channel data to `listener`
    pub fn tick(&mut self, listener: &mut dyn ChannelListener) {
        self.hci.tick(&mut self.transport);
        self.l2cap.tick(&self.hci, &mut self.transport, listener);
    }
}
