//! Radio transport adapter
//!
//! Owns the two receive ring buffers and the outbound side of a [`RadioLink`].
//! The radio is handed a [`PacketRouter`] holding the producer halves; whatever
//! context the radio delivers packets from, it only ever pushes into the rings.

use crate::backend::RadioLink;
use crate::bluetooth::constants::{H4_TYPE_ACL, H4_TYPE_EVENT};
use crate::bluetooth::ring_buffer::{FrameConsumer, FrameProducer, RingBuffer};
use log::{trace, warn};
use std::thread;

/// Receive-side entry point handed to the radio
pub struct PacketRouter {
    events: FrameProducer,
    acl: FrameProducer,
}

impl PacketRouter {
    /// Route one H4-tagged packet into the matching ring. Never blocks.
    pub fn receive_packet(&mut self, packet: &[u8]) {
        trace!("Receiving: {:02x?}", packet);
        if packet.len() < 2 {
            return;
        }
        match packet[0] {
            H4_TYPE_EVENT => {
                self.events.put(&packet[1..]);
            }
            H4_TYPE_ACL => {
                self.acl.put(&packet[1..]);
            }
            other => trace!("Ignoring H4 packet type {}", other),
        }
    }
}

/// HCI transport over a radio link
pub struct HciTransport<R: RadioLink> {
    radio: R,
    events: FrameConsumer,
    acl: FrameConsumer,
}

impl<R: RadioLink> HciTransport<R> {
    /// Wrap a radio and attach the receive router to it
    pub fn new(mut radio: R) -> Self {
        let (event_tx, event_rx) = RingBuffer::new().split();
        let (acl_tx, acl_rx) = RingBuffer::new().split();
        radio.attach(PacketRouter {
            events: event_tx,
            acl: acl_tx,
        });
        Self {
            radio,
            events: event_rx,
            acl: acl_rx,
        }
    }

    /// Send a finished H4 packet, waiting for the radio to accept it
    pub fn send(&mut self, packet: &[u8]) {
        trace!("Sending: {:02x?}", packet);
        while !self.radio.ready_to_send() {
            thread::yield_now();
        }
        if let Err(e) = self.radio.send_packet(packet) {
            warn!("Radio send failed: {}", e);
        }
    }

    /// Next queued HCI event (without the H4 type byte)
    pub fn next_event(&mut self, buffer: &mut [u8]) -> Option<usize> {
        self.events.get(buffer)
    }

    /// Next queued ACL packet (without the H4 type byte)
    pub fn next_acl(&mut self, buffer: &mut [u8]) -> Option<usize> {
        self.acl.get(buffer)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}
