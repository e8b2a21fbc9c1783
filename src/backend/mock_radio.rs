//! Mock radio for testing.
//!
//! Records every packet the stack sends and lets a test inject packets as if
//! the controller had delivered them. Clones share the same state, so a test
//! keeps one clone while the stack owns the other.

use crate::backend::{BackendError, RadioLink};
use crate::bluetooth::PacketRouter;
use log::{trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    sent: Vec<Vec<u8>>,
    router: Option<PacketRouter>,
}

/// Mock radio that records traffic instead of talking to a controller.
#[derive(Clone, Default)]
pub struct MockRadio {
    inner: Arc<Mutex<Inner>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a packet (H4 type byte first) to the attached stack
    pub fn inject(&self, packet: &[u8]) {
        match self.lock().router.as_mut() {
            Some(router) => router.receive_packet(packet),
            None => warn!("[MOCK RADIO] Nothing attached, dropping {:02x?}", packet),
        }
    }

    /// Packets sent since the last call
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.lock().sent)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RadioLink for MockRadio {
    fn attach(&mut self, router: PacketRouter) {
        self.lock().router = Some(router);
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), BackendError> {
        trace!("[MOCK RADIO] Sent {:02x?}", packet);
        self.lock().sent.push(packet.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_without_router_is_dropped() {
        let radio = MockRadio::new();
        radio.inject(&[4, 0x0E, 0]);
        assert!(radio.take_sent().is_empty());
    }

    #[test]
    fn clones_share_sent_packets() {
        let mut radio = MockRadio::new();
        let handle = radio.clone();
        radio.send_packet(&[1, 2, 3]).unwrap();
        assert_eq!(handle.take_sent(), vec![vec![1, 2, 3]]);
        assert!(handle.take_sent().is_empty());
    }
}
