//! Wiimote manager
//!
//! Owns the Bluetooth stack and up to [`MAX_WIIMOTES`] sessions. Consumers hold
//! a [`WiimoteId`] and poll [`WiimoteManager::data`] for the latest report.

use crate::backend::RadioLink;
use crate::bluetooth::{BluetoothStack, ChannelId, ChannelListener, ListenerId, MessageParser};
use crate::wiimote::constants::MAX_WIIMOTES;
use crate::wiimote::session::{SessionState, WiimoteSession};
use crate::wiimote::types::WiimoteData;
use log::{error, info};

/// Handle to a Wiimote held by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WiimoteId(usize);

impl WiimoteId {
    /// Zero-based slot, which is also the player index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Session slots, addressed by the listener id handed to the data channel
#[derive(Default)]
struct SessionTable {
    slots: [Option<WiimoteSession>; MAX_WIIMOTES],
}

impl ChannelListener for SessionTable {
    fn receive_data(&mut self, listener: ListenerId, _channel: ChannelId, parser: &mut MessageParser<'_>) {
        match self.slots.get_mut(listener.0).and_then(Option::as_mut) {
            Some(session) => {
                if let Err(e) = session.receive_report(parser) {
                    error!("Malformed Wiimote report: {}", e);
                }
            }
            None => error!("Data for unknown Wiimote slot {}", listener.0),
        }
    }
}

/// Bluetooth stack plus the Wiimote sessions running on it
pub struct WiimoteManager<R: RadioLink> {
    stack: BluetoothStack<R>,
    sessions: SessionTable,
    announced: [bool; MAX_WIIMOTES],
}

impl<R: RadioLink> WiimoteManager<R> {
    pub fn new(radio: R) -> Self {
        Self {
            stack: BluetoothStack::new(radio),
            sessions: SessionTable::default(),
            announced: [false; MAX_WIIMOTES],
        }
    }

    /// Start looking for another Wiimote. Slot `n` opens with player LED `1 << n`.
    pub fn create_wiimote(&mut self) -> Option<WiimoteId> {
        let index = self.sessions.slots.iter().position(Option::is_none)?;
        let mut session = WiimoteSession::new(ListenerId(index));
        if !session.open(1 << index, &mut self.stack) {
            return None;
        }
        self.sessions.slots[index] = Some(session);
        info!("Waiting for Wiimote {}", index + 1);
        Some(WiimoteId(index))
    }

    /// Pump the stack and advance every session
    pub fn tick(&mut self) {
        self.stack.tick(&mut self.sessions);
        for (index, slot) in self.sessions.slots.iter_mut().enumerate() {
            if let Some(session) = slot {
                session.tick(&mut self.stack);
                let connected = session.is_connected(&self.stack);
                if connected && !self.announced[index] {
                    info!("Wiimote {} connected", index + 1);
                }
                self.announced[index] = connected;
            }
        }
    }

    /// Latest report from a Wiimote
    pub fn data(&self, id: WiimoteId) -> Option<&WiimoteData> {
        self.session(id).map(WiimoteSession::data)
    }

    pub fn state(&self, id: WiimoteId) -> Option<SessionState> {
        self.session(id).map(WiimoteSession::state)
    }

    pub fn is_connected(&self, id: WiimoteId) -> bool {
        self.session(id)
            .map_or(false, |session| session.is_connected(&self.stack))
    }

    /// True if any session has finished bring-up
    pub fn any_connected(&self) -> bool {
        self.sessions
            .slots
            .iter()
            .flatten()
            .any(|session| session.is_connected(&self.stack))
    }

    pub fn set_player_leds(&mut self, id: WiimoteId, leds: u8) {
        if let Some(Some(session)) = self.sessions.slots.get_mut(id.0) {
            session.set_player_leds(leds, &mut self.stack);
        }
    }

    /// Tear a Wiimote down and free its slot
    pub fn close(&mut self, id: WiimoteId) {
        if let Some(mut session) = self.sessions.slots.get_mut(id.0).and_then(Option::take) {
            session.close(&mut self.stack);
            self.announced[id.0] = false;
        }
    }

    pub fn stack(&self) -> &BluetoothStack<R> {
        &self.stack
    }

    pub fn radio(&self) -> &R {
        self.stack.transport.radio()
    }

    fn session(&self, id: WiimoteId) -> Option<&WiimoteSession> {
        self.sessions.slots.get(id.0).and_then(Option::as_ref)
    }
}
