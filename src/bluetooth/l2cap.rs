//! L2CAP channel multiplexer
//!
//! Channels are driven purely by received signaling commands:
//!
//! ```text
//! Closed -> WaitConnect -> Config -> Open -> WaitDisconnect -> Closed
//! ```
//!
//! A command that arrives in a state where it is not expected is logged and
//! dropped without touching the channel. Payloads on data channels go to the
//! listener registered for that channel.

use crate::backend::RadioLink;
use crate::bluetooth::constants::*;
use crate::bluetooth::hci::{AclId, HciController};
use crate::bluetooth::message::{l2cap_signal, SignalIds};
use crate::bluetooth::parser::{MessageParser, ParseError};
use crate::bluetooth::transport::HciTransport;
use log::{debug, error, info, warn};

/// Channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    WaitConnect,
    Config,
    Open,
    WaitDisconnect,
}

/// Index of a slot in the channel pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

/// Opaque token identifying who should receive a channel's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub usize);

/// Receiver for payloads arriving on data channels
pub trait ChannelListener {
    /// Called with the parser positioned at the start of the channel payload.
    /// Anything left unread is dumped afterwards.
    fn receive_data(&mut self, listener: ListenerId, channel: ChannelId, parser: &mut MessageParser<'_>);
}

#[derive(Debug, Clone, Copy)]
struct L2capChannel {
    allocated: bool,
    state: ChannelState,
    scid: u16,
    dcid: u16,
    acl: Option<AclId>,
    listener: Option<ListenerId>,
    /// Owner has freed the channel; the slot is released once it closes
    releasing: bool,
}

impl Default for L2capChannel {
    fn default() -> Self {
        Self {
            allocated: false,
            state: ChannelState::Closed,
            scid: 0,
            dcid: 0,
            acl: None,
            listener: None,
            releasing: false,
        }
    }
}

/// Signaling events a channel reacts to
#[derive(Debug, Clone, Copy)]
enum SignalEvent {
    ConnectionResponse { dcid: u16, result: u16 },
    ConfigurationRequest { id: u8 },
    ConfigurationResponse { result: u16 },
    DisconnectionRequest { id: u8 },
    DisconnectionResponse,
}

impl SignalEvent {
    fn valid_states(&self) -> &'static [ChannelState] {
        use ChannelState::*;
        match self {
            SignalEvent::ConnectionResponse { .. } => &[WaitConnect],
            SignalEvent::ConfigurationRequest { .. } => &[Config, Open],
            SignalEvent::ConfigurationResponse { .. } => &[Config, Open],
            SignalEvent::DisconnectionRequest { .. } => &[WaitConnect, Config, Open, WaitDisconnect],
            SignalEvent::DisconnectionResponse => &[WaitDisconnect],
        }
    }
}

/// Fixed pool of L2CAP channels across all ACL links
pub struct L2capMux {
    channels: [L2capChannel; MAX_L2CAP_CHANNELS],
    ids: SignalIds,
}

impl L2capMux {
    pub fn new() -> Self {
        Self {
            channels: [L2capChannel::default(); MAX_L2CAP_CHANNELS],
            ids: SignalIds::new(),
        }
    }

    /// Open a channel to `psm` on a connected link, using `scid` as our endpoint
    pub fn allocate_channel<R: RadioLink>(
        &mut self,
        hci: &HciController,
        acl: AclId,
        psm: u16,
        scid: u16,
        transport: &mut HciTransport<R>,
    ) -> Option<ChannelId> {
        if !hci.is_connected(acl) {
            error!("Can't open L2CAP channel on ACL slot {} which is not connected", acl.index());
            return None;
        }
        let Some(index) = self.channels.iter().position(|c| !c.allocated) else {
            error!("L2CAP has no free channels left");
            return None;
        };

        self.channels[index] = L2capChannel {
            allocated: true,
            scid,
            acl: Some(acl),
            ..L2capChannel::default()
        };
        let id = ChannelId(index);
        let handle = hci.connection(acl).handle();

        let mut req = l2cap_signal(handle, L2CAP_CONNECTION_REQUEST, self.ids.next_request());
        req.add_u16(psm).add_u16(scid);
        transport.send(&req.finish());
        self.set_state(id, ChannelState::WaitConnect);
        Some(id)
    }

    /// Route a channel's data to `listener`
    pub fn set_listener(&mut self, channel: ChannelId, listener: Option<ListenerId>) {
        self.channels[channel.0].listener = listener;
    }

    /// Release a channel. An unclosed channel on a live link is disconnected
    /// first and its slot is reclaimed when the peer confirms.
    pub fn free_channel<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let link_up = self.channels[channel.0]
            .acl
            .map_or(false, |acl| hci.is_connected(acl));
        let slot = &mut self.channels[channel.0];
        slot.listener = None;

        match slot.state {
            ChannelState::Closed => *slot = L2capChannel::default(),
            _ if !link_up => *slot = L2capChannel::default(),
            ChannelState::WaitDisconnect => slot.releasing = true,
            _ => {
                slot.releasing = true;
                self.send_disconnect_request(channel, hci, transport);
            }
        }
    }

    pub fn state(&self, channel: ChannelId) -> ChannelState {
        self.channels[channel.0].state
    }

    /// Remote endpoint id, valid once the peer has answered the connect request
    pub fn dcid(&self, channel: ChannelId) -> u16 {
        self.channels[channel.0].dcid
    }

    /// True when the channel is open and its link is still connected
    pub fn is_connected(&self, channel: ChannelId, hci: &HciController) -> bool {
        let slot = &self.channels[channel.0];
        slot.allocated
            && slot.state == ChannelState::Open
            && slot.acl.map_or(false, |acl| hci.is_connected(acl))
    }

    /// Number of allocated slots
    pub fn allocated_count(&self) -> usize {
        self.channels.iter().filter(|c| c.allocated).count()
    }

    /// Drain received ACL packets
    pub fn tick<R: RadioLink>(
        &mut self,
        hci: &HciController,
        transport: &mut HciTransport<R>,
        listener: &mut dyn ChannelListener,
    ) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        while let Some(len) = transport.next_acl(&mut buffer) {
            let mut parser = MessageParser::new(&buffer[..len]);
            if let Err(e) = self.handle_packet(&mut parser, hci, transport, listener) {
                error!("Malformed L2CAP packet: {}", e);
                parser.dump_remaining("MalformedPacket");
            }
        }
    }

    fn set_state(&mut self, channel: ChannelId, state: ChannelState) {
        let slot = &mut self.channels[channel.0];
        debug!("Changing L2CAP channel {:#x} state {:?} -> {:?}", slot.scid, slot.state, state);
        slot.state = state;
        if state == ChannelState::Closed && slot.releasing {
            *slot = L2capChannel::default();
        }
    }

    fn find(&self, hci: &HciController, handle: u16, scid: u16) -> Option<ChannelId> {
        let found = self.channels.iter().position(|c| {
            c.allocated
                && c.scid == scid
                && c.acl.map_or(false, |acl| {
                    let link = hci.connection(acl);
                    link.is_connected() && link.handle() == handle
                })
        });
        if found.is_none() {
            error!("L2CAP can't find channel {:#x} on handle {:#x}", scid, handle);
        }
        found.map(ChannelId)
    }

    fn handle_of(&self, channel: ChannelId, hci: &HciController) -> u16 {
        self.channels[channel.0]
            .acl
            .map_or(0, |acl| hci.connection(acl).handle())
    }

    // ========================================================================
    // Outgoing signaling
    // ========================================================================

    fn send_configuration_request<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let handle = self.handle_of(channel, hci);
        let mut req = l2cap_signal(handle, L2CAP_CONFIGURATION_REQUEST, self.ids.next_request());
        req.add_u16(self.channels[channel.0].dcid)
            .add_u16(0) // flags
            .add_u8(L2CAP_OPTION_MTU)
            .add_u8(2)
            .add_u16(MAX_MESSAGE_LENGTH as u16);
        transport.send(&req.finish());
        self.set_state(channel, ChannelState::Config);
    }

    fn send_configuration_response<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        peer_id: u8,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let handle = self.handle_of(channel, hci);
        let mut rsp = l2cap_signal(handle, L2CAP_CONFIGURATION_RESPONSE, self.ids.response(peer_id));
        rsp.add_u16(self.channels[channel.0].dcid)
            .add_u16(0) // flags
            .add_u16(L2CAP_RESULT_SUCCESS);
        transport.send(&rsp.finish());
        self.set_state(channel, ChannelState::Open);
    }

    fn send_disconnect_request<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let handle = self.handle_of(channel, hci);
        let slot = self.channels[channel.0];
        let mut req = l2cap_signal(handle, L2CAP_DISCONNECTION_REQUEST, self.ids.next_request());
        req.add_u16(slot.dcid).add_u16(slot.scid);
        transport.send(&req.finish());
        self.set_state(channel, ChannelState::WaitDisconnect);
    }

    fn send_disconnect_response<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        peer_id: u8,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let handle = self.handle_of(channel, hci);
        let slot = self.channels[channel.0];
        let mut rsp = l2cap_signal(handle, L2CAP_DISCONNECTION_RESPONSE, self.ids.response(peer_id));
        // Our dcid then our scid. The core layout echoes the request's fields
        // unswapped (scid first from our side); the Wiimote accepts this order.
        rsp.add_u16(slot.dcid).add_u16(slot.scid);
        transport.send(&rsp.finish());
        self.set_state(channel, ChannelState::Closed);
    }

    fn send_information_response<R: RadioLink>(
        &mut self,
        handle: u16,
        peer_id: u8,
        info_type: u16,
        transport: &mut HciTransport<R>,
    ) {
        let mut rsp = l2cap_signal(handle, L2CAP_INFORMATION_RESPONSE, self.ids.response(peer_id));
        rsp.add_u16(info_type).add_u16(L2CAP_INFO_NOT_SUPPORTED);
        transport.send(&rsp.finish());
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    fn handle_packet<R: RadioLink>(
        &mut self,
        parser: &mut MessageParser<'_>,
        hci: &HciController,
        transport: &mut HciTransport<R>,
        listener: &mut dyn ChannelListener,
    ) -> Result<(), ParseError> {
        let acl = parser.read_acl_header()?;
        let l2cap = parser.read_l2cap_header(&acl)?;

        if l2cap.channel != L2CAP_SIGNALING_CHANNEL {
            let Some(channel) = self.find(hci, acl.handle, l2cap.channel) else {
                parser.dump_remaining("UnknownChannel");
                return Ok(());
            };
            match self.channels[channel.0].listener {
                Some(id) => {
                    listener.receive_data(id, channel, parser);
                    parser.dump_remaining("ListenerLeftOverData");
                }
                None => {
                    warn!("No listener on L2CAP channel {:#x}, discarding", l2cap.channel);
                    parser.dump_remaining("NoListenerRegistered");
                }
            }
            return Ok(());
        }

        let signal = parser.read_signal_header(&l2cap)?;
        match signal.code {
            L2CAP_COMMAND_REJECT => {
                let reason = parser.read_u16("Reason")?;
                warn!("L2CAP command {} rejected, reason {:#x}", signal.id, reason);
                parser.dump_remaining("RejectData");
            }

            L2CAP_CONNECTION_RESPONSE => {
                let dcid = parser.read_u16("DestCID")?;
                let scid = parser.read_u16("SourceCID")?;
                let result = parser.read_u16("Result")?;
                parser.read_u16("Status")?;
                if let Some(channel) = self.find(hci, acl.handle, scid) {
                    self.dispatch(channel, SignalEvent::ConnectionResponse { dcid, result }, hci, transport);
                }
            }

            L2CAP_CONFIGURATION_REQUEST => {
                let scid = parser.read_u16("DestCID")?;
                parser.read_u16("Flags")?;
                Self::read_options(parser, signal.length.saturating_sub(4))?;
                if let Some(channel) = self.find(hci, acl.handle, scid) {
                    self.dispatch(channel, SignalEvent::ConfigurationRequest { id: signal.id }, hci, transport);
                }
            }

            L2CAP_CONFIGURATION_RESPONSE => {
                let scid = parser.read_u16("SrcCID")?;
                parser.read_u16("Flags")?;
                let result = parser.read_u16("Result")?;
                Self::read_options(parser, signal.length.saturating_sub(6))?;
                if let Some(channel) = self.find(hci, acl.handle, scid) {
                    self.dispatch(channel, SignalEvent::ConfigurationResponse { result }, hci, transport);
                }
            }

            L2CAP_DISCONNECTION_REQUEST => {
                let scid = parser.read_u16("DestCID")?;
                parser.read_u16("SrcCID")?;
                if let Some(channel) = self.find(hci, acl.handle, scid) {
                    self.dispatch(channel, SignalEvent::DisconnectionRequest { id: signal.id }, hci, transport);
                }
            }

            L2CAP_DISCONNECTION_RESPONSE => {
                parser.read_u16("DestCID")?;
                let scid = parser.read_u16("SrcCID")?;
                if let Some(channel) = self.find(hci, acl.handle, scid) {
                    self.dispatch(channel, SignalEvent::DisconnectionResponse, hci, transport);
                }
            }

            L2CAP_INFORMATION_REQUEST => {
                let info_type = parser.read_u16("InfoType")?;
                self.send_information_response(acl.handle, signal.id, info_type, transport);
            }

            other => {
                error!("Unknown L2CAP signal {:#x}", other);
                parser.dump_remaining("UnknownSignal");
            }
        }
        Ok(())
    }

    fn read_options(parser: &mut MessageParser<'_>, mut length: u16) -> Result<(), ParseError> {
        while length >= 2 {
            let kind = parser.read_u8("OptionType")?;
            let size = parser.read_u8("OptionLength")?;
            parser.read_bytes("OptionData", size as usize)?;
            debug!("Peer config option {:#x} ({} bytes)", kind, size);
            length = length.saturating_sub(2 + size as u16);
        }
        Ok(())
    }

    fn dispatch<R: RadioLink>(
        &mut self,
        channel: ChannelId,
        event: SignalEvent,
        hci: &HciController,
        transport: &mut HciTransport<R>,
    ) {
        let state = self.channels[channel.0].state;
        if !event.valid_states().contains(&state) {
            error!(
                "L2CAP channel {:#x} got {:?} in state {:?}, expected one of {:?}",
                self.channels[channel.0].scid,
                event,
                state,
                event.valid_states()
            );
            return;
        }

        match event {
            SignalEvent::ConnectionResponse { dcid, result } => {
                self.channels[channel.0].dcid = dcid;
                match result {
                    L2CAP_RESULT_SUCCESS => self.send_configuration_request(channel, hci, transport),
                    L2CAP_RESULT_PENDING => debug!("L2CAP connection pending"),
                    refused => {
                        warn!("L2CAP connection refused, result {:#x}", refused);
                        self.set_state(channel, ChannelState::Closed);
                    }
                }
            }
            SignalEvent::ConfigurationRequest { id } => {
                // Whatever the peer proposes is accepted
                self.send_configuration_response(channel, id, hci, transport);
                info!("L2CAP channel {:#x} open", self.channels[channel.0].scid);
            }
            SignalEvent::ConfigurationResponse { result } => {
                if result != L2CAP_RESULT_SUCCESS {
                    warn!("L2CAP configuration rejected, result {:#x}; disconnecting", result);
                    self.send_disconnect_request(channel, hci, transport);
                }
            }
            SignalEvent::DisconnectionRequest { id } => {
                self.send_disconnect_response(channel, id, hci, transport);
            }
            SignalEvent::DisconnectionResponse => {
                self.set_state(channel, ChannelState::Closed);
            }
        }
    }
}

impl Default for L2capMux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockRadio;
    use crate::bluetooth::message::l2cap_frame;
    use ChannelState::*;

    const HANDLE: u16 = 0x0042;
    const SCID: u16 = 0x0048;
    const DCID: u16 = 0x0071;

    #[derive(Default)]
    struct Recorder {
        received: Vec<(ListenerId, Vec<u8>)>,
    }

    impl ChannelListener for Recorder {
        fn receive_data(&mut self, listener: ListenerId, _channel: ChannelId, parser: &mut MessageParser<'_>) {
            let n = parser.remaining();
            let data = parser.read_bytes("payload", n).unwrap().to_vec();
            self.received.push((listener, data));
        }
    }

    struct Fixture {
        hci: HciController,
        mux: L2capMux,
        transport: HciTransport<MockRadio>,
        radio: MockRadio,
        acl: AclId,
        recorder: Recorder,
    }

    impl Fixture {
        fn connected() -> Self {
            let radio = MockRadio::new();
            let mut transport = HciTransport::new(radio.clone());
            let mut hci = HciController::new();
            let acl = hci.allocate_connection().unwrap();
            hci.tick(&mut transport);
            hci.tick(&mut transport);
            radio.inject(&[
                H4_TYPE_EVENT, HCI_EVENT_INQUIRY_RESULT, 15, 1,
                1, 2, 3, 4, 5, 6, 1, 0, 0, 0x04, 0x25, 0x00, 0, 0,
            ]);
            hci.tick(&mut transport);
            radio.inject(&[
                H4_TYPE_EVENT, HCI_EVENT_CONNECTION_COMPLETE, 11,
                0, 0x42, 0x00, 1, 2, 3, 4, 5, 6, 1, 0,
            ]);
            hci.tick(&mut transport);
            assert!(hci.is_connected(acl));
            radio.take_sent();
            Self {
                hci,
                mux: L2capMux::new(),
                transport,
                radio,
                acl,
                recorder: Recorder::default(),
            }
        }

        fn open_channel(&mut self) -> ChannelId {
            self.mux
                .allocate_channel(&self.hci, self.acl, 0x11, SCID, &mut self.transport)
                .unwrap()
        }

        fn signal(&mut self, code: u8, id: u8, body: &[u8]) {
            let mut pkt = l2cap_signal(HANDLE, code, id);
            pkt.append(body);
            self.radio.inject(&pkt.finish());
            self.tick();
        }

        fn tick(&mut self) {
            self.mux.tick(&self.hci, &mut self.transport, &mut self.recorder);
        }

        fn force_state(&mut self, channel: ChannelId, state: ChannelState) {
            self.mux.channels[channel.0].state = state;
            self.mux.channels[channel.0].dcid = DCID;
        }
    }

    fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn connection_response(result: u16) -> Vec<u8> {
        words(&[DCID, SCID, result, 0])
    }

    #[test]
    fn full_open_sequence() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        assert_eq!(f.mux.state(ch), WaitConnect);
        let sent = f.radio.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][9..], &[L2CAP_CONNECTION_REQUEST, 1, 4, 0, 0x11, 0, 0x48, 0]);

        f.signal(L2CAP_CONNECTION_RESPONSE, 1, &connection_response(L2CAP_RESULT_SUCCESS));
        assert_eq!(f.mux.state(ch), Config);
        assert_eq!(f.mux.dcid(ch), DCID);
        let sent = f.radio.take_sent();
        assert_eq!(
            &sent[0][9..],
            &[L2CAP_CONFIGURATION_REQUEST, 2, 8, 0, 0x71, 0, 0, 0, 1, 2, 185, 0]
        );

        f.signal(L2CAP_CONFIGURATION_RESPONSE, 2, &words(&[SCID, 0, 0]));
        assert_eq!(f.mux.state(ch), Config);

        let mut body = words(&[SCID, 0]);
        body.extend_from_slice(&[1, 2, 0x80, 0x00]);
        f.signal(L2CAP_CONFIGURATION_REQUEST, 9, &body);
        assert_eq!(f.mux.state(ch), Open);
        assert!(f.mux.is_connected(ch, &f.hci));
        let sent = f.radio.take_sent();
        assert_eq!(&sent[0][9..], &[L2CAP_CONFIGURATION_RESPONSE, 9, 6, 0, 0x71, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn pending_then_refused() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.signal(L2CAP_CONNECTION_RESPONSE, 1, &connection_response(L2CAP_RESULT_PENDING));
        assert_eq!(f.mux.state(ch), WaitConnect);
        f.signal(L2CAP_CONNECTION_RESPONSE, 1, &connection_response(0x0004));
        assert_eq!(f.mux.state(ch), Closed);
    }

    #[test]
    fn rejected_configuration_disconnects() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.force_state(ch, Config);
        f.radio.take_sent();
        f.signal(L2CAP_CONFIGURATION_RESPONSE, 2, &words(&[SCID, 0, 1]));
        assert_eq!(f.mux.state(ch), WaitDisconnect);
        let sent = f.radio.take_sent();
        assert_eq!(sent[0][9], L2CAP_DISCONNECTION_REQUEST);
    }

    #[test]
    fn peer_disconnect_is_answered_then_closed() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.force_state(ch, Open);
        f.radio.take_sent();
        f.signal(L2CAP_DISCONNECTION_REQUEST, 5, &words(&[SCID, DCID]));
        assert_eq!(f.mux.state(ch), Closed);
        let sent = f.radio.take_sent();
        // Our dcid first, then our scid
        assert_eq!(&sent[0][9..], &[L2CAP_DISCONNECTION_RESPONSE, 5, 4, 0, 0x71, 0, 0x48, 0]);
    }

    #[test]
    fn unexpected_events_leave_state_alone() {
        let events: [(u8, Vec<u8>, &[ChannelState]); 5] = [
            (L2CAP_CONNECTION_RESPONSE, connection_response(0), &[WaitConnect]),
            (L2CAP_CONFIGURATION_REQUEST, words(&[SCID, 0]), &[Config, Open]),
            (L2CAP_CONFIGURATION_RESPONSE, words(&[SCID, 0, 1]), &[Config, Open]),
            (L2CAP_DISCONNECTION_REQUEST, words(&[SCID, DCID]), &[WaitConnect, Config, Open, WaitDisconnect]),
            (L2CAP_DISCONNECTION_RESPONSE, words(&[DCID, SCID]), &[WaitDisconnect]),
        ];
        let states = [Closed, WaitConnect, Config, Open, WaitDisconnect];

        for (code, body, valid) in &events {
            for state in states {
                if valid.contains(&state) {
                    continue;
                }
                let mut f = Fixture::connected();
                let ch = f.open_channel();
                f.force_state(ch, state);
                f.radio.take_sent();
                f.signal(*code, 3, body);
                assert_eq!(f.mux.state(ch), state, "code {:#x} in {:?}", code, state);
                assert!(f.radio.take_sent().is_empty());
            }
        }
    }

    #[test]
    fn unmatched_channel_does_not_disturb_others() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.signal(
            L2CAP_CONNECTION_RESPONSE,
            1,
            &words(&[DCID, 0x0099, L2CAP_RESULT_SUCCESS, 0]),
        );
        assert_eq!(f.mux.state(ch), WaitConnect);
    }

    #[test]
    fn data_goes_to_listener() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.force_state(ch, Open);
        f.mux.set_listener(ch, Some(ListenerId(4)));

        let mut pkt = l2cap_frame(HANDLE, SCID);
        pkt.append(&[0xA1, 0x30, 0x00, 0x08]);
        f.radio.inject(&pkt.finish());
        f.tick();
        assert_eq!(f.recorder.received, vec![(ListenerId(4), vec![0xA1, 0x30, 0x00, 0x08])]);

        f.mux.set_listener(ch, None);
        let mut pkt = l2cap_frame(HANDLE, SCID);
        pkt.append(&[0xA1]);
        f.radio.inject(&pkt.finish());
        f.tick();
        assert_eq!(f.recorder.received.len(), 1);
    }

    #[test]
    fn information_request_is_not_supported() {
        let mut f = Fixture::connected();
        f.signal(L2CAP_INFORMATION_REQUEST, 7, &words(&[0x0002]));
        let sent = f.radio.take_sent();
        assert_eq!(&sent[0][9..], &[L2CAP_INFORMATION_RESPONSE, 7, 4, 0, 2, 0, 1, 0]);
    }

    #[test]
    fn free_waits_for_disconnect_response() {
        let mut f = Fixture::connected();
        let ch = f.open_channel();
        f.force_state(ch, Open);
        f.radio.take_sent();

        f.mux.free_channel(ch, &f.hci, &mut f.transport);
        assert_eq!(f.mux.state(ch), WaitDisconnect);
        assert_eq!(f.mux.allocated_count(), 1);
        assert_eq!(f.radio.take_sent()[0][9], L2CAP_DISCONNECTION_REQUEST);

        f.signal(L2CAP_DISCONNECTION_RESPONSE, 1, &words(&[DCID, SCID]));
        assert_eq!(f.mux.allocated_count(), 0);
    }

    #[test]
    fn channel_pool_is_bounded() {
        let mut f = Fixture::connected();
        for _ in 0..MAX_L2CAP_CHANNELS {
            f.open_channel();
        }
        assert!(f
            .mux
            .allocate_channel(&f.hci, f.acl, 0x13, 0x49, &mut f.transport)
            .is_none());
    }
}
