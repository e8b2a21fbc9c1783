//! Simulated Wiimote radio.
//!
//! Stands in for a Bluetooth controller with one discoverable Wiimote in
//! range. It answers the HCI commands the stack issues, plays the remote side
//! of L2CAP channel setup, acknowledges register writes and streams
//! buttons+accelerometer+IR reports once the data channel asks for them.
//!
//! Clones share the same device, so tests and the demo binary can steer the
//! buttons and IR spot while the stack owns the radio.

use crate::backend::{BackendError, RadioLink};
use crate::bluetooth::constants::*;
use crate::bluetooth::message::{l2cap_frame, l2cap_signal, LengthWidth, Packet};
use crate::bluetooth::{MessageParser, PacketRouter, ParseError};
use crate::wiimote::constants::*;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

const SIM_ADDRESS: [u8; 6] = [0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
const SIM_CLASS: u32 = 0x002504;
const SIM_HANDLE: u16 = 0x0029;
const FIRST_LOCAL_CID: u16 = 0x0040;
const STATUS_UNKNOWN_COMMAND: u8 = 0x01;
const STATUS_PAGE_TIMEOUT: u8 = 0x04;
const REASON_LOCAL_HOST: u8 = 0x16;

#[derive(Debug, Clone, Copy)]
struct SimChannel {
    psm: u16,
    host_cid: u16,
    local_cid: u16,
}

struct SimState {
    router: Option<PacketRouter>,
    discoverable: bool,
    connected: bool,
    channels: Vec<SimChannel>,
    next_cid: u16,
    signal_id: u8,
    leds: u8,
    registers: HashMap<u32, u8>,
    report_mode: Option<u8>,
    buttons: u16,
    accel: [u8; 3],
    spot: Option<(u16, u16)>,
    battery: u8,
}

/// Simulated controller plus Wiimote.
#[derive(Clone)]
pub struct SimWiimote {
    state: Arc<Mutex<SimState>>,
}

impl SimWiimote {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                router: None,
                discoverable: true,
                connected: false,
                channels: Vec::new(),
                next_cid: FIRST_LOCAL_CID,
                signal_id: 0x80,
                leds: 0,
                registers: HashMap::new(),
                report_mode: None,
                buttons: 0,
                accel: [0x80, 0x80, 0x99],
                spot: None,
                battery: 0xC8,
            })),
        }
    }

    /// Whether inquiries find the Wiimote
    pub fn set_discoverable(&self, discoverable: bool) {
        self.lock().discoverable = discoverable;
    }

    /// Raw button word for the following reports
    pub fn set_buttons(&self, buttons: u16) {
        self.lock().buttons = buttons;
    }

    /// Accelerometer high bytes for the following reports
    pub fn set_accel(&self, x: u8, y: u8, z: u8) {
        self.lock().accel = [x, y, z];
    }

    /// Camera position of the tracked blob, `None` when nothing is in view
    pub fn set_spot(&self, spot: Option<(u16, u16)>) {
        self.lock().spot = spot;
    }

    /// Player LEDs currently lit (low 4 bits)
    pub fn leds(&self) -> u8 {
        self.lock().leds
    }

    /// Last value written to a camera register byte
    pub fn register(&self, address: u32) -> Option<u8> {
        self.lock().registers.get(&address).copied()
    }

    pub fn report_mode(&self) -> Option<u8> {
        self.lock().report_mode
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn open_channels(&self) -> usize {
        self.lock().channels.len()
    }

    /// Push one buttons+accelerometer+IR report if streaming was requested.
    /// Returns false when nothing was sent.
    pub fn send_report(&self) -> bool {
        let mut state = self.lock();
        if state.report_mode != Some(REPORT_CORE_BUTTONS_ACC_IR12) {
            return false;
        }
        let mut body = vec![WIIMOTE_INPUT_MAGIC, REPORT_CORE_BUTTONS_ACC_IR12];
        body.extend_from_slice(&state.buttons.to_le_bytes());
        body.extend_from_slice(&state.accel);
        body.extend_from_slice(&encode_spot(state.spot));
        body.extend_from_slice(&[0xFF; 9]);
        state.send_data(&body)
    }

    /// Push an unsolicited status report
    pub fn send_status(&self) -> bool {
        let mut state = self.lock();
        let mut body = vec![WIIMOTE_INPUT_MAGIC, REPORT_STATUS_INFORMATION];
        body.extend_from_slice(&state.buttons.to_le_bytes());
        body.extend_from_slice(&[state.leds << 4, 0, 0, state.battery]);
        // The device drops back to core buttons after a status report
        state.report_mode = None;
        state.send_data(&body)
    }

    /// Drop the link from the Wiimote's side
    pub fn drop_link(&self) {
        let mut state = self.lock();
        if state.connected {
            state.disconnect(REASON_LOCAL_HOST);
        }
    }

    /// Stream reports every `interval` until `running` clears
    pub fn spawn_streamer(
        &self,
        running: Arc<AtomicBool>,
        interval: Duration,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        let sim = self.clone();
        thread::Builder::new()
            .name("sim-wiimote".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                while running.load(Ordering::SeqCst) {
                    if ticker.recv().is_err() {
                        break;
                    }
                    sim.send_report();
                }
                debug!("[SIM WIIMOTE] Streamer stopped");
            })
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimWiimote {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioLink for SimWiimote {
    fn attach(&mut self, router: PacketRouter) {
        self.lock().router = Some(router);
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), BackendError> {
        let (&kind, body) = packet
            .split_first()
            .ok_or_else(|| BackendError::Operation("empty packet".into()))?;
        let mut state = self.lock();
        let mut parser = MessageParser::new(body);
        let result = match kind {
            H4_TYPE_COMMAND => state.handle_command(&mut parser),
            H4_TYPE_ACL => state.handle_acl(&mut parser),
            other => return Err(BackendError::UnsupportedPacket(other)),
        };
        result.map_err(|e| BackendError::Operation(e.to_string()))
    }
}

/// Basic-mode IR bytes: `[x lo][y lo][yy xx ssss]`
fn encode_spot(spot: Option<(u16, u16)>) -> [u8; 3] {
    match spot {
        Some((x, y)) => [
            (x & 0xFF) as u8,
            (y & 0xFF) as u8,
            ((((y >> 8) & 3) << 6) | (((x >> 8) & 3) << 4) | 0x3) as u8,
        ],
        None => [0xFF; 3],
    }
}

impl SimState {
    fn deliver(&mut self, packet: &[u8]) {
        if let Some(router) = self.router.as_mut() {
            router.receive_packet(packet);
        }
    }

    fn event(&mut self, code: u8, body: &[u8]) {
        let mut packet = Packet::new(H4_TYPE_EVENT);
        packet.add_u8(code).open_length(LengthWidth::U8, &[]).append(body);
        self.deliver(&packet.finish());
    }

    fn command_complete(&mut self, opcode: u16, status: u8) {
        let [lo, hi] = opcode.to_le_bytes();
        self.event(HCI_EVENT_COMMAND_COMPLETE, &[1, lo, hi, status]);
    }

    fn command_status(&mut self, opcode: u16, status: u8) {
        let [lo, hi] = opcode.to_le_bytes();
        self.event(HCI_EVENT_COMMAND_STATUS, &[status, 1, lo, hi]);
    }

    fn disconnect(&mut self, reason: u8) {
        self.connected = false;
        self.channels.clear();
        self.report_mode = None;
        let [lo, hi] = SIM_HANDLE.to_le_bytes();
        self.event(HCI_EVENT_DISCONNECTION_COMPLETE, &[0, lo, hi, reason]);
        info!("[SIM WIIMOTE] Link dropped (reason {:#x})", reason);
    }

    // ========================================================================
    // HCI
    // ========================================================================

    fn handle_command(&mut self, parser: &mut MessageParser<'_>) -> Result<(), ParseError> {
        let opcode = parser.read_u16("OpCode")?;
        let length = parser.read_u8("Length")?;
        match opcode {
            HCI_RESET => {
                self.connected = false;
                self.channels.clear();
                self.report_mode = None;
                self.command_complete(opcode, 0);
            }

            HCI_SET_EVENT_FILTER => {
                parser.read_bytes("Filter", length as usize)?;
                self.command_complete(opcode, 0);
            }

            HCI_INQUIRY => {
                parser.read_bytes("InquiryParameters", length as usize)?;
                self.command_status(opcode, 0);
                if self.discoverable && !self.connected {
                    let mut result = vec![1];
                    result.extend_from_slice(&SIM_ADDRESS);
                    result.extend_from_slice(&[1, 0, 0]);
                    result.extend_from_slice(&SIM_CLASS.to_le_bytes()[..3]);
                    result.extend_from_slice(&[0, 0]);
                    self.event(HCI_EVENT_INQUIRY_RESULT, &result);
                }
                self.event(HCI_EVENT_INQUIRY_COMPLETE, &[0]);
            }

            HCI_CREATE_CONNECTION => {
                let address = parser.read_bytes("BD_ADDR", 6)?;
                parser.read_bytes("ConnectionParameters", (length as usize).saturating_sub(6))?;
                self.command_status(opcode, 0);

                let mut complete = Vec::with_capacity(11);
                if address == SIM_ADDRESS && !self.connected {
                    self.connected = true;
                    complete.push(0);
                    info!("[SIM WIIMOTE] Link up");
                } else {
                    complete.push(STATUS_PAGE_TIMEOUT);
                }
                complete.extend_from_slice(&SIM_HANDLE.to_le_bytes());
                complete.extend_from_slice(address);
                complete.extend_from_slice(&[1, 0]);
                self.event(HCI_EVENT_CONNECTION_COMPLETE, &complete);
            }

            HCI_DISCONNECT => {
                parser.read_u16("Handle")?;
                parser.read_u8("Reason")?;
                self.command_status(opcode, 0);
                if self.connected {
                    self.disconnect(REASON_LOCAL_HOST);
                }
            }

            other => {
                warn!("[SIM WIIMOTE] Unsupported HCI command {:#06x}", other);
                parser.read_bytes("Parameters", length as usize)?;
                self.command_complete(other, STATUS_UNKNOWN_COMMAND);
            }
        }
        Ok(())
    }

    // ========================================================================
    // L2CAP
    // ========================================================================

    fn handle_acl(&mut self, parser: &mut MessageParser<'_>) -> Result<(), ParseError> {
        let acl = parser.read_acl_header()?;
        let l2cap = parser.read_l2cap_header(&acl)?;
        if !self.connected {
            parser.read_bytes("Payload", parser.remaining())?;
            return Ok(());
        }
        if l2cap.channel == L2CAP_SIGNALING_CHANNEL {
            let signal = parser.read_signal_header(&l2cap)?;
            return self.handle_signal(signal.code, signal.id, parser);
        }
        match self.channels.iter().find(|c| c.local_cid == l2cap.channel).copied() {
            Some(channel) if channel.psm == DATA_PSM => self.handle_output_report(parser),
            _ => {
                parser.read_bytes("Payload", parser.remaining())?;
                Ok(())
            }
        }
    }

    fn handle_signal(&mut self, code: u8, id: u8, parser: &mut MessageParser<'_>) -> Result<(), ParseError> {
        match code {
            L2CAP_CONNECTION_REQUEST => {
                let psm = parser.read_u16("PSM")?;
                let host_cid = parser.read_u16("SourceCID")?;
                let local_cid = self.next_cid;
                self.next_cid += 1;
                self.channels.push(SimChannel { psm, host_cid, local_cid });

                let mut rsp = l2cap_signal(SIM_HANDLE, L2CAP_CONNECTION_RESPONSE, id);
                rsp.add_u16(local_cid)
                    .add_u16(host_cid)
                    .add_u16(L2CAP_RESULT_SUCCESS)
                    .add_u16(0);
                self.deliver(&rsp.finish());

                let req_id = self.next_signal_id();
                let mut req = l2cap_signal(SIM_HANDLE, L2CAP_CONFIGURATION_REQUEST, req_id);
                req.add_u16(host_cid)
                    .add_u16(0)
                    .add_u8(L2CAP_OPTION_MTU)
                    .add_u8(2)
                    .add_u16(MAX_MESSAGE_LENGTH as u16);
                self.deliver(&req.finish());
            }

            L2CAP_CONFIGURATION_REQUEST => {
                let local_cid = parser.read_u16("DestCID")?;
                parser.read_u16("Flags")?;
                parser.read_bytes("Options", parser.remaining())?;
                if let Some(channel) = self.channels.iter().find(|c| c.local_cid == local_cid).copied() {
                    let mut rsp = l2cap_signal(SIM_HANDLE, L2CAP_CONFIGURATION_RESPONSE, id);
                    rsp.add_u16(channel.host_cid)
                        .add_u16(0)
                        .add_u16(L2CAP_RESULT_SUCCESS);
                    self.deliver(&rsp.finish());
                }
            }

            L2CAP_DISCONNECTION_REQUEST => {
                let local_cid = parser.read_u16("DestCID")?;
                let host_cid = parser.read_u16("SourceCID")?;
                self.channels.retain(|c| c.local_cid != local_cid);
                let mut rsp = l2cap_signal(SIM_HANDLE, L2CAP_DISCONNECTION_RESPONSE, id);
                rsp.add_u16(local_cid).add_u16(host_cid);
                self.deliver(&rsp.finish());
            }

            _ => {
                parser.read_bytes("SignalData", parser.remaining())?;
            }
        }
        Ok(())
    }

    fn next_signal_id(&mut self) -> u8 {
        let id = self.signal_id;
        self.signal_id = self.signal_id.wrapping_add(1).max(1);
        id
    }

    fn send_data(&mut self, body: &[u8]) -> bool {
        let Some(channel) = self.channels.iter().find(|c| c.psm == DATA_PSM).copied() else {
            return false;
        };
        let mut frame = l2cap_frame(SIM_HANDLE, channel.host_cid);
        frame.append(body);
        self.deliver(&frame.finish());
        true
    }

    // ========================================================================
    // Wiimote output reports
    // ========================================================================

    fn handle_output_report(&mut self, parser: &mut MessageParser<'_>) -> Result<(), ParseError> {
        let magic = parser.read_u8("Magic")?;
        let report = parser.read_u8("Report")?;
        if magic != WIIMOTE_OUTPUT_MAGIC {
            parser.read_bytes("Payload", parser.remaining())?;
            return Ok(());
        }
        match report {
            REPORT_SET_LEDS => {
                self.leds = parser.read_u8("LEDs")? >> 4;
            }
            REPORT_REQUEST_REPORT => {
                parser.read_u8("Continuous")?;
                self.report_mode = Some(parser.read_u8("Mode")?);
            }
            REPORT_WRITE_MEMORY => {
                parser.read_u8("Space")?;
                let address = parser.read_u24_be("Address")?;
                let size = parser.read_u8("Size")?;
                let data = parser.read_bytes("Data", MAX_WRITE_SIZE)?;
                for (offset, value) in data.iter().take(size as usize).enumerate() {
                    self.registers.insert(address + offset as u32, *value);
                }
                let mut ack = vec![WIIMOTE_INPUT_MAGIC, REPORT_ACKNOWLEDGE];
                ack.extend_from_slice(&self.buttons.to_le_bytes());
                ack.extend_from_slice(&[REPORT_WRITE_MEMORY, 0]);
                self.send_data(&ack);
            }
            _ => {
                parser.read_bytes("ReportData", parser.remaining())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_encoding_matches_camera_layout() {
        assert_eq!(encode_spot(Some((0x234, 0x1C7))), [0x34, 0xC7, 0x63]);
        assert_eq!(encode_spot(None), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn no_reports_before_streaming_is_requested() {
        let sim = SimWiimote::new();
        assert!(!sim.send_report());
        assert!(!sim.is_connected());
    }

    #[test]
    fn unknown_packet_type_is_rejected() {
        let mut sim = SimWiimote::new();
        assert!(matches!(sim.send_packet(&[3, 0, 0]), Err(BackendError::UnsupportedPacket(3))));
    }
}
