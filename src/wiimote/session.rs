//! Wiimote session
//!
//! Drives one Wiimote from an empty ACL slot to streaming IR reports:
//!
//! ```text
//! Closed -> WaitingForAcl -> WaitingForL2cap -> SetSensitivity1 -> SetSensitivity2
//!        -> SetIrMode -> CameraEnable -> SetReportMode -> Open
//! ```
//!
//! Register writes are flow-controlled with a sent/acknowledged counter pair:
//! each `Set*` state waits until every write issued so far has been acked.

use crate::backend::RadioLink;
use crate::bluetooth::message::wiimote_report;
use crate::bluetooth::parser::{MessageParser, ParseError};
use crate::bluetooth::{AclId, BluetoothStack, ChannelId, ListenerId};
use crate::wiimote::constants::*;
use crate::wiimote::types::{Accel, Buttons, IrSpot, WiimoteData};
use log::{debug, error, info, warn};

/// Bring-up state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    WaitingForAcl,
    WaitingForL2cap,
    SetSensitivity1,
    SetSensitivity2,
    SetIrMode,
    CameraEnable,
    SetReportMode,
    Open,
}

/// One Wiimote on its control and data channels
pub struct WiimoteSession {
    listener: ListenerId,
    state: SessionState,
    data: WiimoteData,
    acl: Option<AclId>,
    control: Option<ChannelId>,
    data_channel: Option<ChannelId>,
    write_req: u32,
    write_ack: u32,
    starting_leds: u8,
}

impl WiimoteSession {
    /// Create a closed session whose data channel reports to `listener`
    pub fn new(listener: ListenerId) -> Self {
        Self {
            listener,
            state: SessionState::Closed,
            data: WiimoteData::default(),
            acl: None,
            control: None,
            data_channel: None,
            write_req: 0,
            write_ack: 0,
            starting_leds: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn data(&self) -> &WiimoteData {
        &self.data
    }

    /// Ask the HCI layer for a link. Returns false if no ACL slot is free.
    pub fn open<R: RadioLink>(&mut self, leds: u8, stack: &mut BluetoothStack<R>) -> bool {
        if self.state != SessionState::Closed {
            error!("Wiimote session opened twice (state {:?})", self.state);
            return false;
        }
        let Some(acl) = stack.hci.allocate_connection() else {
            error!("No ACL slot free for a new Wiimote");
            return false;
        };
        self.acl = Some(acl);
        self.starting_leds = leds;
        self.set_state(SessionState::WaitingForAcl);
        true
    }

    /// Release channels and link, returning to `Closed`
    pub fn close<R: RadioLink>(&mut self, stack: &mut BluetoothStack<R>) {
        for channel in [self.control.take(), self.data_channel.take()].into_iter().flatten() {
            stack.l2cap.free_channel(channel, &stack.hci, &mut stack.transport);
        }
        if let Some(acl) = self.acl.take() {
            stack.hci.free_connection(acl, &mut stack.transport);
        }
        *self = Self::new(self.listener);
    }

    /// True once both channels are open and bring-up has finished
    pub fn is_connected<R: RadioLink>(&self, stack: &BluetoothStack<R>) -> bool {
        match (self.control, self.data_channel) {
            (Some(control), Some(data)) => {
                stack.l2cap.is_connected(control, &stack.hci)
                    && stack.l2cap.is_connected(data, &stack.hci)
                    && self.state == SessionState::Open
            }
            _ => false,
        }
    }

    /// Advance bring-up
    pub fn tick<R: RadioLink>(&mut self, stack: &mut BluetoothStack<R>) {
        let acked = self.write_ack == self.write_req;
        match self.state {
            SessionState::Closed | SessionState::Open => {}

            SessionState::WaitingForAcl => {
                let Some(acl) = self.acl else { return };
                if !stack.hci.is_connected(acl) {
                    return;
                }
                let control = stack.l2cap.allocate_channel(
                    &stack.hci,
                    acl,
                    CONTROL_PSM,
                    SRC_CONTROL_CID,
                    &mut stack.transport,
                );
                let data = stack.l2cap.allocate_channel(
                    &stack.hci,
                    acl,
                    DATA_PSM,
                    SRC_DATA_CID,
                    &mut stack.transport,
                );
                match (control, data) {
                    (Some(control), Some(data)) => {
                        stack.l2cap.set_listener(data, Some(self.listener));
                        self.control = Some(control);
                        self.data_channel = Some(data);
                        self.set_state(SessionState::WaitingForL2cap);
                    }
                    (control, data) => {
                        warn!("Couldn't allocate both Wiimote channels, retrying");
                        for channel in [control, data].into_iter().flatten() {
                            stack.l2cap.free_channel(channel, &stack.hci, &mut stack.transport);
                        }
                    }
                }
            }

            SessionState::WaitingForL2cap => {
                let (Some(control), Some(data)) = (self.control, self.data_channel) else {
                    return;
                };
                if stack.l2cap.is_connected(control, &stack.hci) && stack.l2cap.is_connected(data, &stack.hci) {
                    info!("Wiimote channels open, configuring camera");
                    self.set_player_leds(self.starting_leds, stack);
                    self.write_single_byte_report(REPORT_IR_ENABLE_1, IR_ENABLE, stack);
                    self.write_single_byte_report(REPORT_IR_ENABLE_2, IR_ENABLE, stack);
                    self.write_register(REG_CAMERA_ENABLE, &[CAMERA_ENABLE], stack);
                    self.set_state(SessionState::SetSensitivity1);
                }
            }

            SessionState::SetSensitivity1 if acked => {
                self.write_register(REG_SENSITIVITY_1, &SENSITIVITY_BLOCK_1, stack);
                self.set_state(SessionState::SetSensitivity2);
            }

            SessionState::SetSensitivity2 if acked => {
                self.write_register(REG_SENSITIVITY_2, &SENSITIVITY_BLOCK_2, stack);
                self.set_state(SessionState::SetIrMode);
            }

            SessionState::SetIrMode if acked => {
                self.write_register(REG_IR_MODE, &[IR_MODE_EXTENDED], stack);
                self.set_state(SessionState::CameraEnable);
            }

            SessionState::CameraEnable if acked => {
                self.write_register(REG_CAMERA_ENABLE, &[CAMERA_ENABLE], stack);
                self.set_state(SessionState::SetReportMode);
            }

            SessionState::SetReportMode if acked => {
                self.request_report_mode(REPORT_CORE_BUTTONS_ACC_IR12, stack);
                self.set_state(SessionState::Open);
            }

            // Waiting on a write acknowledgement
            _ => {}
        }
    }

    /// Light the player LEDs (low 4 bits of `leds`)
    pub fn set_player_leds<R: RadioLink>(&mut self, leds: u8, stack: &mut BluetoothStack<R>) {
        self.write_single_byte_report(REPORT_SET_LEDS, leds << 4, stack);
    }

    // ========================================================================
    // Output reports
    // ========================================================================

    fn route<R: RadioLink>(&self, stack: &BluetoothStack<R>) -> Option<(u16, u16)> {
        let handle = stack.hci.connection(self.acl?).handle();
        let dcid = stack.l2cap.dcid(self.data_channel?);
        Some((handle, dcid))
    }

    fn write_single_byte_report<R: RadioLink>(&self, report: u8, value: u8, stack: &mut BluetoothStack<R>) {
        let Some((handle, dcid)) = self.route(stack) else {
            warn!("Wiimote report {:#x} dropped: no data channel", report);
            return;
        };
        let mut msg = wiimote_report(handle, dcid, report);
        msg.add_u8(value);
        stack.transport.send(&msg.finish());
    }

    fn request_report_mode<R: RadioLink>(&self, mode: u8, stack: &mut BluetoothStack<R>) {
        let Some((handle, dcid)) = self.route(stack) else {
            return;
        };
        let mut msg = wiimote_report(handle, dcid, REPORT_REQUEST_REPORT);
        msg.add_u8(0x00) // only report on change
            .add_u8(mode);
        stack.transport.send(&msg.finish());
    }

    fn write_register<R: RadioLink>(&mut self, register: u32, data: &[u8], stack: &mut BluetoothStack<R>) {
        if data.len() > MAX_WRITE_SIZE {
            error!("Incorrect size for register write: {}", data.len());
            return;
        }
        let Some((handle, dcid)) = self.route(stack) else {
            return;
        };
        let mut msg = wiimote_report(handle, dcid, REPORT_WRITE_MEMORY);
        msg.add_u8(REGISTER_SPACE)
            .add_u24_be(register)
            .add_u8(data.len() as u8)
            .append(data)
            .append(&[0u8; MAX_WRITE_SIZE][data.len()..]);
        stack.transport.send(&msg.finish());
        self.write_req += 1;
    }

    fn set_state(&mut self, state: SessionState) {
        debug!("Changing Wiimote state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    // ========================================================================
    // Input reports
    // ========================================================================

    /// Decode one input report from the data channel
    pub fn receive_report(&mut self, parser: &mut MessageParser<'_>) -> Result<(), ParseError> {
        let magic = parser.read_u8("WiimoteMagic")?;
        if magic != WIIMOTE_INPUT_MAGIC {
            warn!("Unexpected Wiimote header {:#x}", magic);
            return Ok(());
        }

        let report = parser.read_u8("ReportCode")?;
        match report {
            REPORT_STATUS_INFORMATION => {
                let buttons = parser.read_u16("Buttons")?;
                let led_flags = parser.read_u8("LEDAndFlags")?;
                parser.read_u16("Reserved")?;
                let battery = parser.read_u8("BatteryLevel")?;
                self.set_buttons(buttons);
                self.data.battery_level = battery;
                self.data.leds = led_flags >> 4;
                // A status report resets the reporting mode on the device
                if self.state == SessionState::Open {
                    self.set_state(SessionState::SetReportMode);
                }
            }

            REPORT_READ_MEMORY => {
                let buttons = parser.read_u16("Buttons")?;
                let size_and_error = parser.read_u8("SizeAndErrorFlags")?;
                let offset = parser.read_u16("MemoryOffset")?;
                parser.read_bytes("MemoryData", (size_and_error >> 4) as usize + 1)?;
                self.set_buttons(buttons);
                if size_and_error & 0x0F != 0 {
                    error!("Memory read at {:#x} failed (error {:#x})", offset, size_and_error & 0x0F);
                }
            }

            REPORT_ACKNOWLEDGE => {
                let buttons = parser.read_u16("Buttons")?;
                let acked = parser.read_u8("ReportNum")?;
                let code = parser.read_u8("ErrorCode")?;
                self.set_buttons(buttons);
                if acked == REPORT_WRITE_MEMORY {
                    self.write_ack += 1;
                }
                if code != 0 {
                    error!("Wiimote rejected report {:#x} (error {:#x})", acked, code);
                }
            }

            REPORT_CORE_BUTTONS => {
                let buttons = parser.read_u16("Buttons")?;
                self.set_buttons(buttons);
            }

            REPORT_CORE_BUTTONS_ACC_IR12 => {
                let buttons = parser.read_u16("Buttons")?;
                let ax = parser.read_u8("AccelX")? as u16;
                let ay = parser.read_u8("AccelY")? as u16;
                let az = parser.read_u8("AccelZ")? as u16;
                let mut spots = [0u32; 4];
                for spot in spots.iter_mut() {
                    *spot = parser.read_u24("Spot")?;
                }

                self.set_buttons(buttons);
                self.data.accel = Accel {
                    x: (ax << 2) | ((buttons >> 5) & 3),
                    y: (ay << 2) | ((buttons >> 12) & 2),
                    z: (az << 2) | ((buttons >> 13) & 2),
                };
                // Single-blob tracking: only the first spot is decoded
                self.data.ir_spots[0] = decode_spot(spots[0]);
                self.data.frame_number = self.data.frame_number.wrapping_add(1);
            }

            other => {
                error!("Unhandled Wiimote report {:#x}", other);
                parser.dump_remaining("UnknownReportCode");
            }
        }
        Ok(())
    }

    fn set_buttons(&mut self, raw: u16) {
        self.data.buttons = Buttons(raw & !ACCEL_BUTTON_BITS);
    }
}

/// Unpack a basic-mode IR spot: `[x lo][y lo][yy xx ssss]`
fn decode_spot(tri: u32) -> IrSpot {
    let x = ((tri & 0xFF) + ((tri >> 12) & 0x300)) as u16;
    let y = (((tri >> 8) & 0xFF) + ((tri >> 14) & 0x300)) as u16;
    let size = ((tri >> 16) & 0x0F) as u8;
    IrSpot {
        x,
        y,
        size: size | (size << 4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(session: &mut WiimoteSession, bytes: &[u8]) {
        let mut parser = MessageParser::new(bytes);
        session.receive_report(&mut parser).unwrap();
    }

    #[test]
    fn accel_low_bits_come_from_button_word() {
        let mut session = WiimoteSession::new(ListenerId(0));
        // Buttons 0x6060 | A: bits 5,6 -> X low = 3, bit 13 -> Y low = 2, bit 14 -> Z low = 2
        let buttons: u16 = 0x6060 | 0x0800;
        let mut report = vec![0xA1, 0x33];
        report.extend_from_slice(&buttons.to_le_bytes());
        report.extend_from_slice(&[0x80, 0x7F, 0x99]);
        report.extend_from_slice(&[0xFF; 12]);
        decode(&mut session, &report);

        let data = session.data();
        assert_eq!(data.accel, Accel { x: (0x80 << 2) | 3, y: (0x7F << 2) | 2, z: (0x99 << 2) | 2 });
        assert_eq!(data.buttons, Buttons(0x0800));
        assert_eq!(data.frame_number, 1);
        assert!(!data.ir_spots[0].is_visible());
    }

    #[test]
    fn ir_spot_unpacking() {
        // x = 0x234, y = 0x1C7, size 0x5
        let spot = decode_spot(0x34 | (0xC7 << 8) | (((0x1 << 6) | (0x2 << 4) | 0x5) << 16));
        assert_eq!(spot, IrSpot { x: 0x234, y: 0x1C7, size: 0x55 });
    }

    #[test]
    fn only_ir_report_advances_frame_counter() {
        let mut session = WiimoteSession::new(ListenerId(0));
        decode(&mut session, &[0xA1, 0x20, 0x00, 0x00, 0x30, 0x00, 0x00, 0xC8]);
        decode(&mut session, &[0xA1, 0x22, 0x00, 0x00, 0x16, 0x00]);
        decode(&mut session, &[0xA1, 0x30, 0x00, 0x80]);
        assert_eq!(session.data().frame_number, 0);
        assert_eq!(session.data().buttons, Buttons(0x8000));
        assert_eq!(session.data().battery_level, 0xC8);
        assert_eq!(session.data().leds, 0x3);
        assert_eq!(session.write_ack, 1);
    }

    #[test]
    fn status_report_while_open_rerequests_report_mode() {
        let mut session = WiimoteSession::new(ListenerId(0));
        session.state = SessionState::Open;
        decode(&mut session, &[0xA1, 0x20, 0x00, 0x00, 0x10, 0x00, 0x00, 0x40]);
        assert_eq!(session.state(), SessionState::SetReportMode);
    }

    #[test]
    fn read_memory_consumes_its_data() {
        let mut session = WiimoteSession::new(ListenerId(0));
        let bytes = [0xA1, 0x21, 0x00, 0x00, 0x10, 0x00, 0x30, 0xAA, 0xBB];
        let mut parser = MessageParser::new(&bytes);
        session.receive_report(&mut parser).unwrap();
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn unknown_report_is_not_fatal() {
        let mut session = WiimoteSession::new(ListenerId(0));
        let bytes = [0xA1, 0x3D, 1, 2, 3];
        let mut parser = MessageParser::new(&bytes);
        assert!(session.receive_report(&mut parser).is_ok());
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn truncated_report_is_an_error() {
        let mut session = WiimoteSession::new(ListenerId(0));
        let bytes = [0xA1, 0x33, 0x00];
        let mut parser = MessageParser::new(&bytes);
        assert!(session.receive_report(&mut parser).is_err());
        assert_eq!(session.data().frame_number, 0);
    }
}
