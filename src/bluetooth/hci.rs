//! HCI controller
//!
//! Brings the radio up and manages ACL links:
//! - Startup: reset plus an inquiry event filter for the Wiimote device class
//! - Ready: start an inquiry whenever an allocated slot still wants a link
//! - Inquiring/Connecting: connect to the first result, wait for the handle
//!
//! Only one discovery/connection cycle runs at a time. Further requests wait in
//! their slots until the controller is back in `Ready`.

use crate::backend::RadioLink;
use crate::bluetooth::constants::*;
use crate::bluetooth::message::hci_command;
use crate::bluetooth::parser::{MessageParser, ParseError};
use crate::bluetooth::transport::HciTransport;
use log::{debug, error, info, warn};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciState {
    Startup,
    Ready,
    Inquiring,
    Connecting,
}

/// Index of a slot in the ACL connection pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclId(usize);

impl AclId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One link-layer connection slot
#[derive(Debug, Clone, Copy, Default)]
pub struct AclConnection {
    allocated: bool,
    connected: bool,
    wants_connection: bool,
    handle: u16,
    address: [u8; 6],
}

impl AclConnection {
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn is_connected(&self) -> bool {
        self.allocated && self.connected
    }

    pub fn wants_connection(&self) -> bool {
        self.allocated && self.wants_connection
    }

    /// Controller-assigned handle (0 until connected)
    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// Remote device address, as received (little-endian byte order)
    pub fn address(&self) -> [u8; 6] {
        self.address
    }

    fn allocate(&mut self) {
        *self = Self {
            allocated: true,
            wants_connection: true,
            ..Self::default()
        };
    }

    fn register_connection(&mut self, handle: u16, address: [u8; 6]) {
        self.wants_connection = false;
        self.connected = true;
        self.handle = handle;
        self.address = address;
    }

    fn register_disconnection(&mut self) {
        self.connected = false;
        self.handle = 0;
    }
}

/// HCI state machine and ACL connection pool
pub struct HciController {
    state: HciState,
    connections: [AclConnection; MAX_ACL_CONNECTIONS],
}

impl HciController {
    pub fn new() -> Self {
        Self {
            state: HciState::Startup,
            connections: [AclConnection::default(); MAX_ACL_CONNECTIONS],
        }
    }

    pub fn state(&self) -> HciState {
        self.state
    }

    /// Drain pending events, then advance the state machine
    pub fn tick<R: RadioLink>(&mut self, transport: &mut HciTransport<R>) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        while let Some(len) = transport.next_event(&mut buffer) {
            let mut parser = MessageParser::new(&buffer[..len]);
            if let Err(e) = self.handle_event(&mut parser, transport) {
                error!("Malformed HCI event: {}", e);
                parser.dump_remaining("MalformedEvent");
            }
        }

        match self.state {
            HciState::Startup => {
                self.reset(transport);
                self.set_state(HciState::Ready);
                self.set_filter(transport);
            }
            HciState::Ready => {
                if self.connections.iter().any(|c| c.wants_connection()) {
                    self.inquire(transport);
                    self.set_state(HciState::Inquiring);
                }
            }
            HciState::Inquiring | HciState::Connecting => {}
        }
    }

    /// Claim a free slot; the link is established by later ticks
    pub fn allocate_connection(&mut self) -> Option<AclId> {
        let index = self.connections.iter().position(|c| !c.is_allocated())?;
        self.connections[index].allocate();
        debug!("Allocated ACL slot {}", index);
        Some(AclId(index))
    }

    /// Release a slot, disconnecting the link first if it is up
    pub fn free_connection<R: RadioLink>(&mut self, id: AclId, transport: &mut HciTransport<R>) {
        let connection = self.connections[id.0];
        if connection.is_connected() {
            self.disconnect(connection.handle(), transport);
        }
        self.connections[id.0] = AclConnection::default();
        debug!("Freed ACL slot {}", id.0);
    }

    pub fn connection(&self, id: AclId) -> &AclConnection {
        &self.connections[id.0]
    }

    pub fn is_connected(&self, id: AclId) -> bool {
        self.connections[id.0].is_connected()
    }

    fn set_state(&mut self, state: HciState) {
        debug!("Changing HCI state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn find_by_handle(&mut self, handle: u16) -> Option<&mut AclConnection> {
        let found = self
            .connections
            .iter_mut()
            .find(|c| c.is_connected() && c.handle() == handle);
        if found.is_none() {
            error!("HCI can't find a connection with handle {:#x}", handle);
        }
        found
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn reset<R: RadioLink>(&self, transport: &mut HciTransport<R>) {
        transport.send(&hci_command(HCI_RESET).finish());
    }

    fn set_filter<R: RadioLink>(&self, transport: &mut HciTransport<R>) {
        let mut cmd = hci_command(HCI_SET_EVENT_FILTER);
        cmd.add_u8(1) // filter inquiry results
            .add_u8(1) // by class of device
            .add_u24(WIIMOTE_DEVICE_CLASS)
            .add_u24(WIIMOTE_DEVICE_CLASS_MASK);
        transport.send(&cmd.finish());
    }

    fn inquire<R: RadioLink>(&self, transport: &mut HciTransport<R>) {
        let mut cmd = hci_command(HCI_INQUIRY);
        cmd.add_u24(GIAC_LAP)
            .add_u8(INQUIRY_LENGTH)
            .add_u8(INQUIRY_MAX_RESPONSES);
        transport.send(&cmd.finish());
    }

    fn connect<R: RadioLink>(&self, address: &[u8], transport: &mut HciTransport<R>) {
        let mut cmd = hci_command(HCI_CREATE_CONNECTION);
        cmd.append(address)
            .add_u16(CONNECTION_PACKET_TYPES)
            .add_u8(1) // page scan repetition mode R1
            .add_u8(0) // reserved
            .add_u16(0) // clock offset not valid
            .add_u8(0); // no role switch
        transport.send(&cmd.finish());
    }

    fn disconnect<R: RadioLink>(&self, handle: u16, transport: &mut HciTransport<R>) {
        let mut cmd = hci_command(HCI_DISCONNECT);
        cmd.add_u16(handle).add_u8(DISCONNECT_REASON_USER);
        transport.send(&cmd.finish());
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn handle_event<R: RadioLink>(
        &mut self,
        parser: &mut MessageParser<'_>,
        transport: &mut HciTransport<R>,
    ) -> Result<(), ParseError> {
        let code = parser.read_u8("HCIEvent")?;
        let size = parser.read_u8("HCISize")?;
        if size as usize != parser.remaining() {
            warn!(
                "HCI event {:#x} size mismatch: header says {}, packet has {}",
                code,
                size,
                parser.remaining()
            );
        }

        match code {
            HCI_EVENT_INQUIRY_COMPLETE => {
                let status = parser.read_u8("Status")?;
                match self.state {
                    // Nothing found, go around again
                    HciState::Inquiring => self.set_state(HciState::Ready),
                    HciState::Connecting => {}
                    other => error!("Inquiry complete (status {:#x}) in state {:?}", status, other),
                }
            }

            HCI_EVENT_INQUIRY_RESULT => {
                let responses = parser.read_u8("Num_Responses")?;
                if self.state != HciState::Inquiring {
                    error!("Inquiry result in state {:?}, expected Inquiring", self.state);
                    parser.dump_remaining("UnexpectedInquiryResult");
                    return Ok(());
                }
                if responses == 0 {
                    return Ok(());
                }
                if responses != 1 {
                    warn!("Expected a single inquiry response, got {}", responses);
                    parser.dump_remaining("InquiryResponses");
                    return Ok(());
                }
                let address = parser.read_bytes("BD_ADDR", 6)?;
                parser.read_u8("PageScanRepetitionMode")?;
                parser.read_u16("Reserved")?;
                let class = parser.read_u24("ClassOfDevice")?;
                parser.read_u16("ClockOffset")?;

                if class & WIIMOTE_DEVICE_CLASS_MASK != WIIMOTE_DEVICE_CLASS & WIIMOTE_DEVICE_CLASS_MASK {
                    warn!("Ignoring inquiry result with device class {:#08x}", class);
                    return Ok(());
                }
                info!("Found device {:02x?}, connecting", address);
                self.connect(address, transport);
                self.set_state(HciState::Connecting);
            }

            HCI_EVENT_CONNECTION_COMPLETE => {
                let status = parser.read_u8("ErrorCode")?;
                let handle = parser.read_u16("Handle")?;
                let address = parser.read_bytes("BD_ADDR", 6)?;
                parser.read_u8("LinkType")?;
                parser.read_u8("Encryption")?;

                if status == 0 {
                    let mut bd_addr = [0u8; 6];
                    bd_addr.copy_from_slice(address);
                    match self.connections.iter_mut().find(|c| c.wants_connection()) {
                        Some(slot) => {
                            slot.register_connection(handle, bd_addr);
                            info!("ACL link up, handle {:#06x}", handle);
                        }
                        None => error!("Connection {:#06x} completed with no slot waiting", handle),
                    }
                } else {
                    warn!("Connection attempt failed with status {:#x}", status);
                }
                self.set_state(HciState::Ready);
            }

            HCI_EVENT_DISCONNECTION_COMPLETE => {
                let status = parser.read_u8("ErrorCode")?;
                let handle = parser.read_u16("Handle")?;
                let reason = parser.read_u8("Reason")?;
                if status == 0 {
                    match self.find_by_handle(handle) {
                        Some(connection) => {
                            connection.register_disconnection();
                            info!("ACL link {:#06x} down (reason {:#x})", handle, reason);
                        }
                        None => warn!("Disconnection of unknown handle {:#06x}", handle),
                    }
                }
            }

            HCI_EVENT_QOS_SETUP_COMPLETE => {
                parser.read_u8("Status")?;
                parser.read_u16("Handle")?;
                parser.read_u8("Flags")?;
                parser.read_u8("Service_Type")?;
                parser.read_u32("Token_Rate")?;
                parser.read_u32("Peak_Bandwidth")?;
                parser.read_u32("Latency")?;
                parser.read_u32("Delay_Variation")?;
            }

            HCI_EVENT_COMMAND_COMPLETE => {
                parser.read_u8("NumPackets")?;
                let opcode = parser.read_u16("CommandOpCode")?;
                parser.dump_remaining("Return");
                debug!("Command {:#06x} complete", opcode);
            }

            HCI_EVENT_COMMAND_STATUS => {
                let status = parser.read_u8("Status")?;
                parser.read_u8("NumPackets")?;
                let opcode = parser.read_u16("CommandOpCode")?;
                if status != 0 {
                    warn!("Command {:#06x} returned status {:#x}", opcode, status);
                }
            }

            HCI_EVENT_NUM_COMPLETED_PACKETS => {
                let handles = parser.read_u8("NumHandles")?;
                for _ in 0..handles {
                    parser.read_u16("Handle")?;
                    parser.read_u16("NumPackets")?;
                }
            }

            HCI_EVENT_DATA_BUFFER_OVERFLOW => {
                let link_type = parser.read_u8("LinkType")?;
                error!("Controller data buffer overflowed (link type {})", link_type);
            }

            other => {
                error!("Unknown HCI event {:#x}", other);
                parser.dump_remaining("UnknownEvent");
            }
        }
        Ok(())
    }
}

impl Default for HciController {
    fn default() -> Self {
        Self::new()
    }
}
