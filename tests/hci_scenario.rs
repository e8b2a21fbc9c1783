//! HCI bring-up against a scripted controller

use wiigun_rs::backend::MockRadio;
use wiigun_rs::bluetooth::constants::*;
use wiigun_rs::bluetooth::{HciController, HciState, HciTransport};

const WIIMOTE_ADDRESS: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

fn opcode(packet: &[u8]) -> u16 {
    u16::from_le_bytes([packet[1], packet[2]])
}

#[test]
fn inquiry_then_connection_brings_the_link_up() {
    let _ = env_logger::builder().is_test(true).try_init();

    let radio = MockRadio::new();
    let script = radio.clone();
    let mut transport = HciTransport::new(radio);
    let mut hci = HciController::new();
    let id = hci.allocate_connection().unwrap();

    // Reset and event filter
    hci.tick(&mut transport);
    let sent = script.take_sent();
    assert_eq!(sent.iter().map(|p| opcode(p)).collect::<Vec<_>>(), vec![HCI_RESET, HCI_SET_EVENT_FILTER]);
    assert!(sent.iter().all(|p| p[0] == H4_TYPE_COMMAND));

    // A slot wants a link, so an inquiry goes out
    hci.tick(&mut transport);
    let sent = script.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(opcode(&sent[0]), HCI_INQUIRY);
    assert_eq!(hci.state(), HciState::Inquiring);

    // Controller chatter is harmless
    script.inject(&[H4_TYPE_EVENT, HCI_EVENT_COMMAND_STATUS, 4, 0x00, 0x01, 0x01, 0x04]);

    let mut result = vec![H4_TYPE_EVENT, HCI_EVENT_INQUIRY_RESULT, 15, 1];
    result.extend_from_slice(&WIIMOTE_ADDRESS);
    result.extend_from_slice(&[0x01, 0x00, 0x00, 0x04, 0x25, 0x00, 0x00, 0x00]);
    script.inject(&result);
    hci.tick(&mut transport);
    let sent = script.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(opcode(&sent[0]), HCI_CREATE_CONNECTION);
    assert_eq!(&sent[0][4..10], &WIIMOTE_ADDRESS);
    assert_eq!(hci.state(), HciState::Connecting);

    let mut complete = vec![H4_TYPE_EVENT, HCI_EVENT_CONNECTION_COMPLETE, 11, 0x00, 0x42, 0x00];
    complete.extend_from_slice(&WIIMOTE_ADDRESS);
    complete.extend_from_slice(&[0x01, 0x00]);
    script.inject(&complete);
    hci.tick(&mut transport);

    assert!(hci.is_connected(id));
    assert_eq!(hci.connection(id).handle(), 0x0042);
    assert_eq!(hci.connection(id).address(), WIIMOTE_ADDRESS);
    assert_eq!(hci.state(), HciState::Ready);
    // Nobody else is waiting, so no further inquiry
    assert!(script.take_sent().is_empty());
}

#[test]
fn remote_disconnect_drops_the_link() {
    let radio = MockRadio::new();
    let script = radio.clone();
    let mut transport = HciTransport::new(radio);
    let mut hci = HciController::new();
    let id = hci.allocate_connection().unwrap();
    hci.tick(&mut transport);
    hci.tick(&mut transport);

    let mut result = vec![H4_TYPE_EVENT, HCI_EVENT_INQUIRY_RESULT, 15, 1];
    result.extend_from_slice(&WIIMOTE_ADDRESS);
    result.extend_from_slice(&[0x01, 0x00, 0x00, 0x04, 0x25, 0x00, 0x00, 0x00]);
    script.inject(&result);
    let mut complete = vec![H4_TYPE_EVENT, HCI_EVENT_CONNECTION_COMPLETE, 11, 0x00, 0x42, 0x00];
    complete.extend_from_slice(&WIIMOTE_ADDRESS);
    complete.extend_from_slice(&[0x01, 0x00]);
    script.inject(&complete);
    hci.tick(&mut transport);
    assert!(hci.is_connected(id));

    script.inject(&[H4_TYPE_EVENT, HCI_EVENT_DISCONNECTION_COMPLETE, 4, 0x00, 0x42, 0x00, 0x13]);
    hci.tick(&mut transport);
    assert!(!hci.is_connected(id));
}
