//! Full Wiimote bring-up against the simulated device

use wiigun_rs::backend::SimWiimote;
use wiigun_rs::wiimote::constants::*;
use wiigun_rs::wiimote::{Button, SessionState, WiimoteId, WiimoteManager};

fn connect(sim: &SimWiimote) -> (WiimoteManager<SimWiimote>, WiimoteId) {
    let mut wiimotes = WiimoteManager::new(sim.clone());
    let id = wiimotes.create_wiimote().unwrap();
    for _ in 0..200 {
        wiimotes.tick();
        if wiimotes.is_connected(id) {
            break;
        }
    }
    (wiimotes, id)
}

#[test]
fn session_configures_the_camera_and_streams() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sim = SimWiimote::new();
    let (mut wiimotes, id) = connect(&sim);

    assert!(wiimotes.is_connected(id));
    assert!(wiimotes.any_connected());
    assert_eq!(wiimotes.state(id), Some(SessionState::Open));
    assert!(sim.is_connected());
    assert_eq!(sim.open_channels(), 2);

    // Player 1 LED and the extended IR setup
    assert_eq!(sim.leds(), 0b0001);
    assert_eq!(sim.register(REG_CAMERA_ENABLE), Some(CAMERA_ENABLE));
    assert_eq!(sim.register(REG_SENSITIVITY_1 + 8), Some(SENSITIVITY_BLOCK_1[8]));
    assert_eq!(sim.register(REG_SENSITIVITY_2 + 1), Some(SENSITIVITY_BLOCK_2[1]));
    assert_eq!(sim.register(REG_IR_MODE), Some(IR_MODE_EXTENDED));
    assert_eq!(sim.report_mode(), Some(REPORT_CORE_BUTTONS_ACC_IR12));

    sim.set_buttons(Button::A.mask() | Button::Home.mask());
    sim.set_spot(Some((0x234, 0x1C7)));
    assert!(sim.send_report());
    wiimotes.tick();

    let data = *wiimotes.data(id).unwrap();
    assert_eq!(data.frame_number, 1);
    assert!(data.buttons.is_pressed(Button::A));
    assert!(data.buttons.is_pressed(Button::Home));
    assert!(!data.buttons.is_pressed(Button::B));
    assert_eq!((data.ir_spots[0].x, data.ir_spots[0].y), (0x234, 0x1C7));
    assert!(data.ir_spots[0].is_visible());

    sim.set_spot(None);
    assert!(sim.send_report());
    wiimotes.tick();
    let data = wiimotes.data(id).unwrap();
    assert_eq!(data.frame_number, 2);
    assert!(!data.ir_spots[0].is_visible());
}

#[test]
fn player_leds_can_change_while_open() {
    let sim = SimWiimote::new();
    let (mut wiimotes, id) = connect(&sim);
    assert!(wiimotes.is_connected(id));

    wiimotes.set_player_leds(id, 0b1010);
    assert_eq!(sim.leds(), 0b1010);
}

#[test]
fn status_report_while_open_restores_streaming() {
    let sim = SimWiimote::new();
    let (mut wiimotes, id) = connect(&sim);
    assert!(wiimotes.is_connected(id));

    // The Wiimote falls back to core buttons after a status report
    assert!(sim.send_status());
    assert_eq!(sim.report_mode(), None);
    assert!(!sim.send_report());

    wiimotes.tick();
    assert_eq!(sim.report_mode(), Some(REPORT_CORE_BUTTONS_ACC_IR12));
    assert_eq!(wiimotes.state(id), Some(SessionState::Open));
    assert!(wiimotes.is_connected(id));

    assert!(sim.send_report());
    wiimotes.tick();
    assert_eq!(wiimotes.data(id).unwrap().frame_number, 1);
}

#[test]
fn lost_link_is_noticed() {
    let sim = SimWiimote::new();
    let (mut wiimotes, id) = connect(&sim);
    assert!(wiimotes.is_connected(id));

    sim.drop_link();
    wiimotes.tick();
    assert!(!wiimotes.is_connected(id));
    assert!(!wiimotes.any_connected());
}

#[test]
fn hidden_wiimote_is_never_found() {
    let sim = SimWiimote::new();
    sim.set_discoverable(false);
    let (wiimotes, id) = connect(&sim);
    assert!(!wiimotes.is_connected(id));
    assert_eq!(wiimotes.state(id), Some(SessionState::WaitingForAcl));
    assert!(!sim.is_connected());
}
