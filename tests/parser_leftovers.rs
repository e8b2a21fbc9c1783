//! Unread bytes left in a parser are reported as a warning

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use wiigun_rs::bluetooth::MessageParser;

/// Keeps every record so the test can look at levels and text
struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

fn leftover_warnings() -> Vec<String> {
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, text)| *level == Level::Warn && text.starts_with("Message parser left with"))
        .map(|(_, text)| text.clone())
        .collect()
}

#[test]
fn unread_bytes_warn_on_drop() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let data = [0x04, 0x0E, 0xAA, 0xBB];
    {
        let mut parser = MessageParser::new(&data);
        assert_eq!(parser.read_u8("H4"), Ok(0x04));
        assert_eq!(parser.read_u8("Event"), Ok(0x0E));
        assert_eq!(parser.remaining(), 2);
    }
    assert_eq!(leftover_warnings(), vec!["Message parser left with 2 bytes: [aa, bb]".to_string()]);

    // A fully read packet says nothing
    {
        let mut parser = MessageParser::new(&data);
        parser.read_bytes("All", 4).unwrap();
    }
    assert_eq!(leftover_warnings().len(), 1);
}
