#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};
use gojira_common::time::Clock;
use gojira_core::hid::{Endpoint, Link, TransportError};
use gojira_core::keyboard::Keyboard;
use gojira_core::keymap::KeymapTable;
use gojira_core::matrix::{MatrixPins, MatrixScanner};
use gojira_core::storage::ConfigStore;

pub const LAYERS: usize = 5;
pub const ROWS: usize = 5;
pub const COLS: usize = 5;
pub const DEBOUNCE_MILLIS: u32 = 10;

pub const FLASH_PAGE: usize = 256;
pub const CONFIG_LEN: usize = 8 * FLASH_PAGE;

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder().filter_level(log::LevelFilter::Debug).is_test(true).try_init();
}

#[derive(Clone, Default)]
pub struct TestClock(Rc<Cell<u32>>);

impl TestClock {
    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.0.set(ms);
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> u32 {
        self.0.get()
    }
}

/// Switch state shared between the test and the keyboard.
#[derive(Clone, Default)]
pub struct TestPins(Rc<RefCell<[u32; ROWS]>>);

impl TestPins {
    pub fn set(&self, row: usize, col: usize, closed: bool) {
        let mut rows = self.0.borrow_mut();
        if closed {
            rows[row] |= 1 << col;
        } else {
            rows[row] &= !(1 << col);
        }
    }
}

impl MatrixPins<ROWS, COLS> for TestPins {
    fn read_row(&mut self, row: usize) -> u32 {
        self.0.borrow()[row]
    }
}

#[derive(Debug)]
pub struct RamFlashError;

impl NorFlashError for RamFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

pub struct RamFlash {
    pub mem: Vec<u8>,
}

impl RamFlash {
    pub fn new() -> Self {
        Self { mem: vec![0xff; CONFIG_LEN] }
    }
}

impl ErrorType for RamFlash {
    type Error = RamFlashError;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        bytes.copy_from_slice(self.mem.get(start..start + bytes.len()).ok_or(RamFlashError)?);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = FLASH_PAGE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.mem.get_mut(from as usize..to as usize).ok_or(RamFlashError)?.fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        self.mem.get_mut(start..start + bytes.len()).ok_or(RamFlashError)?.copy_from_slice(bytes);
        Ok(())
    }
}

/// Records every write. Endpoints can be marked busy to emulate a
/// host that has not picked up the previous report yet.
pub struct RecordingLink {
    pub active: bool,
    pub busy: Vec<Endpoint>,
    pub writes: Vec<(Endpoint, Vec<u8>)>,
    pub rx: VecDeque<Vec<u8>>,
    /// Time that passes on every poll.
    pub poll_clock: Option<(TestClock, u32)>,
    /// Polls after which the link becomes active.
    pub activate_after: Option<usize>,
    polls: usize,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self {
            active: true,
            busy: Vec::new(),
            writes: Vec::new(),
            rx: VecDeque::new(),
            poll_clock: None,
            activate_after: None,
            polls: 0,
        }
    }

    pub fn send_line(&mut self, line: &str) {
        self.rx.push_back(line.as_bytes().to_vec());
    }

    pub fn writes_to(&self, endpoint: Endpoint) -> Vec<Vec<u8>> {
        self.writes.iter().filter(|(ep, _)| *ep == endpoint).map(|(_, bytes)| bytes.clone()).collect()
    }

    pub fn last_write_to(&self, endpoint: Endpoint) -> Option<Vec<u8>> {
        self.writes_to(endpoint).pop()
    }

    pub fn serial_output(&self) -> String {
        String::from_utf8(self.writes_to(Endpoint::Serial).concat()).unwrap()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl Link for RecordingLink {
    fn poll(&mut self, on_serial_rx: &mut dyn FnMut(&[u8])) {
        self.polls += 1;
        if let Some((clock, ms)) = &self.poll_clock {
            clock.advance(*ms);
        }
        if self.activate_after.is_some_and(|n| self.polls >= n) {
            self.active = true;
        }
        while let Some(bytes) = self.rx.pop_front() {
            on_serial_rx(&bytes);
        }
    }

    fn is_active(&self, _endpoint: Endpoint) -> bool {
        self.active
    }

    fn is_idle(&self, endpoint: Endpoint) -> bool {
        self.active && !self.busy.contains(&endpoint)
    }

    fn write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.active {
            return Err(TransportError::NotConfigured);
        }
        if self.busy.contains(&endpoint) {
            return Err(TransportError::WouldBlock);
        }
        self.writes.push((endpoint, bytes.to_vec()));
        Ok(bytes.len())
    }
}

pub type TestKeyboard = Keyboard<TestClock, TestPins, RamFlash, CONFIG_LEN, LAYERS, ROWS, COLS>;

pub struct Harness {
    pub keyboard: TestKeyboard,
    pub clock: TestClock,
    pub pins: TestPins,
    pub link: RecordingLink,
}

impl Harness {
    pub fn new(keymap: KeymapTable<LAYERS, ROWS, COLS>) -> Self {
        let clock = TestClock::default();
        // Start away from zero so deadlines computed at boot are
        // already in the past.
        clock.set(1000);
        let pins = TestPins::default();
        let matrix = MatrixScanner::new(pins.clone(), DEBOUNCE_MILLIS);
        let store = ConfigStore::new(RamFlash::new(), 0);
        let keyboard = Keyboard::new(clock.clone(), matrix, keymap, store);
        Self { keyboard, clock, pins, link: RecordingLink::new() }
    }

    pub fn poll(&mut self) {
        self.keyboard.poll(&mut self.link);
    }

    /// Changes a switch and polls until the change is debounced and
    /// dispatched.
    pub fn set_key(&mut self, row: usize, col: usize, closed: bool) {
        self.pins.set(row, col, closed);
        self.poll();
        self.clock.advance(DEBOUNCE_MILLIS);
        self.poll();
    }

    pub fn press(&mut self, row: usize, col: usize) {
        self.set_key(row, col, true);
    }

    pub fn release(&mut self, row: usize, col: usize) {
        self.set_key(row, col, false);
    }

    /// Sends a command line and polls until its output is flushed.
    pub fn command(&mut self, line: &str) -> String {
        self.link.clear();
        self.link.send_line(line);
        for _ in 0..64 {
            self.poll();
        }
        self.link.serial_output()
    }
}
