//! Report layouts and the contract with the USB link layer.
//!
//! The link owns the actual endpoints. The core only asks whether an
//! endpoint is idle (its previous write has been picked up by the
//! host) and hands it the raw bytes of a report.

use core::fmt::Display;

use gojira_common::util::BitArray;
use zerocopy::{Immutable, IntoBytes};

use crate::keycode::KEY_A;

/// Every interface the device exposes that the core writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Keyboard,
    Mouse,
    ExtraKey,
    Nkro,
    Serial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint still has a write in flight.
    WouldBlock,
    /// The host has not configured the interface.
    NotConfigured,
    Other,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::WouldBlock => f.write_str("endpoint busy"),
            TransportError::NotConfigured => f.write_str("interface not configured"),
            TransportError::Other => f.write_str("transport error"),
        }
    }
}

/// The link layer as seen by the poll loop.
pub trait Link {
    /// Services the link. Bytes received on the command channel are
    /// handed to `on_serial_rx`, possibly in several chunks.
    fn poll(&mut self, on_serial_rx: &mut dyn FnMut(&[u8]));

    /// Whether the host has configured the interface behind
    /// `endpoint`.
    fn is_active(&self, endpoint: Endpoint) -> bool;

    /// Whether the last write on `endpoint` has completed.
    fn is_idle(&self, endpoint: Endpoint) -> bool;

    /// Starts a write on `endpoint`, returning how many bytes were
    /// accepted.
    fn write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize, TransportError>;
}

/// Boot protocol keyboard report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub reserved: u8,
    pub keys: [u8; KeyboardReport::SLOTS],
}

impl KeyboardReport {
    pub const SLOTS: usize = 6;
}

pub const NKRO_BITMAP_BYTES: usize = 28;

/// N-key rollover report: one bit per usage, starting at `KEY_A`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct NkroReport {
    pub modifiers: u8,
    pub keys: BitArray<NKRO_BITMAP_BYTES>,
}

impl NkroReport {
    pub const FIRST_KEY: u8 = KEY_A;
    pub const KEY_COUNT: usize = NKRO_BITMAP_BYTES * 8;

    /// Bit index of `code`, if the bitmap covers it.
    pub fn bit_of(code: u8) -> Option<usize> {
        let bit = code.checked_sub(Self::FIRST_KEY)? as usize;
        (bit < Self::KEY_COUNT).then_some(bit)
    }
}

/// Relative mouse report: buttons, x, y, vertical wheel, horizontal
/// pan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
    pub pan: i8,
}

pub const REPORT_ID_SYSTEM: u8 = 1;
pub const REPORT_ID_CONSUMER: u8 = 2;

/// System or consumer control report. The report id selects which
/// collection `code` belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct ExtraKeyReport {
    pub report_id: u8,
    pub code: [u8; 2],
}

impl ExtraKeyReport {
    pub fn new(report_id: u8, code: u16) -> Self {
        Self { report_id, code: code.to_le_bytes() }
    }

    pub fn code(&self) -> u16 {
        u16::from_le_bytes(self.code)
    }
}

const _: () = assert!(size_of::<KeyboardReport>() == 8);
const _: () = assert!(size_of::<NkroReport>() == 29);
const _: () = assert!(size_of::<MouseReport>() == 5);
const _: () = assert!(size_of::<ExtraKeyReport>() == 3);
