//! Byte queues behind the command channel.

use gojira_common::dev_warn;
use ringbuffer::{ConstGenericRingBuffer, RingBuffer};

use crate::hid::{Endpoint, Link, TransportError};

pub const SERIAL_RX_CAPACITY: usize = 256;
pub const SERIAL_TX_CAPACITY: usize = 2048;

// Full speed bulk endpoints move at most 64 bytes per transaction.
const SERIAL_PACKET_LEN: usize = 64;

fn is_eol(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

pub struct SerialPort {
    rx: ConstGenericRingBuffer<u8, SERIAL_RX_CAPACITY>,
    tx: ConstGenericRingBuffer<u8, SERIAL_TX_CAPACITY>,
    echo: bool,
    // Set while the rest of an overlong line is being thrown away.
    discarding: bool,
}

impl Default for SerialPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort {
    pub fn new() -> Self {
        Self {
            rx: ConstGenericRingBuffer::new(),
            tx: ConstGenericRingBuffer::new(),
            echo: true,
            discarding: false,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Queues received bytes, echoing them back. Returns whether a
    /// line terminator was among them. A line that does not fit in the
    /// input queue is dropped as a whole, up to and including its
    /// terminator, so the next line is read normally.
    pub fn receive(&mut self, bytes: &[u8]) -> bool {
        let mut eol = false;
        for &b in bytes {
            if self.echo {
                if b == b'\r' {
                    self.write_bytes(b"\r\n");
                } else {
                    self.write_bytes(&[b]);
                }
            }

            if self.discarding {
                if is_eol(b) {
                    self.discarding = false;
                    eol = true;
                }
                continue;
            }

            if self.rx.is_full() {
                dev_warn!("Serial input line too long, discarding it");
                self.drop_partial_line();
                if is_eol(b) {
                    eol = true;
                } else {
                    self.discarding = true;
                }
                continue;
            }

            self.rx.push(b);
            eol |= is_eol(b);
        }
        eol
    }

    /// Removes the queued bytes after the last line terminator.
    fn drop_partial_line(&mut self) {
        let complete = self
            .rx
            .iter()
            .enumerate()
            .filter(|(_, b)| is_eol(**b))
            .last()
            .map_or(0, |(i, _)| i + 1);

        let mut kept = ConstGenericRingBuffer::new();
        for &b in self.rx.iter().take(complete) {
            kept.push(b);
        }
        self.rx = kept;
    }

    /// Pops the next complete line into `line`, without its
    /// terminator. Returns `false`, leaving the input untouched, when
    /// no complete line is queued. A line longer than `line` is
    /// truncated.
    pub fn read_line<const N: usize>(&mut self, line: &mut heapless::Vec<u8, N>) -> bool {
        if !self.rx.iter().any(|b| is_eol(*b)) {
            return false;
        }

        line.clear();
        while let Some(b) = self.rx.dequeue() {
            if is_eol(b) {
                break;
            }
            // Ignoring the error truncates overlong lines.
            let _ = line.push(b);
        }
        true
    }

    pub fn pending_input(&self) -> usize {
        self.rx.len()
    }

    /// Queues as much of `bytes` as fits, returning how many were
    /// queued. Queued output is never overwritten.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        for &b in bytes {
            if self.tx.is_full() {
                break;
            }
            self.tx.push(b);
            written += 1;
        }
        written
    }

    pub fn pending_output(&self) -> usize {
        self.tx.len()
    }

    /// Bytes that can still be queued for output.
    pub fn output_room(&self) -> usize {
        SERIAL_TX_CAPACITY - self.tx.len()
    }

    /// Moves queued output into `buf`, returning the number of bytes
    /// moved.
    pub fn drain_output(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.tx.dequeue() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Hands the next chunk of output to the link if the serial
    /// endpoint is idle. Only the bytes the link accepted are removed.
    pub fn flush<L: Link + ?Sized>(&mut self, link: &mut L) {
        if self.tx.is_empty() || !link.is_idle(Endpoint::Serial) {
            return;
        }

        let mut packet = [0u8; SERIAL_PACKET_LEN];
        let mut len = 0;
        for (dst, b) in packet.iter_mut().zip(self.tx.iter()) {
            *dst = *b;
            len += 1;
        }

        match link.write(Endpoint::Serial, &packet[..len]) {
            Ok(accepted) => {
                for _ in 0..accepted.min(len) {
                    let _ = self.tx.dequeue();
                }
            }
            Err(TransportError::WouldBlock) => {}
            Err(_) => {
                // Nobody is listening, so there is no point in keeping
                // the output around.
                self.tx.clear();
            }
        }
    }
}

impl core::fmt::Write for SerialPort {
    /// Newlines are sent as `\r\n`. Output that does not fit is
    /// silently dropped.
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for part in s.split_inclusive('\n') {
            match part.strip_suffix('\n') {
                Some(text) => {
                    self.write_bytes(text.as_bytes());
                    self.write_bytes(b"\r\n");
                }
                None => {
                    self.write_bytes(part.as_bytes());
                }
            }
        }
        Ok(())
    }
}
