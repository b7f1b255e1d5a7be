use core::cell::RefCell;
use core::fmt::Write;

use critical_section::Mutex;
use log::{Level, Log, SetLoggerError};
use ringbuffer::{ConstGenericRingBuffer, RingBuffer};

struct WriterRingBuffer<const SIZE: usize> {
    buf: ConstGenericRingBuffer<u8, SIZE>,
}

impl<const SIZE: usize> Write for WriterRingBuffer<SIZE> {
    // When full, the oldest bytes are overwritten. Recent messages
    // are the interesting ones.
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.buf.push(b'\r');
            }
            self.buf.push(b);
        }
        Ok(())
    }
}

/// A logger that keeps formatted records in memory until something
/// drains them, usually into the command channel.
pub struct RingBufferLogger<const SIZE: usize> {
    log_level: Level,
    buf: Mutex<RefCell<WriterRingBuffer<SIZE>>>,
}

impl<const SIZE: usize> RingBufferLogger<SIZE> {
    pub fn new(level: Level) -> Self {
        Self {
            log_level: level,
            buf: Mutex::new(RefCell::new(WriterRingBuffer { buf: ConstGenericRingBuffer::new() })),
        }
    }

    pub fn install(logger: &'static Self) -> Result<(), SetLoggerError> {
        critical_section::with(|_| log::set_logger(logger))?;
        log::set_max_level(logger.log_level.to_level_filter());
        Ok(())
    }

    pub fn pending_bytes(&self) -> usize {
        critical_section::with(|cs| self.buf.borrow(cs).borrow().buf.len())
    }

    /// Moves pending bytes into `buf`, returning how many were moved.
    pub fn read_pending_bytes(&self, buf: &mut [u8]) -> usize {
        critical_section::with(|cs| {
            let mut writer = self.buf.borrow(cs).borrow_mut();
            let mut n = 0;
            while n < buf.len() {
                match writer.buf.dequeue() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        })
    }
}

/// Source of already formatted log output.
pub trait LogDrain: Sync {
    /// Moves pending bytes into `buf`, returning how many were moved.
    fn read_pending_bytes(&self, buf: &mut [u8]) -> usize;
}

impl<const SIZE: usize> LogDrain for RingBufferLogger<SIZE> {
    fn read_pending_bytes(&self, buf: &mut [u8]) -> usize {
        RingBufferLogger::read_pending_bytes(self, buf)
    }
}

impl<const SIZE: usize> Log for RingBufferLogger<SIZE> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        critical_section::with(|cs| {
            // The writer never fails.
            let _ = writeln!(
                self.buf.borrow(cs).borrow_mut(),
                "{:<5} [{}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        });
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_formatted_into_ring() {
        let logger = RingBufferLogger::<64>::new(Level::Info);
        logger.log(
            &log::Record::builder()
                .level(Level::Warn)
                .target("gojira")
                .args(format_args!("flash {}", 3))
                .build(),
        );
        logger.log(&log::Record::builder().level(Level::Debug).args(format_args!("hidden")).build());

        let mut out = [0u8; 64];
        let n = logger.read_pending_bytes(&mut out);
        assert_eq!(&out[..n], b"WARN  [gojira] flash 3\r\n");
        assert_eq!(logger.pending_bytes(), 0);
    }

    #[test]
    fn test_oldest_bytes_overwritten() {
        let logger = RingBufferLogger::<8>::new(Level::Trace);
        logger.log(&log::Record::builder().level(Level::Error).target("t").args(format_args!("x")).build());
        let mut out = [0u8; 8];
        let n = logger.read_pending_bytes(&mut out);
        assert_eq!(n, 8);
        assert_eq!(&out[..n], b" [t] x\r\n");
    }
}
