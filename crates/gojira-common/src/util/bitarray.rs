use zerocopy::{FromBytes, Immutable, IntoBytes};

/// A fixed array of `8 * BYTES` bits, laid out least significant bit
/// first inside each byte. The raw bytes can be handed out as-is,
/// which makes it suitable as a bitmap field of a report.
#[repr(transparent)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, Debug, PartialEq, Eq)]
pub struct BitArray<const BYTES: usize> {
    buf: [u8; BYTES],
}

impl<const BYTES: usize> Default for BitArray<BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BYTES: usize> BitArray<BYTES> {
    pub const BITS: usize = BYTES * 8;

    pub const fn new() -> Self {
        Self { buf: [0; BYTES] }
    }

    fn assert_within_bounds(index: usize) {
        assert!(index < Self::BITS, "Index out of bounds: {}", index);
    }

    /// Sets the value of a bit to 1. [`true`] will be returned if the
    /// value actually changed.
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        Self::assert_within_bounds(index);
        let value = &mut self.buf[index / 8];
        let copy = *value;
        *value |= 1 << (index % 8);
        copy != *value
    }

    /// Sets the value of a bit to 0. [`true`] will be returned if the
    /// value actually changed.
    #[inline]
    pub fn clear(&mut self, index: usize) -> bool {
        Self::assert_within_bounds(index);
        let value = &mut self.buf[index / 8];
        let copy = *value;
        *value &= !(1 << (index % 8));
        copy != *value
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        Self::assert_within_bounds(index);
        (self.buf[index / 8] & (1 << (index % 8))) != 0
    }

    pub fn clear_all(&mut self) {
        self.buf = [0; BYTES];
    }

    pub fn bytes(&self) -> &[u8; BYTES] {
        &self.buf
    }
}
