use core::ops::{Index, IndexMut};

/// An index that is known to be lower than `LENGTH`, so it can be used
/// to access an array of that length without further checks.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedIndex<const LENGTH: usize>(usize);

impl<const LENGTH: usize> BoundedIndex<LENGTH> {
    pub const fn assert_range_ok(value: usize) {
        assert!(value < LENGTH, "Value out of bounds");
    }

    pub const fn from_const<const N: usize>() -> Self {
        const {
            Self::assert_range_ok(N);
        }

        Self(N)
    }

    pub fn from_value(val: usize) -> Option<Self> {
        if val < LENGTH { Some(Self(val)) } else { None }
    }

    /// Builds an index by wrapping `val` around `LENGTH`.
    pub const fn wrapping(val: usize) -> Self {
        const {
            assert!(LENGTH > 0, "Cannot index an empty array");
        }

        Self(val % LENGTH)
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl<A, const LENGTH: usize> Index<BoundedIndex<LENGTH>> for [A; LENGTH] {
    type Output = A;

    fn index(&self, index: BoundedIndex<LENGTH>) -> &Self::Output {
        unsafe {
            // SAFETY: index < array length asserted on construction.
            self.get_unchecked(index.0)
        }
    }
}

impl<A, const LENGTH: usize> IndexMut<BoundedIndex<LENGTH>> for [A; LENGTH] {
    fn index_mut(&mut self, index: BoundedIndex<LENGTH>) -> &mut Self::Output {
        unsafe {
            // SAFETY: index < array length asserted on construction.
            self.get_unchecked_mut(index.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_rejects_length() {
        assert!(BoundedIndex::<5>::from_value(4).is_some());
        assert!(BoundedIndex::<5>::from_value(5).is_none());
    }

    #[test]
    fn test_wrapping_index() {
        let arr = [10, 11, 12, 13, 14];
        assert_eq!(arr[BoundedIndex::<5>::wrapping(7)], 12);
    }
}
