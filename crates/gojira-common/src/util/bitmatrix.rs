/// A matrix of bits stored as one `u32` mask per row, where bit `c`
/// of a row holds the state of column `c`. Supports up to 32 columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMatrix<const ROWS: usize, const COLS: usize> {
    rows: [u32; ROWS],
}

impl<const ROWS: usize, const COLS: usize> Default for BitMatrix<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> BitMatrix<ROWS, COLS> {
    /// Mask covering every valid column of a row.
    pub const COL_MASK: u32 = {
        assert!(COLS > 0 && COLS <= 32, "BitMatrix supports between 1 and 32 columns");
        if COLS == 32 { u32::MAX } else { (1u32 << COLS) - 1 }
    };

    pub const fn new() -> Self {
        Self { rows: [0; ROWS] }
    }

    pub fn get_value(&self, row: usize, col: usize) -> bool {
        assert!(row < ROWS, "Row out of bounds");
        assert!(col < COLS, "Col out of bounds");

        self.rows[row] & (1 << col) != 0
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: bool) {
        assert!(row < ROWS, "Row out of bounds");
        assert!(col < COLS, "Col out of bounds");

        if value {
            self.rows[row] |= 1 << col;
        } else {
            self.rows[row] &= !(1 << col);
        }
    }

    pub fn toggle(&mut self, row: usize, col: usize) {
        assert!(row < ROWS, "Row out of bounds");
        assert!(col < COLS, "Col out of bounds");

        self.rows[row] ^= 1 << col;
    }

    #[inline]
    pub fn row(&self, row: usize) -> u32 {
        self.rows[row]
    }

    /// Replaces a whole row. Bits beyond `COLS` are discarded.
    #[inline]
    pub fn set_row(&mut self, row: usize, value: u32) {
        self.rows[row] = value & Self::COL_MASK;
    }

    /// Returns the position of the first bit that differs between
    /// `self` and `other`, scanning rows and then columns in
    /// ascending order.
    pub fn first_difference(&self, other: &Self) -> Option<(usize, usize)> {
        self.rows
            .iter()
            .zip(other.rows.iter())
            .enumerate()
            .find_map(|(row, (a, b))| {
                let diff = a ^ b;
                (diff != 0).then(|| (row, diff.trailing_zeros() as usize))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| *r == 0)
    }
}
