//! Key matrix scanning, debouncing and edge detection.
//!
//! The matrix keeps three snapshots: the candidate (last read
//! state), the committed (debounced) state and the state already
//! turned into events. Debouncing is matrix wide: the committed
//! snapshot is replaced as a whole once the candidate has not
//! changed for the debounce interval.

use gojira_common::{
    KeyState, dev_trace,
    time::{Clock, Deadline},
    util::BitMatrix,
};

pub const DEFAULT_DEBOUNCE_MILLIS: u32 = 10;

/// Access to the wires of a key matrix.
pub trait MatrixPins<const ROWS: usize, const COLS: usize> {
    /// Drives `row`, reads every column and releases the row again.
    /// Bit `c` of the result is set when the key at column `c` is
    /// closed.
    fn read_row(&mut self, row: usize) -> u32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub row: u8,
    pub col: u8,
    pub state: KeyState,
}

pub struct MatrixScanner<P, const ROWS: usize, const COLS: usize> {
    pins: P,
    candidate: BitMatrix<ROWS, COLS>,
    committed: BitMatrix<ROWS, COLS>,
    dispatched: BitMatrix<ROWS, COLS>,
    debounce_millis: u32,
    debounce_deadline: Deadline,
    pending: bool,
}

impl<P: MatrixPins<ROWS, COLS>, const ROWS: usize, const COLS: usize> MatrixScanner<P, ROWS, COLS> {
    pub fn new(pins: P, debounce_millis: u32) -> Self {
        Self {
            pins,
            candidate: BitMatrix::new(),
            committed: BitMatrix::new(),
            dispatched: BitMatrix::new(),
            debounce_millis,
            debounce_deadline: Deadline::default(),
            pending: false,
        }
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    pub fn committed(&self) -> &BitMatrix<ROWS, COLS> {
        &self.committed
    }

    pub fn get_key_state(&self, row: usize, col: usize) -> KeyState {
        KeyState::from_bool(self.committed.get_value(row, col))
    }

    /// Reads the whole matrix once. Returns true if the committed
    /// snapshot changed.
    pub fn scan<C: Clock>(&mut self, clock: &C) -> bool {
        for row in 0..ROWS {
            let read = self.pins.read_row(row) & BitMatrix::<ROWS, COLS>::COL_MASK;
            if read != self.candidate.row(row) {
                self.candidate.set_row(row, read);
                self.debounce_deadline = clock.deadline(self.debounce_millis);
                self.pending = true;
            }
        }

        if self.pending && clock.passed(self.debounce_deadline) {
            dev_trace!("Matrix settled at {} ms", clock.now_millis());
            self.committed = self.candidate;
            self.pending = false;
            return true;
        }

        false
    }

    /// Returns the next change not yet handed out, in row then column
    /// order, and marks it as consumed.
    pub fn next_edge(&mut self) -> Option<Edge> {
        let (row, col) = self.committed.first_difference(&self.dispatched)?;
        self.dispatched.toggle(row, col);
        Some(Edge {
            row: row as u8,
            col: col as u8,
            state: KeyState::from_bool(self.committed.get_value(row, col)),
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::Cell;
    use std::vec::Vec;

    use super::*;

    struct TestClock(Cell<u32>);

    impl Clock for TestClock {
        fn now_millis(&self) -> u32 {
            self.0.get()
        }
    }

    impl TestClock {
        fn advance(&self, ms: u32) {
            self.0.set(self.0.get() + ms);
        }
    }

    struct FakePins {
        rows: [u32; 3],
        reads: usize,
    }

    impl MatrixPins<3, 4> for FakePins {
        fn read_row(&mut self, row: usize) -> u32 {
            self.reads += 1;
            self.rows[row]
        }
    }

    fn scanner() -> MatrixScanner<FakePins, 3, 4> {
        MatrixScanner::new(FakePins { rows: [0; 3], reads: 0 }, DEFAULT_DEBOUNCE_MILLIS)
    }

    fn collect(matrix: &mut MatrixScanner<FakePins, 3, 4>, clock: &TestClock) -> Vec<Edge> {
        matrix.scan(clock);
        core::iter::from_fn(|| matrix.next_edge()).collect()
    }

    #[test]
    fn test_transient_never_commits() {
        let clock = TestClock(Cell::new(0));
        let mut matrix = scanner();

        for _ in 0..5 {
            matrix.pins_mut().rows[1] = 0b10;
            assert!(collect(&mut matrix, &clock).is_empty());
            clock.advance(4);
            matrix.pins_mut().rows[1] = 0;
            assert!(collect(&mut matrix, &clock).is_empty());
            clock.advance(4);
        }

        // Back to the committed state: nothing to report even after
        // it settles.
        clock.advance(DEFAULT_DEBOUNCE_MILLIS);
        assert!(collect(&mut matrix, &clock).is_empty());
        assert!(matrix.committed().is_empty());
    }

    #[test]
    fn test_stable_change_commits_once() {
        let clock = TestClock(Cell::new(0));
        let mut matrix = scanner();

        matrix.pins_mut().rows[2] = 0b1000;
        matrix.pins_mut().rows[0] = 0b0001;
        assert!(collect(&mut matrix, &clock).is_empty());

        clock.advance(DEFAULT_DEBOUNCE_MILLIS - 1);
        assert!(collect(&mut matrix, &clock).is_empty());

        clock.advance(1);
        let edges = collect(&mut matrix, &clock);
        assert_eq!(
            edges,
            [
                Edge { row: 0, col: 0, state: KeyState::Pressed },
                Edge { row: 2, col: 3, state: KeyState::Pressed },
            ]
        );

        clock.advance(100);
        assert!(collect(&mut matrix, &clock).is_empty());
        assert_eq!(matrix.get_key_state(2, 3), KeyState::Pressed);
    }

    #[test]
    fn test_change_resets_shared_interval() {
        let clock = TestClock(Cell::new(0));
        let mut matrix = scanner();

        matrix.pins_mut().rows[0] = 0b1;
        collect(&mut matrix, &clock);
        clock.advance(8);
        // Another key on a different row restarts the interval for
        // the whole matrix.
        matrix.pins_mut().rows[1] = 0b1;
        assert!(collect(&mut matrix, &clock).is_empty());
        clock.advance(8);
        assert!(collect(&mut matrix, &clock).is_empty());
        clock.advance(2);
        assert_eq!(collect(&mut matrix, &clock).len(), 2);
    }

    #[test]
    fn test_release_edge() {
        let clock = TestClock(Cell::new(0));
        let mut matrix = scanner();

        matrix.pins_mut().rows[1] = 0b100;
        collect(&mut matrix, &clock);
        clock.advance(DEFAULT_DEBOUNCE_MILLIS);
        assert_eq!(collect(&mut matrix, &clock).len(), 1);

        matrix.pins_mut().rows[1] = 0;
        collect(&mut matrix, &clock);
        clock.advance(DEFAULT_DEBOUNCE_MILLIS);
        assert_eq!(
            collect(&mut matrix, &clock),
            [Edge { row: 1, col: 2, state: KeyState::Released }]
        );
    }

    #[test]
    fn test_columns_beyond_matrix_ignored() {
        let clock = TestClock(Cell::new(0));
        let mut matrix = scanner();

        matrix.pins_mut().rows[0] = 0b1_0000;
        collect(&mut matrix, &clock);
        clock.advance(DEFAULT_DEBOUNCE_MILLIS);
        assert!(collect(&mut matrix, &clock).is_empty());
        assert_eq!(matrix.pins_mut().reads, 6);
    }
}
