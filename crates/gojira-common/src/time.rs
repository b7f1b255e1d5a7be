//! Millisecond time keeping. Counters are 32 bits wide and expected
//! to wrap around, so every comparison is done on the wrapped
//! difference instead of on the raw values.

/// A point in time, in milliseconds, at which something is due.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    millis: u32,
}

impl Deadline {
    pub const fn at(millis: u32) -> Self {
        Deadline { millis }
    }

    pub const fn millis(self) -> u32 {
        self.millis
    }

    /// Whether `now` is at or after this deadline. Valid as long as
    /// both points are less than ~24 days apart.
    pub const fn passed_at(self, now: u32) -> bool {
        (now.wrapping_sub(self.millis) as i32) >= 0
    }
}

/// A monotonic millisecond counter.
pub trait Clock {
    fn now_millis(&self) -> u32;

    /// Returns a deadline `ms` milliseconds from now.
    fn deadline(&self, ms: u32) -> Deadline {
        Deadline::at(self.now_millis().wrapping_add(ms))
    }

    fn passed(&self, deadline: Deadline) -> bool {
        deadline.passed_at(self.now_millis())
    }

    fn elapsed_since(&self, start: u32) -> u32 {
        self.now_millis().wrapping_sub(start)
    }
}

impl<C: Clock> Clock for &C {
    fn now_millis(&self) -> u32 {
        (*self).now_millis()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    struct ManualClock(Cell<u32>);

    impl Clock for ManualClock {
        fn now_millis(&self) -> u32 {
            self.0.get()
        }
    }

    #[test]
    fn test_deadline_not_passed_before_due() {
        let clock = ManualClock(Cell::new(100));
        let deadline = clock.deadline(10);
        assert!(!clock.passed(deadline));
        clock.0.set(109);
        assert!(!clock.passed(deadline));
        clock.0.set(110);
        assert!(clock.passed(deadline));
    }

    #[test]
    fn test_deadline_across_wrap_around() {
        let clock = ManualClock(Cell::new(u32::MAX - 4));
        let deadline = clock.deadline(10);
        assert_eq!(deadline.millis(), 5);
        assert!(!clock.passed(deadline));
        clock.0.set(2);
        assert!(!clock.passed(deadline));
        clock.0.set(5);
        assert!(clock.passed(deadline));
        assert_eq!(clock.elapsed_since(u32::MAX - 4), 10);
    }

    #[test]
    fn test_clock_through_reference() {
        let clock = ManualClock(Cell::new(7));
        let by_ref = &clock;
        assert_eq!(by_ref.now_millis(), 7);
        assert!(by_ref.passed(Deadline::at(7)));
    }
}
