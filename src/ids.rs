//! Time-derived identifiers.
//!
//! Sessions and messages are keyed by the Unix-millisecond time at which they
//! were created, rendered as a decimal string. Two ids requested within the
//! same millisecond would collide, so the clock never hands out a value that is
//! not strictly greater than the last one.

use crate::utils::time::now_millis;

/// Issues strictly increasing, time-derived ids.
#[derive(Debug, Default, Clone)]
pub struct IdClock {
    last: i64,
}

impl IdClock {
    /// Creates a clock that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock that will only issue ids greater than `floor`.
    ///
    /// Used after loading persisted sessions so fresh ids cannot collide with
    /// stored ones even if the system clock went backwards.
    pub fn starting_after(floor: i64) -> Self {
        Self { last: floor }
    }

    /// Issues the next id for the current time.
    pub fn next_id(&mut self) -> String {
        self.next_at(now_millis()).to_string()
    }

    /// Issues the next id for the given time in Unix milliseconds.
    pub fn next_at(&mut self, now: i64) -> i64 {
        let id = if now > self.last { now } else { self.last + 1 };
        self.last = id;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_millisecond_is_bumped() {
        let mut clock = IdClock::new();
        assert_eq!(clock.next_at(100), 100);
        assert_eq!(clock.next_at(100), 101);
        assert_eq!(clock.next_at(100), 102);
        assert_eq!(clock.next_at(500), 500);
    }

    #[test]
    fn clock_going_backwards_still_increases() {
        let mut clock = IdClock::starting_after(1_000);
        assert_eq!(clock.next_at(10), 1_001);
    }

    #[test]
    fn live_ids_are_distinct() {
        let mut clock = IdClock::new();
        let ids: Vec<i64> = (0..50)
            .map(|_| clock.next_id().parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
