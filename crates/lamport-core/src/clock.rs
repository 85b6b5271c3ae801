//! Lamport logical clock.

use lamport_proto::Timestamp;

/// Per-process logical clock.
///
/// Each [`tick`](Self::tick) or [`observe`](Self::observe) returns a value
/// strictly greater than the previous one, and `observe` also passes the
/// remote timestamp. The protocol only calls them for a local request and a
/// received request; other transitions leave the clock where it is, so the
/// clock never decreases but does not move on every event.
///
/// A clock at `u64::MAX` cannot advance. Both methods then return `None`
/// and leave the value unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalClock {
    value: Timestamp,
}

impl LogicalClock {
    /// Clock at [`Timestamp::ZERO`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `value`.
    pub fn starting_at(value: Timestamp) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn value(&self) -> Timestamp {
        self.value
    }

    /// Advance for a local event. Returns the new value.
    #[must_use]
    pub fn tick(&mut self) -> Option<Timestamp> {
        self.value = self.value.next()?;
        Some(self.value)
    }

    /// Advance past a timestamp received from a peer. Returns the new value.
    #[must_use]
    pub fn observe(&mut self, remote: Timestamp) -> Option<Timestamp> {
        self.value = self.value.max(remote).next()?;
        Some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn tick_increments_by_one() {
        let mut clock = LogicalClock::new();
        assert_eq!(clock.tick(), Some(Timestamp(1)));
        assert_eq!(clock.tick(), Some(Timestamp(2)));
        assert_eq!(clock.value(), Timestamp(2));
    }

    #[test]
    fn observe_jumps_past_remote() {
        let mut clock = LogicalClock::starting_at(Timestamp(3));
        assert_eq!(clock.observe(Timestamp(10)), Some(Timestamp(11)));
    }

    #[test]
    fn observe_older_remote_still_advances() {
        let mut clock = LogicalClock::starting_at(Timestamp(7));
        assert_eq!(clock.observe(Timestamp(2)), Some(Timestamp(8)));
    }

    #[test]
    fn overflow_leaves_clock_unchanged() {
        let mut clock = LogicalClock::starting_at(Timestamp(u64::MAX));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.value(), Timestamp(u64::MAX));

        let mut clock = LogicalClock::starting_at(Timestamp(5));
        assert_eq!(clock.observe(Timestamp(u64::MAX)), None);
        assert_eq!(clock.value(), Timestamp(5));
    }

    proptest! {
        #[test]
        fn clock_is_strictly_increasing(
            start in 0..1_000u64,
            events in prop::collection::vec(prop::option::of(0..2_000u64), 0..50),
        ) {
            let mut clock = LogicalClock::starting_at(Timestamp(start));
            for event in events {
                let before = clock.value();
                let after = match event {
                    Some(remote) => {
                        let after = clock.observe(Timestamp(remote)).unwrap();
                        prop_assert!(after > Timestamp(remote));
                        after
                    },
                    None => clock.tick().unwrap(),
                };
                prop_assert!(after > before);
            }
        }
    }
}
