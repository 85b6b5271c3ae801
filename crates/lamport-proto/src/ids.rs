//! Process identities and logical timestamps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a process in the fixed membership set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Raw numeric identity.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Value of a logical clock.
///
/// Totally ordered; the protocol only ever compares and increments them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Initial clock value.
    pub const ZERO: Self = Self(0);

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The timestamp immediately after this one, `None` at `u64::MAX`.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_stops_at_max() {
        assert_eq!(Timestamp(41).next(), Some(Timestamp(42)));
        assert_eq!(Timestamp(u64::MAX).next(), None);
    }
}
