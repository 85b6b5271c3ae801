//! Protocol configuration.

use lamport_proto::Timestamp;

/// How the priority rule resolves two requests with equal timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TieBreak {
    /// Order equal timestamps by process id, lower id first.
    ///
    /// Gives every process the same total order over requests.
    #[default]
    ProcessId,

    /// A process beats a peer whenever its own timestamp is less than or
    /// equal to the peer's.
    ///
    /// Two processes requesting at the same timestamp can each conclude they
    /// win. Exclusion then rests on the global holder check alone.
    Permissive,
}

/// Configuration shared by every process in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Equal-timestamp resolution
    pub tie_break: TieBreak,
    /// Clock value every process starts from
    pub initial_clock: Timestamp,
}

impl ProtocolConfig {
    /// Config with the given tie-break rule.
    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Config with every clock starting at `initial_clock`.
    #[must_use]
    pub fn with_initial_clock(mut self, initial_clock: Timestamp) -> Self {
        self.initial_clock = initial_clock;
        self
    }
}
