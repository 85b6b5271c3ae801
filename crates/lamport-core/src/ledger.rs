//! Request ledger and the priority rule.

use std::collections::BTreeMap;

use lamport_proto::{ProcessId, Timestamp};

use crate::TieBreak;

/// A process's local belief about outstanding requests.
///
/// Maps each process believed to be requesting (the owner included) to the
/// timestamp of that request. Entries are added on Request, removed on the
/// matching Release (or on the owner's own Exit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLedger {
    entries: BTreeMap<ProcessId, Timestamp>,
}

impl RequestLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `process`'s request. Returns the entry it replaced, if any.
    pub fn record(&mut self, process: ProcessId, timestamp: Timestamp) -> Option<Timestamp> {
        self.entries.insert(process, timestamp)
    }

    /// Forget `process`'s request. Returns the removed entry, if any.
    pub fn remove(&mut self, process: ProcessId) -> Option<Timestamp> {
        self.entries.remove(&process)
    }

    /// Recorded request timestamp of `process`.
    pub fn get(&self, process: ProcessId) -> Option<Timestamp> {
        self.entries.get(&process).copied()
    }

    /// Whether `process` is believed to be requesting.
    pub fn contains(&self, process: ProcessId) -> bool {
        self.entries.contains_key(&process)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in process-id order.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, Timestamp)> + '_ {
        self.entries.iter().map(|(p, ts)| (*p, *ts))
    }

    /// Whether `me` has priority over `other`, judged from this ledger alone.
    ///
    /// `me` wins if there is no entry for `other`, or if both have entries and
    /// `me`'s request is not later than `other`'s. Equal timestamps are
    /// resolved by `tie_break`. With an entry for `other` but none for `me`,
    /// `other` wins.
    pub fn beats(&self, me: ProcessId, other: ProcessId, tie_break: TieBreak) -> bool {
        let Some(theirs) = self.get(other) else {
            return true;
        };
        let Some(mine) = self.get(me) else {
            return false;
        };

        match tie_break {
            TieBreak::ProcessId => (mine, me) < (theirs, other),
            TieBreak::Permissive => mine <= theirs,
        }
    }
}
