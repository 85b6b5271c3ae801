//! Process state machine for Lamport mutual exclusion.
//!
//! # Architecture: Action-Based State Machine
//!
//! This state machine follows the action pattern:
//! - Methods take the inputs they need (incoming message, current holder)
//! - Methods return `Result<Vec<ProcessAction>, ProtocolViolation>`
//! - Driver code executes actions against a [`crate::Transport`]
//!
//! A process never blocks and never sees another process's state. Everything
//! it knows about its peers arrives as messages.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  request   ┌────────────┐  enter   ┌─────────┐
//! │ Idle │───────────>│ Requesting │─────────>│ Holding │
//! └──────┘            └────────────┘          └─────────┘
//!    ^                                             │
//!    └─────────────────── exit ────────────────────┘
//! ```
//!
//! # Entry rule
//!
//! A requesting process may enter once every member (itself included) has
//! acknowledged its request and it beats every process that has an entry in
//! its ledger. See [`RequestLedger::beats`].

use std::{collections::BTreeSet, fmt};

use lamport_proto::{Message, MessageKind, ProcessId, Timestamp};
use tracing::{debug, trace, warn};

use crate::{LogicalClock, ProtocolConfig, ProtocolViolation, RequestLedger};

/// Actions returned by the process state machine.
///
/// The driver (scheduler or concurrent runtime) executes these against the
/// transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    /// Send this message to one peer
    Send {
        /// Recipient
        to: ProcessId,
        /// Message to deliver
        message: Message,
    },

    /// Send this message to every other member
    Broadcast {
        /// Message to deliver
        message: Message,
    },
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Not interested in the critical section
    Idle,
    /// Request broadcast, waiting for acknowledgements and priority
    Requesting,
    /// Inside the critical section
    Holding,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Holding => "holding",
        };
        f.write_str(name)
    }
}

/// One participant in the protocol.
///
/// Owns its clock, ledger and acknowledgement set exclusively. Pure state
/// machine: no I/O, no shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    id: ProcessId,
    members: BTreeSet<ProcessId>,
    config: ProtocolConfig,
    clock: LogicalClock,
    state: ProcessState,
    ledger: RequestLedger,
    acks: BTreeSet<ProcessId>,
}

impl Process {
    /// Create an idle process.
    ///
    /// `members` is the full fixed membership; `id` is added if missing.
    pub fn new(
        id: ProcessId,
        members: impl IntoIterator<Item = ProcessId>,
        config: ProtocolConfig,
    ) -> Self {
        let mut members: BTreeSet<ProcessId> = members.into_iter().collect();
        members.insert(id);

        Self {
            id,
            members,
            config,
            clock: LogicalClock::starting_at(config.initial_clock),
            state: ProcessState::Idle,
            ledger: RequestLedger::new(),
            acks: BTreeSet::new(),
        }
    }

    /// Process identity.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Current clock value.
    pub fn clock(&self) -> Timestamp {
        self.clock.value()
    }

    /// Local request ledger.
    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    /// Processes that acknowledged the current request (self included).
    pub fn acks(&self) -> &BTreeSet<ProcessId> {
        &self.acks
    }

    /// Full membership, self included.
    pub fn members(&self) -> &BTreeSet<ProcessId> {
        &self.members
    }

    /// Every member except this process.
    pub fn peers(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.members.iter().copied().filter(move |p| *p != self.id)
    }

    /// Protocol configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Timestamp of this process's outstanding request, if any.
    pub fn request_timestamp(&self) -> Option<Timestamp> {
        self.ledger.get(self.id)
    }

    /// Whether this process is in the critical section.
    pub fn is_holding(&self) -> bool {
        self.state == ProcessState::Holding
    }

    /// Whether [`Process::request`] is enabled.
    ///
    /// Only one request may be outstanding, so this is exactly "no self entry
    /// in the ledger".
    pub fn can_request(&self) -> bool {
        !self.ledger.contains(self.id)
    }

    /// Whether every member has acknowledged the current request.
    pub fn has_all_acks(&self) -> bool {
        self.acks == self.members
    }

    /// Whether this process has priority over `other` in its own view.
    pub fn beats(&self, other: ProcessId) -> bool {
        self.ledger.beats(self.id, other, self.config.tie_break)
    }

    /// Whether the local conditions for entering hold.
    ///
    /// Does not consider the global holder; [`Process::enter`] does.
    pub fn may_enter(&self) -> bool {
        self.state == ProcessState::Requesting
            && self.has_all_acks()
            && self.ledger.iter().all(|(other, _)| other == self.id || self.beats(other))
    }

    /// Issue a request for the critical section.
    ///
    /// Ticks the clock, records the request in the local ledger and
    /// broadcasts it.
    ///
    /// # Errors
    ///
    /// `InvalidState` if a request is already outstanding, `ClockOverflow`
    /// if the clock is already at `u64::MAX`.
    pub fn request(&mut self) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        if !self.can_request() {
            return Err(self.invalid_state("request"));
        }

        let ts = self.clock.tick().ok_or_else(|| self.clock_overflow(self.clock.value()))?;
        self.ledger.record(self.id, ts);
        self.acks.clear();
        self.acks.insert(self.id);
        self.state = ProcessState::Requesting;

        debug!(process = %self.id, %ts, "request issued");
        Ok(vec![ProcessAction::Broadcast { message: Message::request(ts) }])
    }

    /// Handle a message received from `from`.
    ///
    /// # Errors
    ///
    /// `UnknownProcess` / `SelfAddressed` for bad senders, `Malformed` for a
    /// request without timestamp, `InvalidState` for an acknowledgement that
    /// answers no request, `ClockOverflow` for a request stamped `u64::MAX`.
    /// On error the process is left untouched.
    pub fn handle_message(
        &mut self,
        from: ProcessId,
        message: &Message,
    ) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        if from == self.id {
            return Err(ProtocolViolation::SelfAddressed(from));
        }
        if !self.members.contains(&from) {
            return Err(ProtocolViolation::UnknownProcess(from));
        }
        message.validate().map_err(|source| ProtocolViolation::Malformed { from, source })?;

        match message.kind() {
            MessageKind::Request => {
                let ts = message.timestamp().ok_or(ProtocolViolation::Malformed {
                    from,
                    source: lamport_proto::ProtocolError::MissingTimestamp,
                })?;
                self.receive_request(from, ts)
            },
            MessageKind::Ack => self.receive_ack(from),
            MessageKind::Release => Ok(self.receive_release(from)),
        }
    }

    fn receive_request(
        &mut self,
        from: ProcessId,
        ts: Timestamp,
    ) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        let now =
            self.clock.observe(ts).ok_or_else(|| self.clock_overflow(ts.max(self.clock.value())))?;
        self.ledger.record(from, ts);

        trace!(process = %self.id, %from, %ts, clock = %now, "request received");
        Ok(vec![ProcessAction::Send { to: from, message: Message::ack() }])
    }

    fn receive_ack(&mut self, from: ProcessId) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        if self.state == ProcessState::Idle {
            return Err(self.invalid_state("accept an acknowledgement"));
        }

        self.acks.insert(from);
        trace!(process = %self.id, %from, acks = self.acks.len(), "ack received");
        Ok(vec![])
    }

    fn receive_release(&mut self, from: ProcessId) -> Vec<ProcessAction> {
        let removed = self.ledger.remove(from);
        trace!(process = %self.id, %from, removed = removed.is_some(), "release received");
        vec![]
    }

    /// Enter the critical section.
    ///
    /// `holder` is the current global holder, if any.
    ///
    /// # Errors
    ///
    /// `HolderExists` if someone holds the critical section, `InvalidState`
    /// if not requesting, `NotEligible` if acknowledgements or priority are
    /// missing.
    pub fn enter(
        &mut self,
        holder: Option<ProcessId>,
    ) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        if let Some(holder) = holder {
            warn!(process = %self.id, %holder, "enter attempted while critical section is held");
            return Err(ProtocolViolation::HolderExists { process: self.id, holder });
        }
        if self.state != ProcessState::Requesting {
            return Err(self.invalid_state("enter"));
        }
        if !self.may_enter() {
            return Err(ProtocolViolation::NotEligible { process: self.id });
        }

        self.state = ProcessState::Holding;
        debug!(process = %self.id, ts = ?self.request_timestamp(), "entered critical section");
        Ok(vec![])
    }

    /// Leave the critical section and release the request.
    ///
    /// # Errors
    ///
    /// `InvalidState` if not holding.
    pub fn exit(&mut self) -> Result<Vec<ProcessAction>, ProtocolViolation> {
        if self.state != ProcessState::Holding {
            return Err(self.invalid_state("exit"));
        }

        self.ledger.remove(self.id);
        self.acks.clear();
        self.state = ProcessState::Idle;

        debug!(process = %self.id, "exited critical section");
        Ok(vec![ProcessAction::Broadcast { message: Message::release() }])
    }

    /// Verify the process's local invariants.
    ///
    /// - self entry in the ledger iff requesting or holding
    /// - acknowledgements only from members, and only while requesting or holding
    pub fn check_invariants(&self) -> Result<(), ProtocolViolation> {
        let active = self.state != ProcessState::Idle;

        if self.ledger.contains(self.id) != active {
            return Err(self.inconsistent(format!(
                "self entry present={} while {}",
                self.ledger.contains(self.id),
                self.state
            )));
        }
        if !active && !self.acks.is_empty() {
            return Err(self.inconsistent(format!("{} acknowledgements while idle", self.acks.len())));
        }
        if let Some(stranger) = self.acks.iter().find(|p| !self.members.contains(p)) {
            return Err(self.inconsistent(format!("acknowledgement from non-member {stranger}")));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> ProtocolViolation {
        warn!(process = %self.id, state = %self.state, operation, "invalid transition");
        ProtocolViolation::InvalidState { process: self.id, state: self.state, operation }
    }

    fn clock_overflow(&self, at: Timestamp) -> ProtocolViolation {
        warn!(process = %self.id, %at, "clock exhausted");
        ProtocolViolation::ClockOverflow { process: self.id, at }
    }

    fn inconsistent(&self, detail: String) -> ProtocolViolation {
        ProtocolViolation::Inconsistent { process: self.id, detail }
    }
}
