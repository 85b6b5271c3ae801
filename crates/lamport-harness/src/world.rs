//! Global state of a simulated run.
//!
//! The World owns every process, the mailbox and the critical-section holder
//! slot. It knows which [`Action`]s are enabled and applies them atomically.
//! It does not choose actions; that is the scheduler's job.

use std::collections::BTreeMap;

use lamport_core::{
    Envelope, MessageKind, Network, Process, ProcessAction, ProcessId, ProcessState,
    ProtocolConfig, ProtocolViolation, Timestamp, Transport,
};
use tracing::trace;

use crate::{Action, SimulationError, invariants};

/// How many more requests the scheduler may issue on a process's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demand {
    /// This many more requests.
    Rounds(u32),
    /// Request again whenever idle.
    Unbounded,
}

impl Demand {
    /// Whether another request is wanted.
    pub fn is_pending(self) -> bool {
        !matches!(self, Self::Rounds(0))
    }

    fn consume(&mut self) {
        if let Self::Rounds(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

impl Default for Demand {
    fn default() -> Self {
        Self::Rounds(0)
    }
}

/// World configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldConfig {
    /// Number of processes, ids `0..processes`
    pub processes: u32,
    /// Protocol configuration shared by every process
    pub protocol: ProtocolConfig,
    /// Scheduler-issued requests per process (absent means none)
    pub demand: BTreeMap<ProcessId, Demand>,
    /// Whether the scheduler may exit on a holder's behalf
    pub auto_release: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            processes: 2,
            protocol: ProtocolConfig::default(),
            demand: BTreeMap::new(),
            auto_release: true,
        }
    }
}

impl WorldConfig {
    /// Config for `processes` processes with no scheduled demand.
    pub fn new(processes: u32) -> Self {
        Self { processes, ..Self::default() }
    }

    /// Set `process`'s demand.
    #[must_use]
    pub fn with_demand(mut self, process: ProcessId, demand: Demand) -> Self {
        self.demand.insert(process, demand);
        self
    }

    /// Give every process `rounds` scheduled requests.
    #[must_use]
    pub fn with_rounds_for_all(mut self, rounds: u32) -> Self {
        for p in self.members() {
            self.demand.insert(p, Demand::Rounds(rounds));
        }
        self
    }

    /// Set the protocol configuration.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Enable or disable scheduler-issued exits.
    #[must_use]
    pub fn with_auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    /// Process ids in the run.
    pub fn members(&self) -> impl Iterator<Item = ProcessId> + use<> {
        (0..self.processes).map(ProcessId)
    }
}

/// Observable state, comparable across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSnapshot {
    /// Every process, in id order
    pub processes: Vec<Process>,
    /// Pending messages
    pub pending: Vec<Envelope>,
    /// Critical-section holder
    pub holder: Option<ProcessId>,
}

/// All processes, the mailbox and the holder slot.
#[derive(Debug, Clone)]
pub struct World {
    config: WorldConfig,
    processes: BTreeMap<ProcessId, Process>,
    network: Network,
    holder: Option<ProcessId>,
    demand: BTreeMap<ProcessId, Demand>,
    history: Vec<Action>,
    entries: Vec<ProcessId>,
    sent: BTreeMap<ProcessId, usize>,
    received: BTreeMap<ProcessId, usize>,
}

impl World {
    /// World in its initial state: every process idle, no messages, no holder.
    pub fn new(config: WorldConfig) -> Self {
        let members: Vec<ProcessId> = config.members().collect();
        let processes = members
            .iter()
            .map(|&id| (id, Process::new(id, members.iter().copied(), config.protocol)))
            .collect();
        let demand = members
            .iter()
            .map(|&id| (id, config.demand.get(&id).copied().unwrap_or_default()))
            .collect();

        Self {
            network: Network::new(members.iter().copied()),
            processes,
            holder: None,
            demand,
            history: Vec::new(),
            entries: Vec::new(),
            sent: members.iter().map(|&id| (id, 0)).collect(),
            received: members.iter().map(|&id| (id, 0)).collect(),
            config,
        }
    }

    /// Rebuild a world by applying `actions` from the initial state.
    pub fn replay(config: WorldConfig, actions: &[Action]) -> Result<Self, SimulationError> {
        let mut world = Self::new(config);
        for action in actions {
            world.apply(*action)?;
        }
        Ok(world)
    }

    /// Configuration the world was built from.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Process ids in order.
    pub fn members(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.keys().copied()
    }

    /// Get a process by id.
    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// Every process, in id order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// The mailbox.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Current critical-section holder.
    pub fn current_holder(&self) -> Option<ProcessId> {
        self.holder
    }

    /// Whether `id` holds the critical section.
    pub fn is_holding(&self, id: ProcessId) -> bool {
        self.process(id).is_some_and(Process::is_holding)
    }

    /// Every action applied so far.
    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// Processes in the order they entered the critical section.
    pub fn entries(&self) -> &[ProcessId] {
        &self.entries
    }

    /// How many times `id` entered the critical section.
    pub fn entry_count(&self, id: ProcessId) -> usize {
        self.entries.iter().filter(|p| **p == id).count()
    }

    /// Messages sent by `id`.
    pub fn messages_sent(&self, id: ProcessId) -> usize {
        self.sent.get(&id).copied().unwrap_or(0)
    }

    /// Messages consumed by `id`.
    pub fn messages_received(&self, id: ProcessId) -> usize {
        self.received.get(&id).copied().unwrap_or(0)
    }

    /// Scheduler-issued requests still owed to `id`.
    pub fn remaining_demand(&self, id: ProcessId) -> Demand {
        self.demand.get(&id).copied().unwrap_or_default()
    }

    /// Current clock of every process.
    pub fn clocks(&self) -> BTreeMap<ProcessId, Timestamp> {
        self.processes.iter().map(|(id, p)| (*id, p.clock())).collect()
    }

    /// Whether no message is pending.
    pub fn is_quiescent(&self) -> bool {
        self.network.is_empty()
    }

    /// Whether nothing is pending, nobody is active and no demand is left.
    pub fn is_settled(&self) -> bool {
        self.is_quiescent()
            && self.holder.is_none()
            && self.processes.values().all(|p| p.state() == ProcessState::Idle)
            && self.demand.values().all(|d| !d.is_pending())
    }

    /// Observable state.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            processes: self.processes.values().cloned().collect(),
            pending: self.network.pending().collect(),
            holder: self.holder,
        }
    }

    /// Every non-skip action that could ever apply, in canonical order.
    ///
    /// Per process: Request, Enter, Exit, then one delivery per sender and
    /// kind.
    pub fn all_actions(&self) -> Vec<Action> {
        let members: Vec<ProcessId> = self.members().collect();
        let mut actions = Vec::with_capacity(members.len() * (3 + 3 * members.len()));

        for &p in &members {
            actions.extend([Action::Request(p), Action::Enter(p), Action::Exit(p)]);
            for &q in members.iter().filter(|q| **q != p) {
                actions.extend(MessageKind::ALL.map(|kind| Action::receive(p, q, kind)));
            }
        }
        actions
    }

    /// Actions the scheduler may choose from, in canonical order.
    pub fn enabled_actions(&self) -> Vec<Action> {
        self.all_actions().into_iter().filter(|a| self.is_scheduled(*a)).collect()
    }

    /// Whether the scheduler may choose `action`.
    ///
    /// Stricter than [`World::is_enabled`]: requests also need outstanding
    /// demand, exits need auto-release.
    pub fn is_scheduled(&self, action: Action) -> bool {
        match action {
            Action::Skip => false,
            Action::Request(p) => self.remaining_demand(p).is_pending() && self.is_enabled(action),
            Action::Exit(_) => self.config.auto_release && self.is_enabled(action),
            _ => self.is_enabled(action),
        }
    }

    /// Whether `action`'s guard holds.
    pub fn is_enabled(&self, action: Action) -> bool {
        match action {
            Action::Skip => true,
            Action::Request(p) => self.process(p).is_some_and(Process::can_request),
            Action::Enter(p) => {
                self.holder.is_none() && self.process(p).is_some_and(Process::may_enter)
            },
            Action::Exit(p) => {
                self.is_holding(p) && self.network.can_broadcast(p, MessageKind::Release)
            },
            Action::ReceiveRequest { .. }
            | Action::ReceiveAck { .. }
            | Action::ReceiveRelease { .. } => action
                .slot()
                .is_some_and(|slot| self.network.has_pending(slot.to, slot.from, slot.kind)),
        }
    }

    /// Apply `action` atomically.
    ///
    /// # Errors
    ///
    /// `NotEnabled` if the guard does not hold (state untouched), or the
    /// protocol violation raised while applying it.
    pub fn apply(&mut self, action: Action) -> Result<(), SimulationError> {
        if let Some(p) = action.process()
            && !self.processes.contains_key(&p)
        {
            return Err(ProtocolViolation::UnknownProcess(p).into());
        }
        if !self.is_enabled(action) {
            return Err(SimulationError::NotEnabled(action));
        }

        match action {
            Action::Skip => {},
            Action::Request(p) => {
                let actions = self.process_mut(p)?.request()?;
                self.execute(p, actions)?;
                if let Some(demand) = self.demand.get_mut(&p) {
                    demand.consume();
                }
            },
            Action::Enter(p) => {
                let holder = self.holder;
                self.process_mut(p)?.enter(holder)?;
                self.holder = Some(p);
                self.entries.push(p);
            },
            Action::Exit(p) => {
                let actions = self.process_mut(p)?.exit()?;
                self.holder = None;
                self.execute(p, actions)?;
            },
            Action::ReceiveRequest { at, from }
            | Action::ReceiveAck { at, from }
            | Action::ReceiveRelease { at, from } => {
                let Some(slot) = action.slot() else {
                    return Err(SimulationError::NotEnabled(action));
                };
                let Some(message) = self.network.peek(at, from, slot.kind).copied() else {
                    return Err(SimulationError::NotEnabled(action));
                };
                // The message stays pending if the receiver rejects it.
                let actions = self.process_mut(at)?.handle_message(from, &message)?;
                self.network.receive(at, from, slot.kind);
                *self.received.entry(at).or_insert(0) += 1;
                self.execute(at, actions)?;
            },
        }

        trace!(step = self.history.len(), %action, "applied");
        self.history.push(action);
        Ok(())
    }

    /// Check every global invariant.
    pub fn check_invariants(&self) -> Result<(), invariants::InvariantViolation> {
        invariants::check(self)
    }

    fn process_mut(&mut self, id: ProcessId) -> Result<&mut Process, ProtocolViolation> {
        self.processes.get_mut(&id).ok_or(ProtocolViolation::UnknownProcess(id))
    }

    fn execute(
        &mut self,
        from: ProcessId,
        actions: Vec<ProcessAction>,
    ) -> Result<(), ProtocolViolation> {
        for action in actions {
            match action {
                ProcessAction::Send { to, message } => {
                    self.network.send(from, to, message)?;
                    *self.sent.entry(from).or_insert(0) += 1;
                },
                ProcessAction::Broadcast { message } => {
                    self.network.broadcast(from, message)?;
                    *self.sent.entry(from).or_insert(0) += self.processes.len().saturating_sub(1);
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ProcessId = ProcessId(0);
    const B: ProcessId = ProcessId(1);

    #[test]
    fn initial_world_has_only_scheduled_requests_enabled() {
        let world = World::new(WorldConfig::new(2).with_demand(A, Demand::Rounds(1)));
        assert_eq!(world.enabled_actions(), vec![Action::Request(A)]);
        assert!(world.is_enabled(Action::Request(B)));
        assert!(!world.is_settled());
    }

    #[test]
    fn world_without_demand_is_settled() {
        let world = World::new(WorldConfig::new(3));
        assert!(world.enabled_actions().is_empty());
        assert!(world.is_settled());
    }

    #[test]
    fn apply_rejects_disabled_action_without_side_effects() {
        let mut world = World::new(WorldConfig::new(2));
        let before = world.snapshot();

        let result = world.apply(Action::Enter(A));
        assert_eq!(result, Err(SimulationError::NotEnabled(Action::Enter(A))));
        assert_eq!(world.snapshot(), before);
        assert!(world.history().is_empty());
    }

    #[test]
    fn rejected_delivery_keeps_message_pending() {
        let protocol = ProtocolConfig::default().with_initial_clock(Timestamp(u64::MAX - 1));
        let mut world = World::new(WorldConfig::new(2).with_protocol(protocol));
        world.apply(Action::Request(A)).unwrap();
        let before = world.snapshot();

        let delivery = Action::ReceiveRequest { at: B, from: A };
        let result = world.apply(delivery);
        assert_eq!(
            result,
            Err(SimulationError::Violation(ProtocolViolation::ClockOverflow {
                process: B,
                at: Timestamp(u64::MAX),
            }))
        );
        assert_eq!(world.snapshot(), before);
        assert!(world.is_enabled(delivery));
        assert_eq!(world.messages_received(B), 0);
        assert_eq!(world.history(), &[Action::Request(A)]);
    }

    #[test]
    fn apply_rejects_unknown_process() {
        let mut world = World::new(WorldConfig::new(2));
        let result = world.apply(Action::Request(ProcessId(9)));
        assert_eq!(
            result,
            Err(SimulationError::Violation(ProtocolViolation::UnknownProcess(ProcessId(9))))
        );
    }

    #[test]
    fn full_cycle_by_hand() {
        let mut world = World::new(WorldConfig::new(2));
        for action in [
            Action::Request(A),
            Action::ReceiveRequest { at: B, from: A },
            Action::ReceiveAck { at: A, from: B },
            Action::Enter(A),
        ] {
            world.apply(action).unwrap();
            world.check_invariants().unwrap();
        }
        assert_eq!(world.current_holder(), Some(A));
        assert!(!world.is_enabled(Action::Enter(B)));

        world.apply(Action::Exit(A)).unwrap();
        world.apply(Action::ReceiveRelease { at: B, from: A }).unwrap();

        assert!(world.is_settled());
        assert_eq!(world.entries(), &[A]);
        assert_eq!(world.messages_sent(A), 2);
        assert_eq!(world.messages_sent(B), 1);
        assert_eq!(world.messages_received(B), 2);
    }

    #[test]
    fn exit_waits_for_release_slot() {
        let mut world = World::new(WorldConfig::new(2));
        for action in [
            Action::Request(A),
            Action::ReceiveRequest { at: B, from: A },
            Action::ReceiveAck { at: A, from: B },
            Action::Enter(A),
            Action::Exit(A),
            // First release still in flight.
            Action::Request(A),
            Action::ReceiveRequest { at: B, from: A },
            Action::ReceiveAck { at: A, from: B },
            Action::Enter(A),
        ] {
            world.apply(action).unwrap();
        }

        assert!(!world.is_enabled(Action::Exit(A)));
        world.apply(Action::ReceiveRelease { at: B, from: A }).unwrap();
        assert!(world.is_enabled(Action::Exit(A)));
    }

    #[test]
    fn replay_reproduces_state() {
        let mut world = World::new(WorldConfig::new(2));
        for action in [
            Action::Request(B),
            Action::Request(A),
            Action::ReceiveRequest { at: A, from: B },
            Action::ReceiveRequest { at: B, from: A },
        ] {
            world.apply(action).unwrap();
        }

        let replayed = World::replay(world.config().clone(), world.history()).unwrap();
        assert_eq!(replayed.snapshot(), world.snapshot());
    }
}
