//! Concurrent runtime: one tokio task per process.
//!
//! Each task owns its [`Process`] outright. Tasks share two things:
//!
//! - a [`SharedNetwork`], one lock acquisition per mailbox operation or per
//!   inbound edge drained
//! - the critical-section holder slot, compare-and-set on enter and exit
//!
//! Locks are only taken inside synchronous helpers, so no guard ever lives
//! across an `.await`. Tasks yield after every poll; tokio's scheduling of
//! ready tasks supplies the fairness the protocol needs for progress.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};

use lamport_core::{
    Message, MessageKind, Network, Process, ProcessAction, ProcessId, ProcessState,
    ProtocolConfig, ProtocolViolation, Timestamp, Transport,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Concurrent run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrentConfig {
    /// Number of processes, ids `0..processes`
    pub processes: u32,
    /// Critical-section entries each process performs
    pub rounds: u32,
    /// Protocol configuration shared by every process
    pub protocol: ProtocolConfig,
    /// Consecutive polls without global progress before a task gives up
    pub poll_budget: u64,
}

impl Default for ConcurrentConfig {
    fn default() -> Self {
        Self {
            processes: 3,
            rounds: 2,
            protocol: ProtocolConfig::default(),
            poll_budget: 1_000_000,
        }
    }
}

/// Why a concurrent run failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrentError {
    /// A process or the mailbox rejected a step.
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),

    /// No task made progress for the whole poll budget.
    #[error("{process} saw no progress for {polls} polls")]
    Stalled {
        /// Task that gave up
        process: ProcessId,
        /// Polls without progress
        polls: u64,
    },

    /// A holder found the holder slot taken by someone else on exit.
    #[error("{process} lost the critical section while holding it")]
    HolderLost {
        /// Process that was holding
        process: ProcessId,
    },

    /// A task panicked or was cancelled.
    #[error("task failed: {0}")]
    Join(String),
}

/// [`Network`] behind a mutex, cloneable across tasks.
#[derive(Debug, Clone, Default)]
pub struct SharedNetwork(Arc<Mutex<Network>>);

impl SharedNetwork {
    /// Empty network between `members`.
    pub fn new(members: impl IntoIterator<Item = ProcessId>) -> Self {
        Self(Arc::new(Mutex::new(Network::new(members))))
    }

    /// Messages currently pending.
    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current mailbox contents.
    pub fn snapshot(&self) -> Network {
        self.lock().clone()
    }

    /// Take everything pending from `from` to `to` in one critical region,
    /// in handling order.
    ///
    /// When a Release and a Request from the same sender are both pending,
    /// the Release answers an earlier request: the sender could not have
    /// entered, and so could not have released, before its previous Request
    /// was consumed. Reading both slots under one lock keeps the pair
    /// consistent, so the Release is always handled first.
    pub fn take_inbound(&self, to: ProcessId, from: ProcessId) -> Vec<Message> {
        let mut network = self.lock();
        DRAIN_ORDER.into_iter().filter_map(|kind| network.receive(to, from, kind)).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Network> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for SharedNetwork {
    fn members(&self) -> Vec<ProcessId> {
        self.lock().members()
    }

    fn has_capacity(&self, from: ProcessId, to: ProcessId, kind: MessageKind) -> bool {
        self.lock().has_capacity(from, to, kind)
    }

    fn send(
        &mut self,
        from: ProcessId,
        to: ProcessId,
        message: Message,
    ) -> Result<(), ProtocolViolation> {
        self.lock().send(from, to, message)
    }

    fn receive(&mut self, to: ProcessId, from: ProcessId, kind: MessageKind) -> Option<Message> {
        self.lock().receive(to, from, kind)
    }

    fn can_broadcast(&self, from: ProcessId, kind: MessageKind) -> bool {
        self.lock().can_broadcast(from, kind)
    }

    // One critical region, so no other task sees a half-sent broadcast.
    fn broadcast(&mut self, from: ProcessId, message: Message) -> Result<(), ProtocolViolation> {
        self.lock().broadcast(from, message)
    }
}

/// How one process's task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Process id
    pub process: ProcessId,
    /// Completed critical-section entries
    pub rounds: u32,
    /// Final clock value
    pub clock: Timestamp,
    /// Polls taken
    pub polls: u64,
}

/// Result of a successful concurrent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrentReport {
    /// Processes in critical-section entry order
    pub entries: Vec<ProcessId>,
    /// Per-process outcome, in id order
    pub outcomes: Vec<ProcessOutcome>,
}

#[derive(Debug)]
struct Shared {
    holder: Mutex<Option<ProcessId>>,
    entries: Mutex<Vec<ProcessId>>,
    processes: u32,
    finished: AtomicU32,
    progress: AtomicU64,
    failed: AtomicBool,
}

impl Shared {
    fn holder(&self) -> MutexGuard<'_, Option<ProcessId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries(&self) -> MutexGuard<'_, Vec<ProcessId>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Order in which one sender's pending messages are handled.
const DRAIN_ORDER: [MessageKind; 3] =
    [MessageKind::Release, MessageKind::Request, MessageKind::Ack];

struct Worker {
    process: Process,
    network: SharedNetwork,
    shared: Arc<Shared>,
    rounds: u32,
    completed: u32,
    finished: bool,
    polls: u64,
}

impl Worker {
    /// One pass: drain every inbound slot, then try to move the state machine.
    fn poll(&mut self) -> Result<bool, ConcurrentError> {
        self.polls += 1;
        let delivered = self.drain()?;
        let advanced = self.advance()?;
        Ok(delivered || advanced)
    }

    fn drain(&mut self) -> Result<bool, ConcurrentError> {
        let id = self.process.id();
        let peers: Vec<ProcessId> = self.process.peers().collect();
        let mut delivered = false;

        for from in peers {
            for message in self.network.take_inbound(id, from) {
                let actions = self.process.handle_message(from, &message)?;
                self.execute(actions)?;
                delivered = true;
            }
        }
        Ok(delivered)
    }

    fn advance(&mut self) -> Result<bool, ConcurrentError> {
        let id = self.process.id();

        match self.process.state() {
            ProcessState::Idle if self.completed < self.rounds => {
                let actions = self.process.request()?;
                self.execute(actions)?;
                Ok(true)
            },
            ProcessState::Idle => {
                if !self.finished {
                    self.finished = true;
                    self.shared.finished.fetch_add(1, Ordering::SeqCst);
                    debug!(process = %id, rounds = self.completed, "finished");
                }
                Ok(false)
            },
            ProcessState::Requesting if self.process.may_enter() => {
                {
                    let mut holder = self.shared.holder();
                    if holder.is_some() {
                        return Ok(false);
                    }
                    self.process.enter(*holder)?;
                    *holder = Some(id);
                }
                self.shared.entries().push(id);
                Ok(true)
            },
            ProcessState::Requesting => Ok(false),
            ProcessState::Holding => {
                // Only this task fills its own outbound slots, so capacity
                // seen here cannot disappear before the broadcast.
                if !self.network.can_broadcast(id, MessageKind::Release) {
                    return Ok(false);
                }
                let actions = self.process.exit()?;
                {
                    let mut holder = self.shared.holder();
                    if *holder != Some(id) {
                        warn!(process = %id, holder = ?*holder, "holder slot changed under us");
                        return Err(ConcurrentError::HolderLost { process: id });
                    }
                    *holder = None;
                }
                self.execute(actions)?;
                self.completed += 1;
                Ok(true)
            },
        }
    }

    fn execute(&mut self, actions: Vec<ProcessAction>) -> Result<(), ProtocolViolation> {
        let from = self.process.id();
        for action in actions {
            match action {
                ProcessAction::Send { to, message } => self.network.send(from, to, message)?,
                ProcessAction::Broadcast { message } => self.network.broadcast(from, message)?,
            }
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst) == self.shared.processes
            && self.network.is_empty()
    }

    fn outcome(&self) -> ProcessOutcome {
        ProcessOutcome {
            process: self.process.id(),
            rounds: self.completed,
            clock: self.process.clock(),
            polls: self.polls,
        }
    }

    fn fail(&self, error: ConcurrentError) -> ConcurrentError {
        self.shared.failed.store(true, Ordering::SeqCst);
        warn!(process = %self.process.id(), %error, "task failed");
        error
    }
}

async fn run_worker(
    mut worker: Worker,
    poll_budget: u64,
) -> Result<ProcessOutcome, ConcurrentError> {
    let mut seen = worker.shared.progress.load(Ordering::SeqCst);
    let mut idle_polls = 0u64;

    while !worker.shared.failed.load(Ordering::SeqCst) {
        match worker.poll() {
            Ok(true) => {
                worker.shared.progress.fetch_add(1, Ordering::SeqCst);
            },
            Ok(false) => {},
            Err(error) => return Err(worker.fail(error)),
        }

        if worker.is_done() {
            break;
        }

        let now = worker.shared.progress.load(Ordering::SeqCst);
        if now == seen {
            idle_polls += 1;
            if idle_polls > poll_budget {
                let process = worker.process.id();
                return Err(worker.fail(ConcurrentError::Stalled { process, polls: idle_polls }));
            }
        } else {
            seen = now;
            idle_polls = 0;
        }

        tokio::task::yield_now().await;
    }

    trace!(process = %worker.process.id(), polls = worker.polls, "task done");
    Ok(worker.outcome())
}

/// Run `config.processes` tasks until each has completed `config.rounds`
/// entries and the mailbox is empty.
///
/// # Errors
///
/// The first failure reported by any task. Other tasks stop at their next
/// poll once one has failed.
pub async fn run(config: ConcurrentConfig) -> Result<ConcurrentReport, ConcurrentError> {
    let members: Vec<ProcessId> = (0..config.processes).map(ProcessId).collect();
    let network = SharedNetwork::new(members.iter().copied());
    let shared = Arc::new(Shared {
        holder: Mutex::new(None),
        entries: Mutex::new(Vec::new()),
        processes: config.processes,
        finished: AtomicU32::new(0),
        progress: AtomicU64::new(0),
        failed: AtomicBool::new(false),
    });

    debug!(processes = config.processes, rounds = config.rounds, "starting concurrent run");

    let handles: Vec<_> = members
        .iter()
        .map(|&id| {
            let worker = Worker {
                process: Process::new(id, members.iter().copied(), config.protocol),
                network: network.clone(),
                shared: Arc::clone(&shared),
                rounds: config.rounds,
                completed: 0,
                finished: false,
                polls: 0,
            };
            tokio::spawn(run_worker(worker, config.poll_budget))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    let mut failure = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(outcome)) => outcomes.push(outcome),
            Ok(Err(error)) => {
                failure.get_or_insert(error);
            },
            Err(error) => {
                failure.get_or_insert(ConcurrentError::Join(error.to_string()));
            },
        }
    }
    if let Some(error) = failure {
        return Err(error);
    }

    let entries = shared.entries().clone();
    debug!(entries = entries.len(), "concurrent run complete");
    Ok(ConcurrentReport { entries, outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_network_broadcast_is_visible_to_clones() {
        let network = SharedNetwork::new((0..3).map(ProcessId));
        let mut sender = network.clone();

        sender.broadcast(ProcessId(0), Message::release()).unwrap();
        assert_eq!(network.pending_count(), 2);
        assert!(!network.can_broadcast(ProcessId(0), MessageKind::Release));

        let mut receiver = network.clone();
        assert_eq!(
            receiver.receive(ProcessId(2), ProcessId(0), MessageKind::Release),
            Some(Message::release())
        );
        assert_eq!(network.snapshot().pending_count(), 1);
    }

    #[test]
    fn take_inbound_hands_release_before_newer_request() {
        let (a, b) = (ProcessId(0), ProcessId(1));
        let network = SharedNetwork::new([a, b]);
        let mut sender = network.clone();

        sender.send(b, a, Message::ack()).unwrap();
        sender.send(b, a, Message::release()).unwrap();
        sender.send(b, a, Message::request(Timestamp(4))).unwrap();

        assert_eq!(
            network.take_inbound(a, b),
            vec![Message::release(), Message::request(Timestamp(4)), Message::ack()]
        );
        assert!(network.is_empty());
        assert!(network.take_inbound(a, b).is_empty());
    }

    #[test]
    fn stale_release_never_clears_a_newer_request() {
        let (a, b) = (ProcessId(0), ProcessId(1));
        let network = SharedNetwork::new([a, b]);
        let mut receiver = Process::new(a, [a, b], ProtocolConfig::default());
        receiver.handle_message(b, &Message::request(Timestamp(1))).unwrap();

        // b entered, released and requested again before a drained anything.
        let mut sender = network.clone();
        sender.send(b, a, Message::release()).unwrap();
        sender.send(b, a, Message::request(Timestamp(5))).unwrap();

        for message in network.take_inbound(a, b) {
            receiver.handle_message(b, &message).unwrap();
        }
        assert_eq!(receiver.ledger().get(b), Some(Timestamp(5)));
    }

    #[tokio::test]
    async fn single_process_enters_alone() {
        let config = ConcurrentConfig { processes: 1, rounds: 3, ..ConcurrentConfig::default() };
        let report = run(config).await.unwrap();

        assert_eq!(report.entries, vec![ProcessId(0); 3]);
        assert_eq!(report.outcomes[0].rounds, 3);
    }

    #[tokio::test]
    async fn zero_rounds_finishes_immediately() {
        let config = ConcurrentConfig { processes: 4, rounds: 0, ..ConcurrentConfig::default() };
        let report = run(config).await.unwrap();
        assert!(report.entries.is_empty());
        assert_eq!(report.outcomes.len(), 4);
    }
}
