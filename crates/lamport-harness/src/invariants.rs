//! Global invariants checked between simulation steps.
//!
//! Local invariants belong to each [`lamport_core::Process`]; these are the
//! properties only visible with the whole world in hand.

use std::collections::BTreeMap;

use lamport_core::{
    MessageKind, Network, Process, ProcessId, ProcessState, ProtocolViolation, Timestamp,
};
use thiserror::Error;

use crate::{Action, World};

/// A global invariant that no longer holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// More than one process is in the critical section.
    #[error("mutual exclusion violated: {holders:?} hold the critical section")]
    MultipleHolders {
        /// Every process in the Holding state
        holders: Vec<ProcessId>,
    },

    /// The recorded holder disagrees with the process states.
    #[error("holder slot says {recorded:?} but {actual:?} is holding")]
    HolderMismatch {
        /// Holder slot
        recorded: Option<ProcessId>,
        /// Process actually in Holding
        actual: Option<ProcessId>,
    },

    /// A process failed its own checks.
    #[error(transparent)]
    Local(#[from] ProtocolViolation),

    /// A clock went backwards.
    #[error("{process} clock went from {before} to {after}")]
    ClockRegressed {
        /// Process whose clock moved
        process: ProcessId,
        /// Clock before the step
        before: Timestamp,
        /// Clock after the step
        after: Timestamp,
    },

    /// A step that must advance a clock left it unchanged.
    #[error("{action} did not advance {process}'s clock past {before}")]
    ClockStalled {
        /// Step applied
        action: Action,
        /// Acting process
        process: ProcessId,
        /// Clock before the step
        before: Timestamp,
    },

    /// A step moved the clock of a process it does not touch.
    #[error("{action} moved {process}'s clock from {before} to {after}")]
    ClockDisturbed {
        /// Step applied
        action: Action,
        /// Bystander process
        process: ProcessId,
        /// Clock before the step
        before: Timestamp,
        /// Clock after the step
        after: Timestamp,
    },

    /// A pending message that no reachable state could have produced.
    #[error("pending {0}")]
    Mailbox(String),
}

/// Check every state invariant of `world`.
pub fn check(world: &World) -> Result<(), InvariantViolation> {
    let holders: Vec<ProcessId> =
        world.processes().filter(|p| p.is_holding()).map(|p| p.id()).collect();

    if holders.len() > 1 {
        return Err(InvariantViolation::MultipleHolders { holders });
    }
    let actual = holders.first().copied();
    if actual != world.current_holder() {
        return Err(InvariantViolation::HolderMismatch {
            recorded: world.current_holder(),
            actual,
        });
    }

    for process in world.processes() {
        process.check_invariants()?;
    }

    let processes: BTreeMap<ProcessId, &Process> =
        world.processes().map(|p| (p.id(), p)).collect();
    check_mailbox(world.network(), &processes)
}

/// Check pending messages against the processes they travel between.
///
/// The slot key already bounds the mailbox to one message per (receiver,
/// sender, kind). Beyond that, a pending Request means its sender is still
/// requesting with exactly that timestamp, and a pending Ack means its
/// receiver is still requesting and has not yet counted that peer.
fn check_mailbox(
    network: &Network,
    processes: &BTreeMap<ProcessId, &Process>,
) -> Result<(), InvariantViolation> {
    for envelope in network.pending() {
        let broken = |why: &str| {
            InvariantViolation::Mailbox(format!(
                "{} from {} to {} {why}",
                envelope.message, envelope.from, envelope.to
            ))
        };

        if envelope.from == envelope.to {
            return Err(broken("is self-addressed"));
        }
        let (Some(sender), Some(receiver)) =
            (processes.get(&envelope.from), processes.get(&envelope.to))
        else {
            return Err(broken("travels outside the membership"));
        };

        match envelope.message.kind() {
            MessageKind::Request => {
                let current = sender.state() == ProcessState::Requesting
                    && sender.request_timestamp() == envelope.message.timestamp();
                if !current {
                    return Err(broken("does not match the sender's outstanding request"));
                }
            },
            MessageKind::Ack => {
                let outstanding = receiver.state() == ProcessState::Requesting
                    && !receiver.acks().contains(&envelope.from);
                if !outstanding {
                    return Err(broken("answers no outstanding request"));
                }
            },
            MessageKind::Release => {},
        }
    }
    Ok(())
}

/// Check how `action` moved the clocks.
///
/// Clocks never go backwards, but they do not move on every step. Only a
/// request or a delivered request advances a clock, and it strictly advances
/// the acting process's. Acks, releases, enter and exit leave every clock
/// as it was.
pub fn check_clocks(
    before: &BTreeMap<ProcessId, Timestamp>,
    world: &World,
    action: Action,
) -> Result<(), InvariantViolation> {
    let advancing = match action {
        Action::Request(p) | Action::ReceiveRequest { at: p, .. } => Some(p),
        _ => None,
    };

    for (process, after) in world.clocks() {
        let before = before.get(&process).copied().unwrap_or_default();

        if after < before {
            return Err(InvariantViolation::ClockRegressed { process, before, after });
        }
        if advancing == Some(process) {
            if after == before {
                return Err(InvariantViolation::ClockStalled { action, process, before });
            }
        } else if after != before {
            return Err(InvariantViolation::ClockDisturbed { action, process, before, after });
        }
    }
    Ok(())
}
