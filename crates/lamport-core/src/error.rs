//! Protocol violation types.
//!
//! There are no recoverable errors in this protocol: delivery is reliable and
//! membership is fixed. Everything here means a caller broke the contract
//! (drove a transition that was not enabled, overfilled a mailbox slot) and
//! must be surfaced immediately rather than retried.

use lamport_proto::{MessageKind, ProcessId, ProtocolError, Timestamp};
use thiserror::Error;

use crate::process::ProcessState;

/// A broken protocol contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A message of this kind is already pending on the edge.
    #[error("{kind} from {from} to {to} is already pending")]
    DuplicatePending {
        /// Sender
        from: ProcessId,
        /// Receiver
        to: ProcessId,
        /// Slot kind
        kind: MessageKind,
    },

    /// Enter attempted while another process holds the critical section.
    #[error("{process} attempted to enter while {holder} holds the critical section")]
    HolderExists {
        /// Process attempting to enter
        process: ProcessId,
        /// Current holder
        holder: ProcessId,
    },

    /// Operation not valid in the process's current state.
    #[error("{process} cannot {operation} while {state}")]
    InvalidState {
        /// Process the operation targeted
        process: ProcessId,
        /// State at the time of the call
        state: ProcessState,
        /// Operation name
        operation: &'static str,
    },

    /// Enter attempted before acknowledgements or priority were secured.
    #[error("{process} is not eligible to enter the critical section")]
    NotEligible {
        /// Process attempting to enter
        process: ProcessId,
    },

    /// Process id outside the fixed membership.
    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    /// Message addressed from a process to itself.
    #[error("{0} addressed a message to itself")]
    SelfAddressed(ProcessId),

    /// Message that fails wire validation.
    #[error("malformed message from {from}: {source}")]
    Malformed {
        /// Sender
        from: ProcessId,
        /// Validation failure
        source: ProtocolError,
    },

    /// The logical clock cannot advance past `u64::MAX`.
    #[error("{process} clock cannot advance past {at}")]
    ClockOverflow {
        /// Process whose clock is exhausted
        process: ProcessId,
        /// Timestamp that could not be exceeded
        at: Timestamp,
    },

    /// Local state no longer satisfies its own invariants.
    #[error("{process} is inconsistent: {detail}")]
    Inconsistent {
        /// Process whose state is broken
        process: ProcessId,
        /// What does not hold
        detail: String,
    },
}
