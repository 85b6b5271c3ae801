//! Simulation errors.

use lamport_core::ProtocolViolation;
use thiserror::Error;

use crate::{Action, InvariantViolation};

/// Why a simulation step or run failed.
///
/// A quiescent world is not an error; see [`crate::Step::Quiescent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// A process or the mailbox rejected the step.
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),

    /// A global invariant failed after the step.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// The action's guard does not hold in the current state.
    #[error("{0} is not enabled")]
    NotEnabled(Action),

    /// The run did not settle within its step budget.
    #[error("no quiescent state within {steps} steps")]
    StepLimit {
        /// Steps taken before giving up
        steps: u64,
    },
}
