//! Simulation harness for the Lamport mutual-exclusion protocol.
//!
//! Two ways to run the protocol engine from `lamport-core`:
//!
//! - [`Simulation`]: one global state, one atomic [`Action`] per step, chosen
//!   by a seeded [`Scheduler`]. Every run is reproducible from its seed or
//!   from its recorded history (see [`World::replay`]).
//! - [`concurrent`]: one tokio task per process, sharing a locked mailbox and
//!   a holder slot.
//!
//! The [`scenario`] module wraps the simulation in a builder that refuses to
//! run without an oracle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod concurrent;
pub mod error;
pub mod invariants;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod world;

pub use action::Action;
pub use concurrent::{
    ConcurrentConfig, ConcurrentError, ConcurrentReport, ProcessOutcome, SharedNetwork,
};
pub use error::SimulationError;
pub use invariants::InvariantViolation;
pub use scheduler::{SchedulePolicy, Scheduler};
pub use simulation::{RunReport, Simulation, SimulationConfig, Step};
pub use world::{Demand, World, WorldConfig, WorldSnapshot};
