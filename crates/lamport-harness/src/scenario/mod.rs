//! Scenario testing framework.
//!
//! Scenarios describe a run declaratively (processes, demand, scheduling)
//! and must end in an oracle that verifies the final [`World`]:
//!
//! ```no_run
//! use lamport_harness::scenario::{Scenario, oracle};
//!
//! Scenario::new("two rounds each")
//!     .processes(3)
//!     .rounds_for_all(2)
//!     .seed(7)
//!     .oracle(oracle::all_of(vec![oracle::all_idle(), oracle::quiescent()]))
//!     .run()
//!     .unwrap();
//! ```
//!
//! A `Scenario` without an oracle has no `run` method, so every scenario test
//! verifies something.

mod builder;
pub mod oracle;

pub use builder::{RunnableScenario, Scenario};

use crate::World;

/// Verification run against the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
