//! Lamport mutual-exclusion protocol core logic
//!
//! Pure state machine logic for Lamport's logical-clock mutual exclusion,
//! completely decoupled from I/O and scheduling. A fixed set of processes
//! coordinate access to one critical section using only Request, Ack and
//! Release messages stamped with logical clocks.
//!
//! # Architecture
//!
//! Each [`Process`] owns its clock, its request ledger and its acknowledgement
//! set. Transitions never touch the network directly: they return
//! [`ProcessAction`]s (send or broadcast a message) that a driver executes
//! against a [`Transport`]. The same process code runs under the
//! single-step scheduler in the harness and under the concurrent runtime.
//!
//! Who holds the critical section is global knowledge. The process does not
//! track it; the driver passes the current holder into [`Process::enter`],
//! which refuses to enter while one exists.
//!
//! # Components
//!
//! - [`clock`]: Lamport logical clock
//! - [`ledger`]: Per-process request ledger and the priority rule
//! - [`transport`]: Mailbox contract (bounded, one pending message per kind and edge)
//! - [`network`]: In-memory mailbox implementation
//! - [`process`]: Protocol state machine
//! - [`config`]: Protocol configuration
//! - [`error`]: Protocol violations

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod network;
pub mod process;
pub mod transport;

pub use clock::LogicalClock;
pub use config::{ProtocolConfig, TieBreak};
pub use error::ProtocolViolation;
pub use lamport_proto::{Envelope, Message, MessageKind, ProcessId, Timestamp};
pub use ledger::RequestLedger;
pub use network::{Network, Slot};
pub use process::{Process, ProcessAction, ProcessState};
pub use transport::Transport;
