//! Wire types for the Lamport mutual-exclusion protocol.
//!
//! Three message kinds flow between processes: `Request` (carrying the
//! requester's logical timestamp), `Ack` and `Release` (carrying nothing).
//! Messages are encoded as small CBOR maps so a real transport can frame them
//! without a schema compiler, and an [`Envelope`] adds the sender and
//! recipient for transports that multiplex every edge over one stream.
//!
//! # Validation
//!
//! The constructors on [`Message`] make invalid combinations unrepresentable.
//! Decoding re-checks the same rule (timestamp present iff `Request`) so bytes
//! from the wire can never produce a message the protocol engine would have to
//! second-guess.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;

pub use envelope::Envelope;
pub use errors::{ProtocolError, Result};
pub use ids::{ProcessId, Timestamp};
pub use message::{Message, MessageKind};
