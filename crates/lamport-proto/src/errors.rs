//! Wire-level error types.

use thiserror::Error;

use crate::{MessageKind, ProcessId};

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while validating, encoding or decoding wire values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A `Request` arrived without the requester's timestamp.
    #[error("request message is missing its timestamp")]
    MissingTimestamp,

    /// An `Ack` or `Release` carried a timestamp.
    #[error("{kind} message must not carry a timestamp")]
    UnexpectedTimestamp {
        /// Kind of the offending message
        kind: MessageKind,
    },

    /// Envelope addressed from a process to itself.
    #[error("envelope is addressed from {0} to itself")]
    SelfAddressed(ProcessId),

    /// CBOR serialization failed.
    #[error("CBOR encoding failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decoding failed: {0}")]
    CborDecode(String),
}
