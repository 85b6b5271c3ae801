//! Protocol messages.
//!
//! # Wire shape
//!
//! ```text
//! Request  { "kind": 1, "timestamp": <u64> }
//! Ack      { "kind": 2 }
//! Release  { "kind": 3 }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{ProtocolError, Result, Timestamp};

/// Kind of a protocol message.
///
/// The network holds at most one pending message of each kind per
/// sender/receiver edge, so the kind doubles as the mailbox slot key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum MessageKind {
    /// Ask every peer for permission to enter the critical section.
    Request = 1,
    /// Acknowledge a peer's request.
    Ack = 2,
    /// Announce that the sender left the critical section.
    Release = 3,
}

impl MessageKind {
    /// Every kind, in slot order.
    pub const ALL: [Self; 3] = [Self::Request, Self::Ack, Self::Release];

    /// Wire representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire representation.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Ack),
            3 => Some(Self::Release),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "Request",
            Self::Ack => "Ack",
            Self::Release => "Release",
        };
        f.write_str(name)
    }
}

/// An immutable protocol message.
///
/// Only `Request` messages carry a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Timestamp>,
}

impl Message {
    /// A request stamped with the requester's clock.
    pub fn request(timestamp: Timestamp) -> Self {
        Self { kind: MessageKind::Request, timestamp: Some(timestamp) }
    }

    /// An acknowledgement.
    pub fn ack() -> Self {
        Self { kind: MessageKind::Ack, timestamp: None }
    }

    /// A release notice.
    pub fn release() -> Self {
        Self { kind: MessageKind::Release, timestamp: None }
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Request timestamp, `None` for `Ack` and `Release`.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Check that the timestamp is present exactly when the kind requires it.
    pub fn validate(&self) -> Result<()> {
        match (self.kind, self.timestamp) {
            (MessageKind::Request, None) => Err(ProtocolError::MissingTimestamp),
            (MessageKind::Ack | MessageKind::Release, Some(_)) => {
                Err(ProtocolError::UnexpectedTimestamp { kind: self.kind })
            },
            _ => Ok(()),
        }
    }

    /// Encode as CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR, rejecting messages that fail [`Message::validate`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let message: Self =
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(ts) => write!(f, "{}@{}", self.kind, ts),
            None => write!(f, "{}", self.kind),
        }
    }
}
