//! Addressed messages for transports that share one stream between edges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Message, ProcessId, ProtocolError, Result};

/// A message together with its sender and recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Sending process
    pub from: ProcessId,
    /// Receiving process
    pub to: ProcessId,
    /// Payload
    pub message: Message,
}

impl Envelope {
    /// Address `message` from `from` to `to`.
    pub fn new(from: ProcessId, to: ProcessId, message: Message) -> Self {
        Self { from, to, message }
    }

    /// Check addressing and the inner message.
    pub fn validate(&self) -> Result<()> {
        if self.from == self.to {
            return Err(ProtocolError::SelfAddressed(self.from));
        }
        self.message.validate()
    }

    /// Encode as CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR and validate.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let envelope: Self =
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    #[test]
    fn envelope_survives_the_wire() {
        let envelope = Envelope::new(ProcessId(1), ProcessId(2), Message::request(Timestamp(9)));
        let bytes = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn self_addressed_envelope_is_rejected() {
        let envelope = Envelope::new(ProcessId(3), ProcessId(3), Message::ack());
        assert_eq!(envelope.encode(), Err(ProtocolError::SelfAddressed(ProcessId(3))));
    }

    #[test]
    fn display_names_both_ends() {
        let envelope = Envelope::new(ProcessId(0), ProcessId(4), Message::release());
        assert_eq!(envelope.to_string(), "p0 -> p4: Release");
    }
}
