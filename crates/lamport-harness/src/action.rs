//! Atomic steps of the global system.

use std::fmt;

use lamport_core::{MessageKind, ProcessId, Slot};

/// One indivisible step.
///
/// Each variant carries exactly what is needed to apply it: the acting
/// process, and for deliveries the sender whose slot is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Do nothing.
    Skip,
    /// Process issues a request.
    Request(ProcessId),
    /// Process enters the critical section.
    Enter(ProcessId),
    /// Process leaves the critical section.
    Exit(ProcessId),
    /// `at` consumes the pending Request from `from`.
    ReceiveRequest {
        /// Receiving process
        at: ProcessId,
        /// Sending process
        from: ProcessId,
    },
    /// `at` consumes the pending Ack from `from`.
    ReceiveAck {
        /// Receiving process
        at: ProcessId,
        /// Sending process
        from: ProcessId,
    },
    /// `at` consumes the pending Release from `from`.
    ReceiveRelease {
        /// Receiving process
        at: ProcessId,
        /// Sending process
        from: ProcessId,
    },
}

impl Action {
    /// Delivery of the `kind` slot from `from` to `at`.
    pub fn receive(at: ProcessId, from: ProcessId, kind: MessageKind) -> Self {
        match kind {
            MessageKind::Request => Self::ReceiveRequest { at, from },
            MessageKind::Ack => Self::ReceiveAck { at, from },
            MessageKind::Release => Self::ReceiveRelease { at, from },
        }
    }

    /// Process whose state this action changes, `None` for [`Action::Skip`].
    pub fn process(&self) -> Option<ProcessId> {
        match *self {
            Self::Skip => None,
            Self::Request(p) | Self::Enter(p) | Self::Exit(p) => Some(p),
            Self::ReceiveRequest { at, .. }
            | Self::ReceiveAck { at, .. }
            | Self::ReceiveRelease { at, .. } => Some(at),
        }
    }

    /// Mailbox slot drained by a delivery action.
    pub fn slot(&self) -> Option<Slot> {
        let (to, from, kind) = match *self {
            Self::ReceiveRequest { at, from } => (at, from, MessageKind::Request),
            Self::ReceiveAck { at, from } => (at, from, MessageKind::Ack),
            Self::ReceiveRelease { at, from } => (at, from, MessageKind::Release),
            _ => return None,
        };
        Some(Slot { to, from, kind })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Request(p) => write!(f, "request({p})"),
            Self::Enter(p) => write!(f, "enter({p})"),
            Self::Exit(p) => write!(f, "exit({p})"),
            Self::ReceiveRequest { at, from } => write!(f, "{at} <- request from {from}"),
            Self::ReceiveAck { at, from } => write!(f, "{at} <- ack from {from}"),
            Self::ReceiveRelease { at, from } => write!(f, "{at} <- release from {from}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_maps_kind_to_variant() {
        let (a, b) = (ProcessId(0), ProcessId(1));
        for kind in MessageKind::ALL {
            let action = Action::receive(a, b, kind);
            assert_eq!(action.slot(), Some(Slot { to: a, from: b, kind }));
            assert_eq!(action.process(), Some(a));
        }
    }

    #[test]
    fn local_actions_have_no_slot() {
        assert_eq!(Action::Request(ProcessId(2)).slot(), None);
        assert_eq!(Action::Skip.process(), None);
    }
}
