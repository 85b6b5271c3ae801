//! Mailbox contract between processes.
//!
//! The protocol relies on exactly one property of the transport: each ordered
//! pair of processes has one slot per [`MessageKind`], and a slot holds at
//! most one pending message. Order across slots is left to whoever drains
//! them (the scheduler in simulation, task interleaving in the concurrent
//! runtime).
//!
//! A real transport must either preserve the bound or reject excess sends
//! with [`ProtocolViolation::DuplicatePending`].

use lamport_proto::{Message, MessageKind, ProcessId};

use crate::ProtocolViolation;

/// Bounded point-to-point mailbox between a fixed set of processes.
pub trait Transport {
    /// Every process reachable through this transport, in id order.
    fn members(&self) -> Vec<ProcessId>;

    /// Whether the `(from, to, kind)` slot is free.
    fn has_capacity(&self, from: ProcessId, to: ProcessId, kind: MessageKind) -> bool;

    /// Place `message` in the `(from, to, message.kind())` slot.
    ///
    /// # Errors
    ///
    /// `DuplicatePending` if the slot is occupied, `UnknownProcess` if either
    /// end is not a member, `SelfAddressed` if `from == to`.
    fn send(
        &mut self,
        from: ProcessId,
        to: ProcessId,
        message: Message,
    ) -> Result<(), ProtocolViolation>;

    /// Take the pending `kind` message from `from` to `to`, if any.
    ///
    /// Never blocks.
    fn receive(&mut self, to: ProcessId, from: ProcessId, kind: MessageKind) -> Option<Message>;

    /// Whether `from` could broadcast a `kind` message right now.
    fn can_broadcast(&self, from: ProcessId, kind: MessageKind) -> bool {
        self.members().into_iter().filter(|to| *to != from).all(|to| self.has_capacity(from, to, kind))
    }

    /// Send `message` to every member except `from`.
    ///
    /// All slots are checked before anything is sent, so a failed broadcast
    /// leaves the transport untouched.
    fn broadcast(&mut self, from: ProcessId, message: Message) -> Result<(), ProtocolViolation> {
        let members = self.members();
        if !members.contains(&from) {
            return Err(ProtocolViolation::UnknownProcess(from));
        }
        let peers: Vec<ProcessId> = members.into_iter().filter(|to| *to != from).collect();

        if let Some(to) = peers.iter().copied().find(|to| !self.has_capacity(from, *to, message.kind()))
        {
            return Err(ProtocolViolation::DuplicatePending { from, to, kind: message.kind() });
        }

        for to in peers {
            self.send(from, to, message)?;
        }
        Ok(())
    }
}
