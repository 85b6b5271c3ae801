//! In-memory mailbox.

use std::collections::{BTreeMap, BTreeSet};

use lamport_proto::{Envelope, Message, MessageKind, ProcessId};
use tracing::trace;

use crate::{ProtocolViolation, Transport};

/// Mailbox slot key: one per sender, receiver and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    /// Receiver
    pub to: ProcessId,
    /// Sender
    pub from: ProcessId,
    /// Message kind
    pub kind: MessageKind,
}

/// Pending messages between a fixed set of processes.
///
/// Each [`Slot`] holds at most one message, so the network as a whole holds
/// at most `n * (n - 1) * 3` messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Network {
    members: BTreeSet<ProcessId>,
    slots: BTreeMap<Slot, Message>,
}

impl Network {
    /// Empty network between `members`.
    pub fn new(members: impl IntoIterator<Item = ProcessId>) -> Self {
        Self { members: members.into_iter().collect(), slots: BTreeMap::new() }
    }

    /// Whether `process` is a member.
    pub fn is_member(&self, process: ProcessId) -> bool {
        self.members.contains(&process)
    }

    /// Number of pending messages.
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether no message is pending.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether a `kind` message from `from` to `to` is pending.
    pub fn has_pending(&self, to: ProcessId, from: ProcessId, kind: MessageKind) -> bool {
        self.slots.contains_key(&Slot { to, from, kind })
    }

    /// The pending `kind` message from `from` to `to`, without consuming it.
    pub fn peek(&self, to: ProcessId, from: ProcessId, kind: MessageKind) -> Option<&Message> {
        self.slots.get(&Slot { to, from, kind })
    }

    /// Occupied slots in receiver, sender, kind order.
    pub fn occupied(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots.keys().copied()
    }

    /// Every pending message, addressed.
    pub fn pending(&self) -> impl Iterator<Item = Envelope> + '_ {
        self.slots.iter().map(|(slot, message)| Envelope::new(slot.from, slot.to, *message))
    }

    fn check_edge(&self, from: ProcessId, to: ProcessId) -> Result<(), ProtocolViolation> {
        if from == to {
            return Err(ProtocolViolation::SelfAddressed(from));
        }
        for process in [from, to] {
            if !self.is_member(process) {
                return Err(ProtocolViolation::UnknownProcess(process));
            }
        }
        Ok(())
    }
}

impl Transport for Network {
    fn members(&self) -> Vec<ProcessId> {
        self.members.iter().copied().collect()
    }

    fn has_capacity(&self, from: ProcessId, to: ProcessId, kind: MessageKind) -> bool {
        !self.has_pending(to, from, kind)
    }

    fn send(
        &mut self,
        from: ProcessId,
        to: ProcessId,
        message: Message,
    ) -> Result<(), ProtocolViolation> {
        self.check_edge(from, to)?;

        let slot = Slot { to, from, kind: message.kind() };
        if self.slots.contains_key(&slot) {
            return Err(ProtocolViolation::DuplicatePending { from, to, kind: slot.kind });
        }

        trace!(%from, %to, %message, "enqueue");
        self.slots.insert(slot, message);
        Ok(())
    }

    fn receive(&mut self, to: ProcessId, from: ProcessId, kind: MessageKind) -> Option<Message> {
        let message = self.slots.remove(&Slot { to, from, kind })?;
        trace!(%from, %to, %message, "dequeue");
        Some(message)
    }
}
