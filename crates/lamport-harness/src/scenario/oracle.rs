//! Reusable oracles.

use lamport_core::{ProcessId, ProcessState};

use crate::scenario::OracleFn;

/// Every process is idle and nobody holds the critical section.
pub fn all_idle() -> OracleFn {
    Box::new(|world| {
        if let Some(p) = world.processes().find(|p| p.state() != ProcessState::Idle) {
            return Err(format!("{} is {}", p.id(), p.state()));
        }
        match world.current_holder() {
            Some(holder) => Err(format!("{holder} still holds the critical section")),
            None => Ok(()),
        }
    })
}

/// No message is pending.
pub fn quiescent() -> OracleFn {
    Box::new(|world| {
        if world.is_quiescent() {
            Ok(())
        } else {
            let pending: Vec<String> =
                world.network().pending().map(|e| e.to_string()).collect();
            Err(format!("messages still pending: {pending:?}"))
        }
    })
}

/// Every ledger is empty.
pub fn ledgers_empty() -> OracleFn {
    Box::new(|world| {
        for p in world.processes() {
            if !p.ledger().is_empty() {
                let entries: Vec<_> = p.ledger().iter().collect();
                return Err(format!("{} still records {entries:?}", p.id()));
            }
        }
        Ok(())
    })
}

/// `first` entered the critical section, and did so before `second` did.
pub fn enters_before(first: ProcessId, second: ProcessId) -> OracleFn {
    Box::new(move |world| {
        let entries = world.entries();
        let Some(a) = entries.iter().position(|p| *p == first) else {
            return Err(format!("{first} never entered (entries {entries:?})"));
        };
        match entries.iter().position(|p| *p == second) {
            Some(b) if b < a => Err(format!("{second} entered before {first}: {entries:?}")),
            _ => Ok(()),
        }
    })
}

/// `process` entered exactly `times` times.
pub fn entered_exactly(process: ProcessId, times: usize) -> OracleFn {
    Box::new(move |world| {
        let count = world.entry_count(process);
        if count == times {
            Ok(())
        } else {
            Err(format!("{process} entered {count} times, expected {times}"))
        }
    })
}

/// `process` never entered.
pub fn never_entered(process: ProcessId) -> OracleFn {
    entered_exactly(process, 0)
}

/// Every oracle must pass; the first failure is reported.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in &oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
