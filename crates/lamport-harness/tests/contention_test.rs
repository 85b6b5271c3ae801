//! Every process contends for the critical section at once.

use lamport_core::{ProcessId, TieBreak};
use lamport_harness::{
    Action, SchedulePolicy,
    scenario::{OracleFn, Scenario, oracle},
};

fn everyone_entered(processes: u32, rounds: usize) -> OracleFn {
    oracle::all_of(
        (0..processes)
            .map(|p| oracle::entered_exactly(ProcessId(p), rounds))
            .chain([oracle::all_idle(), oracle::quiescent(), oracle::ledgers_empty()])
            .collect(),
    )
}

#[test]
fn all_processes_eventually_enter() {
    for processes in 2..=5 {
        for seed in 0..20 {
            let result = Scenario::new("contention")
                .processes(processes)
                .rounds_for_all(3)
                .seed(seed)
                .skip_probability(0.3)
                .oracle(everyone_entered(processes, 3))
                .run();

            assert!(result.is_ok(), "{processes} processes, seed {seed}: {result:?}");
        }
    }
}

#[test]
fn round_robin_is_fair_under_contention() {
    for tie_break in [TieBreak::ProcessId, TieBreak::Permissive] {
        let result = Scenario::new("round robin contention")
            .processes(4)
            .rounds_for_all(5)
            .policy(SchedulePolicy::RoundRobin)
            .tie_break(tie_break)
            .oracle(everyone_entered(4, 5))
            .run();

        assert!(result.is_ok(), "{tie_break:?}: {result:?}");
    }
}

#[test]
fn simultaneous_requests_enter_in_id_order() {
    let (a, b) = (ProcessId(0), ProcessId(1));

    // Both request from Init, so both timestamps are 1, and each has seen
    // the other's request before the scheduler takes over.
    let result = Scenario::new("equal timestamps")
        .processes(2)
        .prelude([
            Action::Request(b),
            Action::Request(a),
            Action::ReceiveRequest { at: a, from: b },
            Action::ReceiveRequest { at: b, from: a },
        ])
        .seed(5)
        .oracle(oracle::all_of(vec![oracle::enters_before(a, b), oracle::all_idle()]))
        .run();

    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn tight_step_budget_is_reported() {
    let result = Scenario::new("budget")
        .processes(3)
        .rounds_for_all(2)
        .max_steps(5)
        .oracle(oracle::all_idle())
        .run();

    let error = result.unwrap_err();
    assert!(error.contains("no quiescent state within 5 steps"), "{error}");
}
