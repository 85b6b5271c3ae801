//! Scenario tests for entry order, round trips and idle bystanders.

use lamport_core::{ProcessId, ProcessState, TieBreak};
use lamport_harness::{
    Action, SchedulePolicy,
    scenario::{Scenario, oracle},
};

const A: ProcessId = ProcessId(0);
const B: ProcessId = ProcessId(1);
const C: ProcessId = ProcessId(2);

/// A requests, B sees it, then B requests with a larger timestamp.
fn priority_prelude() -> [Action; 3] {
    [Action::Request(A), Action::ReceiveRequest { at: B, from: A }, Action::Request(B)]
}

#[test]
fn earlier_request_enters_first() {
    for policy in [SchedulePolicy::Random, SchedulePolicy::RoundRobin] {
        for seed in 0..200 {
            let result = Scenario::new("priority ordering")
                .processes(2)
                .prelude(priority_prelude())
                .policy(policy)
                .seed(seed)
                .oracle(oracle::all_of(vec![
                    oracle::enters_before(A, B),
                    oracle::entered_exactly(A, 1),
                    oracle::entered_exactly(B, 1),
                    oracle::all_idle(),
                    oracle::quiescent(),
                    oracle::ledgers_empty(),
                ]))
                .run();

            assert!(result.is_ok(), "{policy:?} seed {seed}: {result:?}");
        }
    }
}

#[test]
fn earlier_request_enters_first_with_permissive_ties() {
    for seed in 0..100 {
        let result = Scenario::new("priority ordering, permissive")
            .processes(3)
            .tie_break(TieBreak::Permissive)
            .prelude(priority_prelude())
            .seed(seed)
            .skip_probability(0.2)
            .oracle(oracle::all_of(vec![oracle::enters_before(A, B), oracle::all_idle()]))
            .run();

        assert!(result.is_ok(), "seed {seed}: {result:?}");
    }
}

#[test]
fn later_requester_waits_for_release() {
    // Nobody releases: A ends up holding and B stays requesting.
    let world = Scenario::new("no release")
        .processes(2)
        .prelude(priority_prelude())
        .auto_release(false)
        .seed(11)
        .oracle(oracle::all_of(vec![
            oracle::entered_exactly(A, 1),
            oracle::never_entered(B),
            oracle::quiescent(),
        ]))
        .run_world()
        .unwrap();

    assert_eq!(world.current_holder(), Some(A));
    assert_eq!(world.process(B).map(|p| p.state()), Some(ProcessState::Requesting));
    assert!(!world.is_enabled(Action::Enter(B)));
}

#[test]
fn two_rounds_return_to_initial_state() {
    for seed in 0..50 {
        let world = Scenario::new("round trip")
            .processes(2)
            .requests(A, 2)
            .seed(seed)
            .oracle(oracle::all_of(vec![
                oracle::entered_exactly(A, 2),
                oracle::never_entered(B),
                oracle::all_idle(),
                oracle::quiescent(),
                oracle::ledgers_empty(),
            ]))
            .run_world()
            .unwrap();

        for p in world.processes() {
            assert!(p.acks().is_empty(), "{} kept acks", p.id());
            assert!(p.can_request());
        }
        // Only clocks differ from the initial state.
        assert_eq!(world.process(A).map(|p| p.clock().get()), Some(2));
        assert_eq!(world.process(B).map(|p| p.clock().get()), Some(3));
    }
}

#[test]
fn single_active_process_among_three() {
    let world = Scenario::new("three processes, one active")
        .processes(3)
        .requests(C, 1)
        .policy(SchedulePolicy::RoundRobin)
        .oracle(oracle::all_of(vec![
            oracle::entered_exactly(C, 1),
            oracle::never_entered(A),
            oracle::never_entered(B),
            oracle::all_idle(),
            oracle::quiescent(),
            oracle::ledgers_empty(),
        ]))
        .run_world()
        .unwrap();

    // Two requests and two releases out, one ack back from each peer.
    assert_eq!(world.messages_sent(C), 4);
    assert_eq!(world.messages_received(C), 2);
    for bystander in [A, B] {
        assert_eq!(world.messages_sent(bystander), 1);
        assert_eq!(world.messages_received(bystander), 2);
        assert_eq!(world.process(bystander).map(|p| p.state()), Some(ProcessState::Idle));
    }
}
