//! Model-based property tests.
//!
//! Random worlds, random schedules and random action sequences, checking the
//! protocol's safety and liveness properties after every step. Runs with
//! unbounded demand check that the mailbox keeps draining and every process
//! keeps entering.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: world shape + seed + policy   (scheduled runs)
//!                     Vec<action index>             (adversarial runs)
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      Simulation     World::apply     Replay
//!      step_once      (any action)     from history
//! ```

use lamport_core::{MessageKind, ProcessId, ProtocolConfig, TieBreak};
use lamport_harness::{
    Demand, SchedulePolicy, Simulation, SimulationConfig, SimulationError, Step, World,
    WorldConfig,
};
use proptest::prelude::*;

fn policy() -> impl Strategy<Value = SchedulePolicy> {
    prop_oneof![Just(SchedulePolicy::Random), Just(SchedulePolicy::RoundRobin)]
}

fn tie_break() -> impl Strategy<Value = TieBreak> {
    prop_oneof![Just(TieBreak::ProcessId), Just(TieBreak::Permissive)]
}

/// Rounds per process, for 1 to 5 processes.
fn demand() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=3, 1..=5)
}

fn world_config(rounds: &[u32], tie_break: TieBreak) -> WorldConfig {
    let mut config = WorldConfig::new(rounds.len() as u32)
        .with_protocol(ProtocolConfig::default().with_tie_break(tie_break));
    for (i, r) in rounds.iter().enumerate() {
        config = config.with_demand(ProcessId(i as u32), Demand::Rounds(*r));
    }
    config
}

/// Safety properties visible from outside the invariant checker.
fn assert_safe(world: &World) {
    let holders = world.processes().filter(|p| p.is_holding()).count();
    assert!(holders <= 1, "{holders} holders");

    let n = world.members().count();
    let bound = MessageKind::ALL.len() * n * n.saturating_sub(1);
    assert!(world.network().pending_count() <= bound);

    for p in world.processes() {
        p.check_invariants().unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn scheduled_runs_are_safe_and_live(
        rounds in demand(),
        seed in any::<u64>(),
        policy in policy(),
        tie_break in tie_break(),
        skip in 0.0f64..0.5,
    ) {
        let config = SimulationConfig::new(world_config(&rounds, tie_break))
            .with_seed(seed)
            .with_policy(policy)
            .with_skip_probability(skip);
        let mut sim = Simulation::new(config);

        let mut steps = 0u32;
        loop {
            match sim.step_once().unwrap() {
                Step::Applied(_) => assert_safe(sim.world()),
                Step::Quiescent => break,
            }
            steps += 1;
            prop_assert!(steps < 200_000, "no quiescence");
        }

        let world = sim.world();
        prop_assert!(world.is_settled());
        for (i, r) in rounds.iter().enumerate() {
            prop_assert_eq!(world.entry_count(ProcessId(i as u32)), *r as usize);
        }
        for p in world.processes() {
            prop_assert!(p.ledger().is_empty());
        }
    }

    #[test]
    fn runs_are_reproducible(
        rounds in demand(),
        seed in any::<u64>(),
        policy in policy(),
    ) {
        let config = SimulationConfig::new(world_config(&rounds, TieBreak::ProcessId))
            .with_seed(seed)
            .with_policy(policy)
            .with_skip_probability(0.1);

        let mut first = Simulation::new(config.clone());
        let mut second = Simulation::new(config.clone());
        first.run_until_quiescent(200_000).unwrap();
        second.run_until_quiescent(200_000).unwrap();

        prop_assert_eq!(first.history(), second.history());
        prop_assert_eq!(first.world().snapshot(), second.world().snapshot());

        let replayed = World::replay(config.world, first.history()).unwrap();
        prop_assert_eq!(replayed.snapshot(), first.world().snapshot());
        prop_assert_eq!(replayed.entries(), first.world().entries());
    }

    #[test]
    fn arbitrary_actions_never_break_invariants(
        processes in 1u32..=4,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..400),
        tie_break in tie_break(),
    ) {
        let config = WorldConfig::new(processes)
            .with_protocol(ProtocolConfig::default().with_tie_break(tie_break));
        let mut world = World::new(config);
        let universe = world.all_actions();

        for pick in picks {
            let action = *pick.get(&universe);
            let before = world.snapshot();

            if world.is_enabled(action) {
                world.apply(action).unwrap();
            } else {
                prop_assert_eq!(world.apply(action), Err(SimulationError::NotEnabled(action)));
                prop_assert_eq!(world.snapshot(), before);
            }

            world.check_invariants().unwrap();
            assert_safe(&world);
        }
    }
}

// Long runs, so fewer cases.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn continuous_contention_keeps_draining_and_entering(
        processes in 2u32..=4,
        seed in any::<u64>(),
        policy in policy(),
    ) {
        const SEGMENTS: usize = 3;
        const SEGMENT_STEPS: usize = 10_000;

        let mut world = WorldConfig::new(processes);
        for p in 0..processes {
            world = world.with_demand(ProcessId(p), Demand::Unbounded);
        }
        let config = SimulationConfig::new(world).with_seed(seed).with_policy(policy);
        let mut sim = Simulation::new(config);

        let mut entered: Vec<usize> = vec![0; processes as usize];
        for segment in 0..SEGMENTS {
            let mut drained = 0usize;
            for _ in 0..SEGMENT_STEPS {
                let step = sim.step_once().unwrap();
                prop_assert!(matches!(step, Step::Applied(_)), "stalled in segment {}", segment);
                if sim.world().is_quiescent() {
                    drained += 1;
                }
            }
            prop_assert!(drained > 0, "mailbox never empty in segment {}", segment);

            for (i, before) in entered.iter_mut().enumerate() {
                let now = sim.world().entry_count(ProcessId(i as u32));
                prop_assert!(now > *before, "p{} starved in segment {}", i, segment);
                *before = now;
            }
        }
    }
}
