//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::collections::BTreeMap;

use lamport_core::{ProcessId, ProtocolConfig, TieBreak};
use tracing::debug;

use crate::{
    Action, Demand, SchedulePolicy, Simulation, SimulationConfig, World, WorldConfig,
    scenario::OracleFn,
};

const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Scenario builder.
///
/// Describe processes, their demand and how they are scheduled. Must call
/// `.oracle()` to get a [`RunnableScenario`] that can be executed.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    processes: u32,
    demand: BTreeMap<ProcessId, Demand>,
    rounds_for_all: Option<u32>,
    prelude: Vec<Action>,
    policy: SchedulePolicy,
    seed: u64,
    protocol: ProtocolConfig,
    skip_probability: f64,
    auto_release: bool,
    max_steps: u64,
}

impl Scenario {
    /// Create a new scenario with the given name.
    ///
    /// Two processes, no demand, random scheduling with seed 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processes: 2,
            demand: BTreeMap::new(),
            rounds_for_all: None,
            prelude: Vec::new(),
            policy: SchedulePolicy::Random,
            seed: 0,
            protocol: ProtocolConfig::default(),
            skip_probability: 0.0,
            auto_release: true,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Number of processes.
    pub fn processes(mut self, count: u32) -> Self {
        self.processes = count;
        self
    }

    /// `process` requests the critical section `rounds` times.
    pub fn requests(mut self, process: ProcessId, rounds: u32) -> Self {
        self.demand.insert(process, Demand::Rounds(rounds));
        self
    }

    /// Every process requests the critical section `rounds` times.
    ///
    /// Per-process [`Scenario::requests`] calls take precedence.
    pub fn rounds_for_all(mut self, rounds: u32) -> Self {
        self.rounds_for_all = Some(rounds);
        self
    }

    /// Actions applied in order before the scheduler takes over.
    ///
    /// Each must be enabled when its turn comes.
    pub fn prelude(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.prelude.extend(actions);
        self
    }

    /// Scheduling policy.
    pub fn policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scheduler seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Tie-break rule for equal timestamps.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.protocol.tie_break = tie_break;
        self
    }

    /// Chance of an injected Skip step.
    pub fn skip_probability(mut self, probability: f64) -> Self {
        self.skip_probability = probability;
        self
    }

    /// Whether holders leave on their own. When off, holders stay in the
    /// critical section and the run ends once nothing else is enabled.
    pub fn auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    /// Step budget for reaching quiescence.
    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }

    fn simulation_config(&self) -> SimulationConfig {
        let mut world = WorldConfig::new(self.processes)
            .with_protocol(self.protocol)
            .with_auto_release(self.auto_release);
        if let Some(rounds) = self.rounds_for_all {
            world = world.with_rounds_for_all(rounds);
        }
        for (process, demand) in &self.demand {
            world = world.with_demand(*process, *demand);
        }

        SimulationConfig::new(world)
            .with_policy(self.policy)
            .with_seed(self.seed)
            .with_skip_probability(self.skip_probability)
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// 1. Build the world and apply the prelude, checking invariants after
    ///    each action
    /// 2. Let the scheduler run until nothing is enabled
    /// 3. Invoke the oracle on the final world
    pub fn run(self) -> Result<(), String> {
        self.run_world().map(|_| ())
    }

    /// Execute the scenario and hand back the final world.
    pub fn run_world(self) -> Result<World, String> {
        let name = &self.scenario.name;
        let mut sim = Simulation::new(self.scenario.simulation_config());

        for action in &self.scenario.prelude {
            sim.apply(*action)
                .map_err(|e| format!("Scenario '{name}': prelude {action} failed: {e}"))?;
        }

        let report = sim.run_until_quiescent(self.scenario.max_steps).map_err(|e| {
            format!("Scenario '{name}': failed after {} steps: {e}", sim.steps())
        })?;
        debug!(scenario = %name, steps = report.steps, entries = ?report.entries, "scenario ran");

        (self.oracle)(sim.world()).map_err(|e| format!("Scenario '{name}': {e}"))?;
        Ok(sim.world().clone())
    }
}
