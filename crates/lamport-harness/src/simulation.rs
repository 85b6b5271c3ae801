//! Public driving API over a [`World`] and a [`Scheduler`].
//!
//! Every step is one atomic [`Action`]. With `check_invariants` on (the
//! default), global invariants are verified after each step and the first
//! failure stops the run.

use lamport_core::ProcessId;
use tracing::{debug, trace};

use crate::{
    Action, SchedulePolicy, Scheduler, SimulationError, World, WorldConfig, invariants,
};

/// Simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Initial world
    pub world: WorldConfig,
    /// Scheduling policy
    pub policy: SchedulePolicy,
    /// Scheduler seed
    pub seed: u64,
    /// Chance of a Skip step when something is enabled
    pub skip_probability: f64,
    /// Verify global invariants after every step
    pub check_invariants: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            policy: SchedulePolicy::default(),
            seed: 0,
            skip_probability: 0.0,
            check_invariants: true,
        }
    }
}

impl SimulationConfig {
    /// Config around `world` with defaults elsewhere.
    pub fn new(world: WorldConfig) -> Self {
        Self { world, ..Self::default() }
    }

    /// Set the scheduler seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the scheduling policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the skip probability.
    #[must_use]
    pub fn with_skip_probability(mut self, probability: f64) -> Self {
        self.skip_probability = probability;
        self
    }
}

/// Outcome of [`Simulation::step_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// This action was applied.
    Applied(Action),
    /// Nothing is enabled.
    Quiescent,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Steps taken, skips included
    pub steps: u64,
    /// Processes in critical-section entry order
    pub entries: Vec<ProcessId>,
}

/// A world driven by a seeded scheduler.
#[derive(Debug, Clone)]
pub struct Simulation {
    world: World,
    scheduler: Scheduler,
    check_invariants: bool,
    steps: u64,
}

impl Simulation {
    /// Simulation in the initial state.
    pub fn new(config: SimulationConfig) -> Self {
        let scheduler = Scheduler::new(config.policy, config.seed)
            .with_skip_probability(config.skip_probability);

        Self {
            world: World::new(config.world),
            scheduler,
            check_invariants: config.check_invariants,
            steps: 0,
        }
    }

    /// Global state.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Actions applied so far, skips included.
    pub fn history(&self) -> &[Action] {
        self.world.history()
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Apply a specific action, bypassing the scheduler.
    ///
    /// # Errors
    ///
    /// `NotEnabled` if the guard does not hold, or whatever the step or the
    /// invariant check raises.
    pub fn apply(&mut self, action: Action) -> Result<(), SimulationError> {
        let clocks = self.check_invariants.then(|| self.world.clocks());

        self.world.apply(action)?;
        self.steps += 1;

        if let Some(before) = clocks {
            invariants::check(&self.world)?;
            invariants::check_clocks(&before, &self.world, action)?;
        }
        Ok(())
    }

    /// `p` asks for the critical section.
    pub fn request_access(&mut self, p: ProcessId) -> Result<(), SimulationError> {
        self.apply(Action::Request(p))
    }

    /// `p` leaves the critical section.
    pub fn release_access(&mut self, p: ProcessId) -> Result<(), SimulationError> {
        self.apply(Action::Exit(p))
    }

    /// Let the scheduler pick and apply one enabled action.
    ///
    /// # Errors
    ///
    /// Any violation raised by the step. Nothing enabled is not an error.
    pub fn step_once(&mut self) -> Result<Step, SimulationError> {
        let universe = self.world.all_actions();
        let enabled = self.world.enabled_actions();

        let Some(action) = self.scheduler.choose(&universe, &enabled) else {
            trace!(steps = self.steps, "quiescent");
            return Ok(Step::Quiescent);
        };

        trace!(step = self.steps, %action, enabled = enabled.len(), "scheduled");
        self.apply(action)?;
        Ok(Step::Applied(action))
    }

    /// Whether `p` holds the critical section.
    pub fn is_holding(&self, p: ProcessId) -> bool {
        self.world.is_holding(p)
    }

    /// Current critical-section holder.
    pub fn current_holder(&self) -> Option<ProcessId> {
        self.world.current_holder()
    }

    /// Step until nothing is enabled.
    ///
    /// # Errors
    ///
    /// `StepLimit` if `max_steps` steps pass without reaching quiescence, or
    /// the first violation.
    pub fn run_until_quiescent(&mut self, max_steps: u64) -> Result<RunReport, SimulationError> {
        let start = self.steps;

        while self.steps - start < max_steps {
            if self.step_once()? == Step::Quiescent {
                let report =
                    RunReport { steps: self.steps, entries: self.world.entries().to_vec() };
                debug!(steps = report.steps, entries = report.entries.len(), "run quiescent");
                return Ok(report);
            }
        }

        Err(SimulationError::StepLimit { steps: max_steps })
    }

    /// Take up to `steps` scheduler steps, stopping early at quiescence.
    ///
    /// Returns the number of actions applied.
    pub fn run_steps(&mut self, steps: u64) -> Result<u64, SimulationError> {
        let mut applied = 0;
        for _ in 0..steps {
            match self.step_once()? {
                Step::Applied(_) => applied += 1,
                Step::Quiescent => break,
            }
        }
        Ok(applied)
    }
}
