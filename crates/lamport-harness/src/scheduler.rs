//! Seeded choice of the next action.
//!
//! The scheduler is the only source of nondeterminism in a simulation. Same
//! seed, same policy, same world: same run.

use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

use crate::Action;

/// Upper bound on the skip probability, so a run always makes progress.
pub const MAX_SKIP_PROBABILITY: f64 = 0.99;

/// How the scheduler picks among enabled actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SchedulePolicy {
    /// Uniformly at random.
    #[default]
    Random,
    /// Cycle through the canonical action order, taking the next enabled
    /// action after the last one chosen. Weakly fair: an action that stays
    /// enabled is chosen within one cycle.
    RoundRobin,
}

/// Picks one enabled action per step.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: SchedulePolicy,
    rng: ChaCha8Rng,
    cursor: usize,
    skip_probability: f64,
}

impl Scheduler {
    /// Scheduler with the given policy and seed, never skipping.
    pub fn new(policy: SchedulePolicy, seed: u64) -> Self {
        Self { policy, rng: ChaCha8Rng::seed_from_u64(seed), cursor: 0, skip_probability: 0.0 }
    }

    /// Chance of choosing [`Action::Skip`] when something else is enabled.
    ///
    /// Clamped to `0.0..=MAX_SKIP_PROBABILITY`; NaN counts as zero.
    #[must_use]
    pub fn with_skip_probability(mut self, probability: f64) -> Self {
        self.skip_probability =
            if probability.is_nan() { 0.0 } else { probability.clamp(0.0, MAX_SKIP_PROBABILITY) };
        self
    }

    /// Active policy.
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Effective skip probability.
    pub fn skip_probability(&self) -> f64 {
        self.skip_probability
    }

    /// Choose among `enabled`, which must be a subset of `universe` in the
    /// same order.
    ///
    /// `None` when nothing is enabled. `universe` only matters for the
    /// round-robin cursor.
    pub fn choose(&mut self, universe: &[Action], enabled: &[Action]) -> Option<Action> {
        if enabled.is_empty() {
            return None;
        }
        if self.skip_probability > 0.0 && self.rng.gen_bool(self.skip_probability) {
            return Some(Action::Skip);
        }

        match self.policy {
            SchedulePolicy::Random => enabled.choose(&mut self.rng).copied(),
            SchedulePolicy::RoundRobin => self.next_in_cycle(universe, enabled),
        }
    }

    fn next_in_cycle(&mut self, universe: &[Action], enabled: &[Action]) -> Option<Action> {
        if universe.is_empty() {
            return enabled.first().copied();
        }

        let len = universe.len();
        let start = self.cursor % len;
        let offset = (0..len).find(|i| enabled.contains(&universe[(start + i) % len]))?;
        let index = (start + offset) % len;

        self.cursor = index + 1;
        Some(universe[index])
    }
}
