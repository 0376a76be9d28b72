//! Policy capability consumed by the learners
//!
//! Learners only ever ask a policy how likely an action is. Sampling is
//! there for the code driving the environment.

use ndarray::Array2;
use rand::{Rng, RngCore};

use crate::error::{OffTraceError, Result};

/// Full `S x A` action distribution of a policy.
pub type PolicyTable = Array2<f64>;

const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// A stochastic policy over finite states and actions
pub trait Policy: Send + Sync {
    /// Number of states the policy is defined over
    fn state_count(&self) -> usize;

    /// Number of actions available in every state
    fn action_count(&self) -> usize;

    /// Draw an action for state `s`
    fn sample_action(&self, s: usize, rng: &mut dyn RngCore) -> usize;

    /// Probability of picking action `a` in state `s`
    fn action_probability(&self, s: usize, a: usize) -> f64;

    /// Materialize the whole distribution
    fn policy_table(&self) -> PolicyTable {
        PolicyTable::from_shape_fn((self.state_count(), self.action_count()), |(s, a)| {
            self.action_probability(s, a)
        })
    }
}

/// Picks every action uniformly at random
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    states: usize,
    actions: usize,
}

impl RandomPolicy {
    pub fn new(states: usize, actions: usize) -> Result<Self> {
        if actions == 0 {
            return Err(OffTraceError::InvalidArgument(
                "A policy needs at least one action".to_string(),
            ));
        }
        Ok(Self { states, actions })
    }
}

impl Policy for RandomPolicy {
    fn state_count(&self) -> usize {
        self.states
    }

    fn action_count(&self) -> usize {
        self.actions
    }

    fn sample_action(&self, _s: usize, rng: &mut dyn RngCore) -> usize {
        rng.gen_range(0..self.actions)
    }

    fn action_probability(&self, _s: usize, _a: usize) -> f64 {
        1.0 / self.actions as f64
    }
}

/// Policy backed by an explicit probability table, one row per state
#[derive(Debug, Clone)]
pub struct TabularPolicy {
    table: PolicyTable,
}

impl TabularPolicy {
    /// Wrap a table whose rows are each a probability distribution
    pub fn new(table: PolicyTable) -> Result<Self> {
        if table.ncols() == 0 {
            return Err(OffTraceError::InvalidArgument(
                "A policy needs at least one action".to_string(),
            ));
        }
        for (s, row) in table.rows().into_iter().enumerate() {
            if row.iter().any(|&p| !(0.0..=1.0).contains(&p)) {
                return Err(OffTraceError::InvalidArgument(format!(
                    "Row {s} holds a value outside [0, 1]"
                )));
            }
            let sum = row.sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(OffTraceError::InvalidArgument(format!(
                    "Row {s} sums to {sum}, expected 1"
                )));
            }
        }
        Ok(Self { table })
    }

    /// Deterministic policy taking `actions[s]` in every state `s`
    pub fn deterministic(actions: &[usize], action_count: usize) -> Result<Self> {
        if let Some(&bad) = actions.iter().find(|&&a| a >= action_count) {
            return Err(OffTraceError::InvalidArgument(format!(
                "Action {bad} out of range for {action_count} actions"
            )));
        }
        let table = PolicyTable::from_shape_fn((actions.len(), action_count), |(s, a)| {
            if actions[s] == a {
                1.0
            } else {
                0.0
            }
        });
        Self::new(table)
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }
}

impl Policy for TabularPolicy {
    fn state_count(&self) -> usize {
        self.table.nrows()
    }

    fn action_count(&self) -> usize {
        self.table.ncols()
    }

    fn sample_action(&self, s: usize, rng: &mut dyn RngCore) -> usize {
        let mut p: f64 = rng.gen();
        let row = self.table.row(s);
        for (a, &prob) in row.iter().enumerate() {
            if p < prob {
                return a;
            }
            p -= prob;
        }
        // Rounding left some mass over; fall back to the last action with any.
        row.iter().rposition(|&prob| prob > 0.0).unwrap_or(0)
    }

    fn action_probability(&self, s: usize, a: usize) -> f64 {
        self.table[[s, a]]
    }

    fn policy_table(&self) -> PolicyTable {
        self.table.clone()
    }
}
