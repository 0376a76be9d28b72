//! Off-policy evaluation of an explicit target policy

use offtrace_core::{LearnerConfig, OffTraceError, Policy, Result, TraceAlgorithm};

use crate::algorithm::{EvaluationTraceDiscount, EvaluationView};
use crate::engine::{OffPolicyBase, OffPolicyLearner};

/// Learns the value table of `target` from data gathered by another policy.
///
/// Greedy or near-deterministic policies on either side make this
/// inefficient: importance-corrected traces get cut short, which amounts to
/// throwing data away.
pub struct OffPolicyEvaluation<'p, D> {
    base: OffPolicyBase<'p>,
    target: &'p dyn Policy,
    strategy: D,
}

impl<'p, D: EvaluationTraceDiscount> OffPolicyEvaluation<'p, D> {
    pub fn new(
        target: &'p dyn Policy,
        behaviour: &'p dyn Policy,
        strategy: D,
        discount: f64,
        alpha: f64,
        epsilon: f64,
    ) -> Result<Self> {
        if target.state_count() != behaviour.state_count()
            || target.action_count() != behaviour.action_count()
        {
            return Err(OffTraceError::InvalidArgument(format!(
                "Target policy is {}x{} but behaviour policy is {}x{}",
                target.state_count(),
                target.action_count(),
                behaviour.state_count(),
                behaviour.action_count()
            )));
        }

        Ok(Self {
            base: OffPolicyBase::new(behaviour, discount, alpha, epsilon)?,
            target,
            strategy,
        })
    }

    pub fn target(&self) -> &'p dyn Policy {
        self.target
    }

    pub fn strategy(&self) -> &D {
        &self.strategy
    }
}

impl<'p> OffPolicyEvaluation<'p, TraceAlgorithm> {
    /// Build a learner running the algorithm named in `config`
    pub fn from_config(
        target: &'p dyn Policy,
        behaviour: &'p dyn Policy,
        config: &LearnerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(
            target,
            behaviour,
            config.algorithm,
            config.discount,
            config.learning_rate,
            config.epsilon,
        )
    }
}

impl<'p, D: EvaluationTraceDiscount> OffPolicyLearner<'p> for OffPolicyEvaluation<'p, D> {
    fn name(&self) -> &str {
        self.strategy.name()
    }

    fn base(&self) -> &OffPolicyBase<'p> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OffPolicyBase<'p> {
        &mut self.base
    }

    fn step_update_q(&mut self, s: usize, a: usize, s1: usize, rew: f64) {
        let expected_q: f64 = self
            .base
            .q
            .row(s1)
            .iter()
            .enumerate()
            .map(|(a1, &v)| v * self.target.action_probability(s1, a1))
            .sum();

        let error = self.base.td_error(s, a, rew, expected_q);

        let view = EvaluationView {
            target: self.target,
            behaviour: self.base.behaviour(),
            discount: self.base.discount(),
        };
        let trace_discount = self.strategy.trace_discount(&view, s, a, s1, rew);

        self.base.update_traces(s, a, error, trace_discount);
    }
}
