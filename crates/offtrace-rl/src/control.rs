//! Off-policy control against an implicit epsilon-greedy target

use serde_json::{json, Value};
use tracing::debug;

use offtrace_core::config::validate_exploration;
use offtrace_core::{max_action, LearnerConfig, Policy, Result, TraceAlgorithm};

use crate::algorithm::{ControlTraceDiscount, ControlView};
use crate::engine::{param_f64, OffPolicyBase, OffPolicyLearner};

/// Learns the optimal value table while acting with another policy.
///
/// The target is assumed epsilon-greedy with respect to the current table:
/// it picks the greedy action with probability
/// `exploration + (1 - exploration) / A` and any other action with
/// `(1 - exploration) / A`. Raise `exploration` towards 1 over time to
/// converge on the optimal values.
///
/// Note that `exploration` is the greedy fraction, and that the engine's
/// `epsilon` is the trace cutoff, not an exploration rate.
pub struct OffPolicyControl<'p, D> {
    base: OffPolicyBase<'p>,
    exploration: f64,
    strategy: D,
}

impl<'p, D: ControlTraceDiscount> OffPolicyControl<'p, D> {
    pub fn new(
        behaviour: &'p dyn Policy,
        strategy: D,
        exploration: f64,
        discount: f64,
        alpha: f64,
        epsilon: f64,
    ) -> Result<Self> {
        validate_exploration(exploration)?;

        Ok(Self {
            base: OffPolicyBase::new(behaviour, discount, alpha, epsilon)?,
            exploration,
            strategy,
        })
    }

    /// Set the greedy fraction of the target policy, which must be in [0, 1]
    pub fn set_exploration(&mut self, e: f64) -> Result<()> {
        validate_exploration(e)?;
        self.exploration = e;
        debug!(exploration = e, "Exploration updated");
        Ok(())
    }

    pub fn exploration(&self) -> f64 {
        self.exploration
    }

    pub fn strategy(&self) -> &D {
        &self.strategy
    }
}

impl<'p> OffPolicyControl<'p, TraceAlgorithm> {
    /// Build a learner running the algorithm named in `config`
    pub fn from_config(behaviour: &'p dyn Policy, config: &LearnerConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            behaviour,
            config.algorithm,
            config.exploration,
            config.discount,
            config.learning_rate,
            config.epsilon,
        )
    }
}

impl<'p, D: ControlTraceDiscount> OffPolicyLearner<'p> for OffPolicyControl<'p, D> {
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
        let actions = self.base.action_count();
        let row = self.base.q.row(s1);
        let (max_a, max_q) = max_action(row);
        let expected_q =
            row.sum() * ((1.0 - self.exploration) / actions as f64) + max_q * self.exploration;

        let error = self.base.td_error(s, a, rew, expected_q);

        let view = ControlView {
            behaviour: self.base.behaviour(),
            discount: self.base.discount(),
            exploration: self.exploration,
            action_count: actions,
        };
        let trace_discount = self.strategy.trace_discount(&view, s, a, s1, rew, max_a);

        self.base.update_traces(s, a, error, trace_discount);
    }

    fn get_params(&self) -> Value {
        let mut map = self.base.params();
        map.insert("algorithm".to_string(), json!(self.name()));
        map.insert("exploration".to_string(), json!(self.exploration));
        Value::Object(map)
    }

    fn set_params(&mut self, params: &Value) -> Result<()> {
        let exploration = param_f64(params, "exploration")?;
        if let Some(e) = exploration {
            validate_exploration(e)?;
        }

        self.base.set_params(params)?;

        if let Some(e) = exploration {
            self.set_exploration(e)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{ImportanceSampling, QLambda, TraceStrategy};
    use ndarray::array;
    use offtrace_core::{OffTraceError, RandomPolicy, Trace};
    use std::cell::Cell;

    /// Records the greedy action it was handed and returns a fixed factor
    struct Recording {
        max_a: Cell<Option<usize>>,
    }

    impl TraceStrategy for Recording {
        fn name(&self) -> &str {
            "recording"
        }
    }

    impl ControlTraceDiscount for Recording {
        fn trace_discount(
            &self,
            _: &ControlView<'_>,
            _: usize,
            _: usize,
            _: usize,
            _: f64,
            max_a: usize,
        ) -> f64 {
            self.max_a.set(Some(max_a));
            0.5
        }
    }

    #[test]
    fn test_greedy_expectation() {
        let behaviour = RandomPolicy::new(1, 3).unwrap();
        let strategy = Recording {
            max_a: Cell::new(None),
        };
        let mut control = OffPolicyControl::new(&behaviour, strategy, 0.8, 1.0, 1.0, 1e-6).unwrap();
        control.set_q_function(array![[0.1, 0.9, 0.4]]).unwrap();

        control.step_update_q(0, 0, 0, 0.0);

        let expected_q = (0.2 / 3.0) * (0.1 + 0.9 + 0.4) + 0.8 * 0.9;
        assert_eq!(control.strategy().max_a.get(), Some(1));
        assert!((control.q_function()[[0, 0]] - expected_q).abs() < 1e-12);
        assert_eq!(control.q_function()[[0, 1]], 0.9);
    }

    #[test]
    fn test_greedy_ties_pick_lowest_action() {
        let behaviour = RandomPolicy::new(2, 3).unwrap();
        let strategy = Recording {
            max_a: Cell::new(None),
        };
        let mut control = OffPolicyControl::new(&behaviour, strategy, 0.5, 0.9, 0.1, 1e-6).unwrap();
        control
            .set_q_function(array![[0.0, 0.0, 0.0], [0.2, 0.7, 0.7]])
            .unwrap();

        control.step_update_q(0, 0, 1, 0.0);
        assert_eq!(control.strategy().max_a.get(), Some(1));

        control.step_update_q(1, 2, 0, 0.0);
        assert_eq!(control.strategy().max_a.get(), Some(0));
    }

    #[test]
    fn test_full_exploration_is_q_learning() {
        let behaviour = RandomPolicy::new(2, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, QLambda::new(0.0).unwrap(), 1.0, 0.9, 0.5, 1e-6)
                .unwrap();
        control.set_q_function(array![[0.0, 0.0], [1.0, 3.0]]).unwrap();

        control.step_update_q(0, 1, 1, 1.0);

        // 0.5 * (1 + 0.9 * 3)
        assert!((control.q_function()[[0, 1]] - 1.85).abs() < 1e-12);
    }

    #[test]
    fn test_zero_exploration_is_uniform_expectation() {
        let behaviour = RandomPolicy::new(2, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, QLambda::new(0.0).unwrap(), 0.0, 1.0, 1.0, 1e-6)
                .unwrap();
        control.set_q_function(array![[0.0, 0.0], [1.0, 3.0]]).unwrap();

        control.step_update_q(0, 0, 1, 0.0);

        assert!((control.q_function()[[0, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_importance_sampling_trace_discount() {
        let behaviour = RandomPolicy::new(1, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, ImportanceSampling, 1.0, 1.0, 0.5, 1e-6).unwrap();
        control.set_q_function(array![[0.0, 1.0]]).unwrap();

        control.step_update_q(0, 1, 0, 0.0);
        // greedy action taken: ratio 1 / 0.5
        control.step_update_q(0, 1, 0, 0.0);
        assert!((control.traces()[0].weight - 2.0).abs() < 1e-12);

        // non-greedy action under a fully greedy target cuts everything
        control.step_update_q(0, 0, 0, 0.0);
        assert_eq!(control.traces(), &vec![Trace::new(0, 0, 1.0)]);
    }

    #[test]
    fn test_trace_discount_judges_against_next_state_greedy_action() {
        let behaviour = RandomPolicy::new(2, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, ImportanceSampling, 1.0, 1.0, 0.5, 1e-6).unwrap();
        // greedy in state 0 is action 1, greedy in state 1 is action 0
        control.set_q_function(array![[0.0, 1.0], [1.0, 0.0]]).unwrap();

        control.step_update_q(1, 0, 1, 0.0);
        assert_eq!(control.q_function()[[1, 0]], 1.0);

        // a = 0 matches the greedy action of s1 = 1, so the factor is 1 / 0.5
        control.step_update_q(0, 0, 1, 0.0);
        assert_eq!(
            control.traces(),
            &vec![Trace::new(1, 0, 2.0), Trace::new(0, 0, 1.0)]
        );

        // error 0.5 * (0 + 1 - 0), credited twice to (1, 0)
        let q = control.q_function();
        assert!((q[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((q[[1, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_exploration_bounds() {
        let behaviour = RandomPolicy::new(1, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, ImportanceSampling, 0.9, 1.0, 0.1, 1e-3).unwrap();

        assert!(control.set_exploration(0.0).is_ok());
        assert!(control.set_exploration(1.0).is_ok());
        assert_eq!(control.exploration(), 1.0);

        assert!(matches!(
            control.set_exploration(1.5),
            Err(OffTraceError::InvalidArgument(_))
        ));
        assert!(control.set_exploration(-0.1).is_err());
        assert_eq!(control.exploration(), 1.0);

        assert!(OffPolicyControl::new(&behaviour, ImportanceSampling, 2.0, 1.0, 0.1, 1e-3).is_err());
    }

    #[test]
    fn test_params_round_trip() {
        let behaviour = RandomPolicy::new(1, 2).unwrap();
        let mut control =
            OffPolicyControl::new(&behaviour, ImportanceSampling, 0.9, 1.0, 0.1, 1e-3).unwrap();

        let params = control.get_params();
        assert_eq!(params["algorithm"], "importance_sampling");
        assert_eq!(params["exploration"], 0.9);

        let rejected = json!({"exploration": 0.5, "learning_rate": 0.0});
        assert!(control.set_params(&rejected).is_err());
        assert_eq!(control.exploration(), 0.9);

        let rejected = json!({"exploration": 1.5, "learning_rate": 0.3});
        assert!(control.set_params(&rejected).is_err());
        assert_eq!(control.learning_rate(), 0.1);

        assert!(control
            .set_params(&json!({"exploration": 0.5, "learning_rate": 0.3}))
            .is_ok());
        assert_eq!(control.exploration(), 0.5);
        assert_eq!(control.learning_rate(), 0.3);
    }

    #[test]
    fn test_from_config() {
        let behaviour = RandomPolicy::new(4, 2).unwrap();
        let config = LearnerConfig {
            exploration: 0.7,
            algorithm: TraceAlgorithm::Retrace { lambda: 0.9 },
            ..LearnerConfig::default()
        };

        let control = OffPolicyControl::from_config(&behaviour, &config).unwrap();
        assert_eq!(control.name(), "retrace");
        assert_eq!(control.exploration(), 0.7);
        assert_eq!(control.state_count(), 4);
    }
}
