//! Off-policy engine - value table and eligibility trace bookkeeping
//!
//! [`OffPolicyBase`] owns the value table and the trace set and is the only
//! thing that mutates them. The evaluation and control learners compute a
//! TD error and a trace discount for each step and hand both to
//! [`OffPolicyBase::update_traces`].

use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};

use offtrace_core::config::validate_learning_rate;
use offtrace_core::{make_q_function, OffTraceError, Policy, QFunction, Result, Trace, Traces};

use crate::experience::Transition;

/// Shared state of every off-policy learner
pub struct OffPolicyBase<'p> {
    states: usize,
    actions: usize,
    discount: f64,
    alpha: f64,
    epsilon: f64,
    pub(crate) q: QFunction,
    traces: Traces,
    behaviour: &'p dyn Policy,
}

impl<'p> OffPolicyBase<'p> {
    /// Create an engine sized after the behaviour policy.
    ///
    /// `epsilon` is the trace cutoff and is expected to be positive;
    /// `discount` is expected in [0, 1]. Neither is checked.
    pub fn new(behaviour: &'p dyn Policy, discount: f64, alpha: f64, epsilon: f64) -> Result<Self> {
        validate_learning_rate(alpha)?;

        let states = behaviour.state_count();
        let actions = behaviour.action_count();
        if actions == 0 {
            return Err(OffTraceError::InvalidArgument(
                "Behaviour policy has no actions".to_string(),
            ));
        }

        Ok(Self {
            states,
            actions,
            discount,
            alpha,
            epsilon,
            q: make_q_function(states, actions),
            traces: Traces::new(),
            behaviour,
        })
    }

    /// Set the learning rate, which must be > 0 and <= 1
    pub fn set_learning_rate(&mut self, a: f64) -> Result<()> {
        validate_learning_rate(a)?;
        self.alpha = a;
        debug!(learning_rate = a, "Learning rate updated");
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.alpha
    }

    pub fn set_discount(&mut self, d: f64) {
        self.discount = d;
        debug!(discount = d, "Discount updated");
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Set the trace cutoff. Traces whose weight drops below it are removed.
    pub fn set_epsilon(&mut self, e: f64) {
        self.epsilon = e;
        debug!(epsilon = e, "Trace cutoff updated");
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Drop every trace, e.g. at the end of an episode
    pub fn clear_traces(&mut self) {
        debug!(dropped = self.traces.len(), "Clearing traces");
        self.traces.clear();
    }

    pub fn traces(&self) -> &Traces {
        &self.traces
    }

    /// Replace the trace set wholesale.
    ///
    /// Meant for algorithms composed on top of this engine; nothing is
    /// pruned until the next step.
    pub fn set_traces(&mut self, traces: Traces) {
        debug!(count = traces.len(), "Replacing traces");
        self.traces = traces;
    }

    pub fn state_count(&self) -> usize {
        self.states
    }

    pub fn action_count(&self) -> usize {
        self.actions
    }

    /// The value table, e.g. to build a greedy policy from it
    pub fn q_function(&self) -> &QFunction {
        &self.q
    }

    /// Replace the value table with one computed elsewhere
    pub fn set_q_function(&mut self, q: QFunction) -> Result<()> {
        if q.dim() != (self.states, self.actions) {
            return Err(OffTraceError::InvalidArgument(format!(
                "Value table must be {}x{}, got {}x{}",
                self.states,
                self.actions,
                q.nrows(),
                q.ncols()
            )));
        }
        debug!("Replacing value table");
        self.q = q;
        Ok(())
    }

    pub fn behaviour(&self) -> &'p dyn Policy {
        self.behaviour
    }

    /// `alpha * (rew + discount * expected_q - Q(s, a))`
    pub(crate) fn td_error(&self, s: usize, a: usize, rew: f64, expected_q: f64) -> f64 {
        self.alpha * (rew + self.discount * expected_q - self.q[[s, a]])
    }

    /// Apply one step's correction to the value table and the traces.
    ///
    /// Every live trace is decayed by `trace_discount` and dropped once its
    /// weight falls below the cutoff; survivors are credited
    /// `error * weight`. The current pair then receives the whole `error`
    /// and a fresh trace of weight 1.
    ///
    /// `error` must already be scaled by the learning rate. Indices are
    /// trusted to be in range.
    pub fn update_traces(&mut self, s: usize, a: usize, error: f64, trace_discount: f64) {
        debug_assert!(s < self.states && a < self.actions);

        if !trace_discount.is_finite() {
            warn!(s, a, trace_discount, "Non-finite trace discount");
        }

        let epsilon = self.epsilon;
        let q = &mut self.q;
        self.traces.retain_mut(|t| {
            t.weight *= trace_discount;
            // Negated so that NaN weights are dropped too.
            if !(t.weight.abs() >= epsilon) {
                return false;
            }
            q[[t.state, t.action]] += error * t.weight;
            true
        });

        q[[s, a]] += error;
        self.traces.push(Trace::new(s, a, 1.0));

        trace!(
            s,
            a,
            error,
            trace_discount,
            live = self.traces.len(),
            "Traces updated"
        );
    }

    /// Parameters shared by every learner, as a JSON object
    pub(crate) fn params(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("learning_rate".to_string(), json!(self.alpha));
        map.insert("discount".to_string(), json!(self.discount));
        map.insert("epsilon".to_string(), json!(self.epsilon));
        map.insert("states".to_string(), json!(self.states));
        map.insert("actions".to_string(), json!(self.actions));
        map.insert("trace_count".to_string(), json!(self.traces.len()));
        map
    }

    /// Apply the shared keys of a partial parameter update.
    ///
    /// Everything is checked before anything is stored.
    pub(crate) fn set_params(&mut self, params: &Value) -> Result<()> {
        if !params.is_object() {
            return Err(OffTraceError::Config(format!(
                "Parameters must be a JSON object, got {params}"
            )));
        }

        let learning_rate = param_f64(params, "learning_rate")?;
        let discount = param_f64(params, "discount")?;
        let epsilon = param_f64(params, "epsilon")?;

        if let Some(a) = learning_rate {
            validate_learning_rate(a)?;
        }

        if let Some(a) = learning_rate {
            self.alpha = a;
            debug!(learning_rate = a, "Learning rate updated");
        }
        if let Some(d) = discount {
            self.set_discount(d);
        }
        if let Some(e) = epsilon {
            self.set_epsilon(e);
        }
        Ok(())
    }
}

/// Read an optional numeric key out of a JSON parameter object
pub(crate) fn param_f64(params: &Value, key: &str) -> Result<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            OffTraceError::InvalidArgument(format!("Parameter {key} must be a number, got {value}"))
        }),
    }
}

/// Common interface of the off-policy learners.
///
/// `'p` is the lifetime of the borrowed policies.
pub trait OffPolicyLearner<'p> {
    /// Name of the trace-discount algorithm in use
    fn name(&self) -> &str;

    fn base(&self) -> &OffPolicyBase<'p>;

    fn base_mut(&mut self) -> &mut OffPolicyBase<'p>;

    /// Learn from one observed transition
    fn step_update_q(&mut self, s: usize, a: usize, s1: usize, rew: f64);

    /// Current parameters as JSON
    fn get_params(&self) -> Value {
        let mut map = self.base().params();
        map.insert("algorithm".to_string(), json!(self.name()));
        Value::Object(map)
    }

    /// Apply a partial parameter update; nothing changes if any value is rejected
    fn set_params(&mut self, params: &Value) -> Result<()> {
        self.base_mut().set_params(params)
    }

    /// Step through a recorded sequence of transitions in order
    fn learn(&mut self, transitions: &[Transition]) {
        for t in transitions {
            self.step_update_q(t.state, t.action, t.next_state, t.reward);
        }
    }

    /// Forget the traces of the episode that just ended
    fn end_episode(&mut self) {
        self.base_mut().clear_traces();
    }

    fn set_learning_rate(&mut self, a: f64) -> Result<()> {
        self.base_mut().set_learning_rate(a)
    }

    fn learning_rate(&self) -> f64 {
        self.base().learning_rate()
    }

    fn set_discount(&mut self, d: f64) {
        self.base_mut().set_discount(d);
    }

    fn discount(&self) -> f64 {
        self.base().discount()
    }

    fn set_epsilon(&mut self, e: f64) {
        self.base_mut().set_epsilon(e);
    }

    fn epsilon(&self) -> f64 {
        self.base().epsilon()
    }

    fn clear_traces(&mut self) {
        self.base_mut().clear_traces();
    }

    fn traces<'a>(&'a self) -> &'a Traces
    where
        'p: 'a,
    {
        self.base().traces()
    }

    fn set_traces(&mut self, traces: Traces) {
        self.base_mut().set_traces(traces);
    }

    fn q_function<'a>(&'a self) -> &'a QFunction
    where
        'p: 'a,
    {
        self.base().q_function()
    }

    fn set_q_function(&mut self, q: QFunction) -> Result<()> {
        self.base_mut().set_q_function(q)
    }

    fn state_count(&self) -> usize {
        self.base().state_count()
    }

    fn action_count(&self) -> usize {
        self.base().action_count()
    }
}
