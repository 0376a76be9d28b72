//! Trace-discount algorithms
//!
//! Each step, a learner asks its algorithm how much credit earlier visits
//! keep. The factor returned is the full per-step multiplier applied to
//! every live trace, so the built-in algorithms fold the environment
//! discount into it:
//!
//! | algorithm              | factor                              |
//! |------------------------|-------------------------------------|
//! | [`ImportanceSampling`] | `γ · π(s, a) / μ(s, a)`             |
//! | [`RetraceLambda`]      | `γ · λ · min(1, π(s, a) / μ(s, a))` |
//! | [`TreeBackupLambda`]   | `γ · λ · π(s, a)`                   |
//! | [`QLambda`]            | `γ · λ`                             |
//!
//! `μ` is the behaviour policy. `π` is the target policy when evaluating
//! and the implicit epsilon-greedy target when learning control.
//!
//! Importance ratios are unbounded: a behaviour policy that rarely picks an
//! action the target likes inflates traces, and only the cutoff keeps them
//! in check. Retrace and tree-backup exist to avoid that.

use offtrace_core::config::validate_lambda;
use offtrace_core::{Policy, Result, TraceAlgorithm};

/// What an evaluation algorithm may look at when computing its factor
pub struct EvaluationView<'v> {
    pub target: &'v dyn Policy,
    pub behaviour: &'v dyn Policy,
    pub discount: f64,
}

impl EvaluationView<'_> {
    /// `π(s, a) / μ(s, a)`
    pub fn importance_ratio(&self, s: usize, a: usize) -> f64 {
        self.target.action_probability(s, a) / self.behaviour.action_probability(s, a)
    }
}

/// What a control algorithm may look at when computing its factor
pub struct ControlView<'v> {
    pub behaviour: &'v dyn Policy,
    pub discount: f64,
    pub exploration: f64,
    pub action_count: usize,
}

impl ControlView<'_> {
    /// Probability the epsilon-greedy target assigns to `a` when `max_a` is greedy
    pub fn target_probability(&self, a: usize, max_a: usize) -> f64 {
        let base = (1.0 - self.exploration) / self.action_count as f64;
        if a == max_a {
            base + self.exploration
        } else {
            base
        }
    }

    /// `π(s, a) / μ(s, a)`, with `π` greedy on `max_a`
    pub fn importance_ratio(&self, s: usize, a: usize, max_a: usize) -> f64 {
        self.target_probability(a, max_a) / self.behaviour.action_probability(s, a)
    }
}

/// Common part of every trace-discount algorithm
pub trait TraceStrategy {
    fn name(&self) -> &str;

    fn lambda(&self) -> Option<f64> {
        None
    }
}

/// Trace discount for evaluating an explicit target policy
pub trait EvaluationTraceDiscount: TraceStrategy {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
    ) -> f64;
}

/// Trace discount for control against the implicit epsilon-greedy target.
///
/// `max_a` is the greedy action in `s1`, already computed by the learner.
pub trait ControlTraceDiscount: TraceStrategy {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
        max_a: usize,
    ) -> f64;
}

impl<T: TraceStrategy + ?Sized> TraceStrategy for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn lambda(&self) -> Option<f64> {
        (**self).lambda()
    }
}

impl<T: EvaluationTraceDiscount + ?Sized> EvaluationTraceDiscount for Box<T> {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
    ) -> f64 {
        (**self).trace_discount(view, s, a, s1, rew)
    }
}

impl<T: ControlTraceDiscount + ?Sized> ControlTraceDiscount for Box<T> {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
        max_a: usize,
    ) -> f64 {
        (**self).trace_discount(view, s, a, s1, rew, max_a)
    }
}

/// Plain per-decision importance sampling
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceSampling;

impl TraceStrategy for ImportanceSampling {
    fn name(&self) -> &str {
        "importance_sampling"
    }
}

impl EvaluationTraceDiscount for ImportanceSampling {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        _: usize,
        _: f64,
    ) -> f64 {
        view.discount * view.importance_ratio(s, a)
    }
}

impl ControlTraceDiscount for ImportanceSampling {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        s: usize,
        a: usize,
        _: usize,
        _: f64,
        max_a: usize,
    ) -> f64 {
        view.discount * view.importance_ratio(s, a, max_a)
    }
}

/// Retrace(λ), Munos et al. 2016
#[derive(Debug, Clone, Copy)]
pub struct RetraceLambda {
    lambda: f64,
}

impl RetraceLambda {
    pub fn new(lambda: f64) -> Result<Self> {
        validate_lambda(lambda)?;
        Ok(Self { lambda })
    }
}

impl TraceStrategy for RetraceLambda {
    fn name(&self) -> &str {
        "retrace"
    }

    fn lambda(&self) -> Option<f64> {
        Some(self.lambda)
    }
}

impl EvaluationTraceDiscount for RetraceLambda {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        _: usize,
        _: f64,
    ) -> f64 {
        view.discount * self.lambda * view.importance_ratio(s, a).min(1.0)
    }
}

impl ControlTraceDiscount for RetraceLambda {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        s: usize,
        a: usize,
        _: usize,
        _: f64,
        max_a: usize,
    ) -> f64 {
        view.discount * self.lambda * view.importance_ratio(s, a, max_a).min(1.0)
    }
}

/// Tree-backup(λ), Precup et al. 2000
#[derive(Debug, Clone, Copy)]
pub struct TreeBackupLambda {
    lambda: f64,
}

impl TreeBackupLambda {
    pub fn new(lambda: f64) -> Result<Self> {
        validate_lambda(lambda)?;
        Ok(Self { lambda })
    }
}

impl TraceStrategy for TreeBackupLambda {
    fn name(&self) -> &str {
        "tree_backup"
    }

    fn lambda(&self) -> Option<f64> {
        Some(self.lambda)
    }
}

impl EvaluationTraceDiscount for TreeBackupLambda {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        _: usize,
        _: f64,
    ) -> f64 {
        view.discount * self.lambda * view.target.action_probability(s, a)
    }
}

impl ControlTraceDiscount for TreeBackupLambda {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        _: usize,
        a: usize,
        _: usize,
        _: f64,
        max_a: usize,
    ) -> f64 {
        view.discount * self.lambda * view.target_probability(a, max_a)
    }
}

/// Q(λ) with no off-policy correction, Harutyunyan et al. 2016.
///
/// Only safe when target and behaviour stay close.
#[derive(Debug, Clone, Copy)]
pub struct QLambda {
    lambda: f64,
}

impl QLambda {
    pub fn new(lambda: f64) -> Result<Self> {
        validate_lambda(lambda)?;
        Ok(Self { lambda })
    }
}

impl TraceStrategy for QLambda {
    fn name(&self) -> &str {
        "q_lambda"
    }

    fn lambda(&self) -> Option<f64> {
        Some(self.lambda)
    }
}

impl EvaluationTraceDiscount for QLambda {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        _: usize,
        _: usize,
        _: usize,
        _: f64,
    ) -> f64 {
        view.discount * self.lambda
    }
}

impl ControlTraceDiscount for QLambda {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        _: usize,
        _: usize,
        _: usize,
        _: f64,
        _: usize,
    ) -> f64 {
        view.discount * self.lambda
    }
}

// Config-selected algorithms dispatch at runtime.

impl TraceStrategy for TraceAlgorithm {
    fn name(&self) -> &str {
        TraceAlgorithm::name(self)
    }

    fn lambda(&self) -> Option<f64> {
        TraceAlgorithm::lambda(self)
    }
}

impl EvaluationTraceDiscount for TraceAlgorithm {
    fn trace_discount(
        &self,
        view: &EvaluationView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
    ) -> f64 {
        match *self {
            TraceAlgorithm::ImportanceSampling => {
                let is = ImportanceSampling;
                EvaluationTraceDiscount::trace_discount(&is, view, s, a, s1, rew)
            }
            TraceAlgorithm::Retrace { lambda } => {
                let retrace = RetraceLambda { lambda };
                EvaluationTraceDiscount::trace_discount(&retrace, view, s, a, s1, rew)
            }
            TraceAlgorithm::TreeBackup { lambda } => {
                let tree_backup = TreeBackupLambda { lambda };
                EvaluationTraceDiscount::trace_discount(&tree_backup, view, s, a, s1, rew)
            }
            TraceAlgorithm::QLambda { lambda } => {
                let q_lambda = QLambda { lambda };
                EvaluationTraceDiscount::trace_discount(&q_lambda, view, s, a, s1, rew)
            }
        }
    }
}

impl ControlTraceDiscount for TraceAlgorithm {
    fn trace_discount(
        &self,
        view: &ControlView<'_>,
        s: usize,
        a: usize,
        s1: usize,
        rew: f64,
        max_a: usize,
    ) -> f64 {
        match *self {
            TraceAlgorithm::ImportanceSampling => {
                let is = ImportanceSampling;
                ControlTraceDiscount::trace_discount(&is, view, s, a, s1, rew, max_a)
            }
            TraceAlgorithm::Retrace { lambda } => {
                let retrace = RetraceLambda { lambda };
                ControlTraceDiscount::trace_discount(&retrace, view, s, a, s1, rew, max_a)
            }
            TraceAlgorithm::TreeBackup { lambda } => {
                let tree_backup = TreeBackupLambda { lambda };
                ControlTraceDiscount::trace_discount(&tree_backup, view, s, a, s1, rew, max_a)
            }
            TraceAlgorithm::QLambda { lambda } => {
                let q_lambda = QLambda { lambda };
                ControlTraceDiscount::trace_discount(&q_lambda, view, s, a, s1, rew, max_a)
            }
        }
    }
}
