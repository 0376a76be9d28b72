//! offtrace RL - Off-policy temporal-difference learning with eligibility traces
//!
//! This crate provides one trace engine shared by two learners:
//! [`OffPolicyEvaluation`] estimates the values of an explicit target
//! policy, [`OffPolicyControl`] learns optimal values against an implicit
//! epsilon-greedy target. The amount of credit earlier visits keep each
//! step is decided by a pluggable algorithm (importance sampling,
//! Retrace(λ), tree-backup(λ), Q(λ)).
//!
//! Learners borrow their policies, which must outlive them. State and
//! action indices handed to a learner are trusted to be in range.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod algorithm;
pub mod control;
pub mod engine;
pub mod evaluation;
pub mod experience;

pub use algorithm::{
    ControlTraceDiscount, ControlView, EvaluationTraceDiscount, EvaluationView,
    ImportanceSampling, QLambda, RetraceLambda, TraceStrategy, TreeBackupLambda,
};
pub use control::OffPolicyControl;
pub use engine::{OffPolicyBase, OffPolicyLearner};
pub use evaluation::OffPolicyEvaluation;
pub use experience::Transition;
