//! offtrace Core - Value tables, traces, policies and configuration
//!
//! This crate provides the foundational types shared by the offtrace learners.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::{LearnerConfig, TraceAlgorithm};
pub use error::{OffTraceError, Result};
pub use policy::{Policy, PolicyTable, RandomPolicy, TabularPolicy};
pub use types::{make_q_function, max_action, QFunction, Trace, Traces};
