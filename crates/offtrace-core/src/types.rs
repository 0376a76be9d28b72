//! Value table and trace types shared across offtrace

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Dense `S x A` table of action-value estimates, row-major by state.
pub type QFunction = Array2<f64>;

/// Create a zeroed value table for `s` states and `a` actions
pub fn make_q_function(s: usize, a: usize) -> QFunction {
    QFunction::zeros((s, a))
}

/// Greedy action over one row of a value table.
///
/// Ties go to the lowest index: the scan keeps the first maximum it meets.
/// Returns `(action, value)`; an empty row yields `(0, f64::NEG_INFINITY)`.
pub fn max_action(row: ArrayView1<'_, f64>) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (action, &value) in row.iter().enumerate() {
        if action == 0 || value > best.1 {
            best = (action, value);
        }
    }
    best
}

/// Decaying credit for one visit of a (state, action) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub state: usize,
    pub action: usize,
    pub weight: f64,
}

impl Trace {
    /// Create a new trace
    pub fn new(state: usize, action: usize, weight: f64) -> Self {
        Self {
            state,
            action,
            weight,
        }
    }
}

/// Ordered set of live traces, in insertion order.
pub type Traces = Vec<Trace>;
