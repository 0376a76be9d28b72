//! Observed transitions

use serde::{Deserialize, Serialize};

/// A single experience tuple (s, a, s', r)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: usize,
    pub action: usize,
    pub next_state: usize,
    pub reward: f64,
}

impl Transition {
    /// Create a new transition
    pub fn new(state: usize, action: usize, next_state: usize, reward: f64) -> Self {
        Self {
            state,
            action,
            next_state,
            reward,
        }
    }
}
