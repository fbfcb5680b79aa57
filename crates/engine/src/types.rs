//! Run options, diagnostics and results

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

use metron_foundation::AttributeId;

/// Cooperative cancellation handle for a run.
///
/// Checked between topological levels and between solver iterations;
/// a cancelled run discards its context and writes nothing to the cache.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Caller-supplied evaluation options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Iteration cap per cyclic group. Deterministic bound; reaching it
    /// yields a not-converged diagnostic, never an error.
    pub max_iterations: u32,
    /// Convergence threshold: a group converges when the maximum
    /// absolute per-iteration change across its members drops below this.
    pub threshold: f64,
    /// Optional wall-clock budget, checked between solver iterations.
    pub deadline: Option<Duration>,
    /// Optional cancellation handle.
    pub cancel: Option<CancelToken>,
}

impl RunOptions {
    /// Iteration cap and threshold; no deadline, no cancellation.
    pub fn new(max_iterations: u32, threshold: f64) -> Self {
        Self {
            max_iterations,
            threshold,
            deadline: None,
            cancel: None,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(100, 1e-6)
    }
}

/// Scheduler state machine for one run.
///
/// `Initializing → LevelProcessing → (Converging)* → Done | Exhausted`;
/// error paths end in `Failed`, cancellation in `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Initializing,
    LevelProcessing,
    Converging,
    /// Every cyclic group converged
    Done,
    /// At least one cyclic group hit its iteration or deadline budget
    Exhausted,
    Failed,
    Cancelled,
}

impl RunState {
    /// Terminal state of a run aborted by an error.
    pub fn from_error(err: &crate::error::Error) -> Self {
        match err {
            crate::error::Error::Cancelled => RunState::Cancelled,
            _ => RunState::Failed,
        }
    }
}

/// Convergence record for one cyclic group
#[derive(Debug, Clone, Serialize)]
pub struct GroupDiagnostic {
    /// Group members in update order
    pub members: Vec<AttributeId>,
    pub converged: bool,
    /// Gauss-Seidel sweeps performed
    pub iterations: u32,
    /// Maximum absolute change across members in the final sweep
    pub max_delta: f64,
}

/// Result of one evaluation run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Final value of every attribute, in declaration order
    pub values: IndexMap<AttributeId, f64>,
    /// Per-cyclic-group convergence diagnostics
    pub diagnostics: Vec<GroupDiagnostic>,
    /// Terminal scheduler state: `Done` or `Exhausted`
    pub state: RunState,
    /// Whether this result was served from the scenario-level cache
    pub cache_hit: bool,
}

impl RunResult {
    /// Convenience lookup by qualified identity.
    pub fn value(&self, id: impl Into<AttributeId>) -> Option<f64> {
        self.values.get(&id.into()).copied()
    }

    /// True when every cyclic group converged.
    pub fn converged(&self) -> bool {
        self.diagnostics.iter().all(|d| d.converged)
    }
}
