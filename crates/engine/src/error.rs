//! Engine errors
//!
//! Runtime errors are scoped to one run: they abort that run, leave the
//! cache untouched, and carry enough context (attribute identity,
//! iteration number) to diagnose. Convergence shortfalls are not errors;
//! they are diagnostics on the run result.

use thiserror::Error;

use metron_foundation::{AttributeId, ScenarioId};
use metron_model::DefinitionError;

/// Engine result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised during evaluation
#[derive(Debug, Error)]
pub enum Error {
    #[error("scenario not found: {0}")]
    ScenarioNotFound(ScenarioId),

    #[error("formula for {attribute} produced {message} at iteration {iteration}")]
    FormulaEvaluation {
        attribute: AttributeId,
        /// 0 for acyclic evaluation, 1-based sweep count inside a cyclic group
        iteration: u32,
        message: &'static str,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
