//! Definition errors
//!
//! All of these are fatal at model-load time: a model that fails
//! validation never becomes a [`crate::SealedModel`].

use thiserror::Error;

use metron_foundation::{AttributeId, BlockId, ScenarioId};

/// Model-definition result type
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Errors raised while defining or validating a model
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("duplicate block: {0}")]
    DuplicateBlock(BlockId),

    #[error("duplicate attribute: {0}")]
    DuplicateAttribute(AttributeId),

    #[error("unknown block: {0}")]
    UnknownBlock(BlockId),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(AttributeId),

    #[error("{attribute} declares unknown dependency {dependency}")]
    UnknownDependency {
        attribute: AttributeId,
        dependency: AttributeId,
    },

    #[error("calculated attribute {0} has no formula bound")]
    MissingFormula(AttributeId),

    #[error("formula bound to input attribute {0}")]
    UnexpectedFormula(AttributeId),

    #[error("duplicate scenario: {0}")]
    DuplicateScenario(ScenarioId),

    #[error("unknown scenario: {0}")]
    UnknownScenario(ScenarioId),

    #[error("invalid override in scenario {scenario}: {attribute} {reason}")]
    InvalidOverride {
        scenario: ScenarioId,
        attribute: AttributeId,
        reason: &'static str,
    },
}
