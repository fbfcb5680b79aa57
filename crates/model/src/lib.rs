//! Metron Model
//!
//! Immutable model definitions: blocks, attributes and their declared
//! dependencies, plus named scenarios (input-override sets).
//!
//! A model is assembled through a mutable [`ModelRegistry`], then
//! [`ModelRegistry::seal`]ed into an immutable [`SealedModel`] that is
//! safe to share across concurrent evaluation runs. Scenarios are
//! validated against a sealed model at definition time.

pub mod attribute;
pub mod def;
pub mod error;
pub mod registry;
pub mod scenario;

pub use attribute::{Attribute, AttributeKind, AttributeSpec, DepSnapshot, FormulaFn};
pub use def::{AttributeDef, BlockDef, ModelDef, ScenarioDef};
pub use error::{DefinitionError, Result};
pub use registry::{ModelRegistry, SealedModel};
pub use scenario::{Scenario, ScenarioStore};
