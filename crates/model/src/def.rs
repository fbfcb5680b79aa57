//! Serde-facing definition types
//!
//! The boundary where an upstream pipeline hands models over as data.
//! Structure (blocks, attributes, dependencies, defaults) travels as a
//! [`ModelDef`]; formulas are code and bind separately by identity via
//! [`crate::ModelRegistry::bind_formula`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A complete model definition: a set of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub blocks: Vec<BlockDef>,
}

/// A named block and its attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    pub attributes: Vec<AttributeDef>,
}

/// An attribute definition: an input with a default, or a calculated
/// attribute with its declared dependency identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeDef {
    Input {
        name: String,
        default: f64,
    },
    Calculated {
        name: String,
        /// Qualified identities (`block.attribute`) this formula reads.
        dependencies: Vec<String>,
    },
}

/// A named scenario definition: overrides keyed by qualified identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,
    #[serde(default)]
    pub overrides: IndexMap<String, f64>,
}
