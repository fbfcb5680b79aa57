//! Attributes and formulas
//!
//! An attribute is a named numeric quantity inside a block: either an
//! `Input` carrying a default value, or a `Calculated` carrying exactly
//! one formula plus an explicit declared dependency list. Dependencies
//! are declared, never inferred from the formula body, so the graph
//! builder works uniformly regardless of how a formula is expressed.

use indexmap::IndexMap;

use metron_foundation::{AttributeId, BlockId};

/// Function that computes a calculated attribute's value from a
/// read-only snapshot of its dependencies.
pub type FormulaFn = Box<dyn Fn(&DepSnapshot<'_>) -> f64 + Send + Sync>;

/// Read-only view of the attribute values a formula may consult,
/// restricted to its declared dependency set.
///
/// Formulas are pure functions over this snapshot; they have no access
/// to ambient state. A lookup outside the declared set returns NaN even
/// when the attribute is already materialized in the context, so an
/// undeclared read surfaces as a formula evaluation error naming the
/// offending attribute instead of silently bypassing the graph.
pub struct DepSnapshot<'a> {
    values: &'a IndexMap<AttributeId, f64>,
    declared: &'a [AttributeId],
}

impl<'a> DepSnapshot<'a> {
    pub fn new(values: &'a IndexMap<AttributeId, f64>, declared: &'a [AttributeId]) -> Self {
        Self { values, declared }
    }

    /// Look up a declared dependency's value.
    pub fn get(&self, id: &AttributeId) -> Option<f64> {
        if !self.declared.contains(id) {
            return None;
        }
        self.values.get(id).copied()
    }

    /// Look up a declared dependency's value, NaN if absent or undeclared.
    pub fn value(&self, id: impl Into<AttributeId>) -> f64 {
        self.get(&id.into()).unwrap_or(f64::NAN)
    }
}

/// Attribute kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Externally supplied; carries a default value and no formula
    Input,
    /// Formula-derived from declared dependencies
    Calculated,
}

/// A sealed attribute definition
pub struct Attribute {
    /// Qualified identity (`block.attribute`)
    pub id: AttributeId,
    /// Owning block
    pub block: BlockId,
    /// Declaration order within the model; tie-break for update order
    /// inside a cyclic group
    pub order: usize,
    /// Input default or calculated formula + dependencies
    pub spec: AttributeSpec,
}

/// The two attribute shapes
pub enum AttributeSpec {
    Input {
        default: f64,
    },
    Calculated {
        /// Explicit declared dependency identities. May be empty, but is
        /// always stated: "no dependencies" is distinct from "not declared".
        dependencies: Vec<AttributeId>,
        formula: FormulaFn,
    },
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self.spec {
            AttributeSpec::Input { .. } => AttributeKind::Input,
            AttributeSpec::Calculated { .. } => AttributeKind::Calculated,
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind() == AttributeKind::Input
    }

    /// Declared dependencies; empty for inputs.
    pub fn dependencies(&self) -> &[AttributeId] {
        match &self.spec {
            AttributeSpec::Input { .. } => &[],
            AttributeSpec::Calculated { dependencies, .. } => dependencies,
        }
    }

    /// Default value for inputs, None for calculated attributes.
    pub fn default_value(&self) -> Option<f64> {
        match &self.spec {
            AttributeSpec::Input { default } => Some(*default),
            AttributeSpec::Calculated { .. } => None,
        }
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("order", &self.order)
            .field("dependencies", &self.dependencies())
            .finish()
    }
}
