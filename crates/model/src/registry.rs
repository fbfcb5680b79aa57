//! Model registry
//!
//! Mutable assembly of blocks and attributes, sealed into an immutable
//! [`SealedModel`]. Dependency validation runs once at seal time, after
//! all definitions are loaded, so forward references within the same
//! load are allowed. Sealing consumes the registry: there is no way to
//! mutate a model that evaluation runs can observe.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use metron_foundation::{
    fnv1a64_f64, fnv1a64_mix, AttributeId, BlockId, FNV1A_OFFSET_BASIS_64,
};

use crate::attribute::{Attribute, AttributeKind, AttributeSpec, FormulaFn};
use crate::def::{AttributeDef, ModelDef};
use crate::error::{DefinitionError, Result};

/// Pre-seal attribute declaration. Calculated attributes may be
/// declared before their formula is bound (the data-definition path);
/// seal rejects any still-unbound formula.
struct AttributeDecl {
    block: BlockId,
    spec: DeclSpec,
}

enum DeclSpec {
    Input {
        default: f64,
    },
    Calculated {
        dependencies: Vec<AttributeId>,
        formula: Option<FormulaFn>,
    },
}

/// Mutable model under construction
#[derive(Default)]
pub struct ModelRegistry {
    blocks: IndexMap<BlockId, IndexSet<AttributeId>>,
    attributes: IndexMap<AttributeId, AttributeDecl>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a named block (attribute namespace).
    pub fn define_block(&mut self, name: impl Into<BlockId>) -> Result<BlockId> {
        let id = name.into();
        if self.blocks.contains_key(&id) {
            return Err(DefinitionError::DuplicateBlock(id));
        }
        debug!(block = %id, "block defined");
        self.blocks.insert(id.clone(), IndexSet::new());
        Ok(id)
    }

    /// Define an input attribute with a default value.
    pub fn define_input(
        &mut self,
        block: &BlockId,
        name: &str,
        default: f64,
    ) -> Result<AttributeId> {
        self.insert(block, name, DeclSpec::Input { default })
    }

    /// Define a calculated attribute with its formula and declared
    /// dependencies.
    pub fn define_calculated(
        &mut self,
        block: &BlockId,
        name: &str,
        dependencies: impl IntoIterator<Item = AttributeId>,
        formula: FormulaFn,
    ) -> Result<AttributeId> {
        self.insert(
            block,
            name,
            DeclSpec::Calculated {
                dependencies: dependencies.into_iter().collect(),
                formula: Some(formula),
            },
        )
    }

    /// Declare a calculated attribute without a formula. The formula
    /// must be bound via [`bind_formula`](Self::bind_formula) before
    /// seal. Used when model structure arrives as data (see
    /// [`load_def`](Self::load_def)).
    pub fn declare_calculated(
        &mut self,
        block: &BlockId,
        name: &str,
        dependencies: impl IntoIterator<Item = AttributeId>,
    ) -> Result<AttributeId> {
        self.insert(
            block,
            name,
            DeclSpec::Calculated {
                dependencies: dependencies.into_iter().collect(),
                formula: None,
            },
        )
    }

    /// Bind a formula to a previously declared calculated attribute.
    pub fn bind_formula(&mut self, id: &AttributeId, formula: FormulaFn) -> Result<()> {
        let decl = self
            .attributes
            .get_mut(id)
            .ok_or_else(|| DefinitionError::UnknownAttribute(id.clone()))?;
        match &mut decl.spec {
            DeclSpec::Input { .. } => Err(DefinitionError::UnexpectedFormula(id.clone())),
            DeclSpec::Calculated { formula: slot, .. } => {
                *slot = Some(formula);
                Ok(())
            }
        }
    }

    /// Load a serde-facing model definition (blocks and attribute
    /// structure). Formulas are code, not data: bind them afterwards
    /// with [`bind_formula`](Self::bind_formula).
    pub fn load_def(&mut self, def: &ModelDef) -> Result<()> {
        for block_def in &def.blocks {
            let block = self.define_block(block_def.name.as_str())?;
            for attr in &block_def.attributes {
                match attr {
                    AttributeDef::Input { name, default } => {
                        self.define_input(&block, name, *default)?;
                    }
                    AttributeDef::Calculated { name, dependencies } => {
                        let deps = dependencies.iter().map(|d| AttributeId::from(d.as_str()));
                        self.declare_calculated(&block, name, deps)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, block: &BlockId, name: &str, spec: DeclSpec) -> Result<AttributeId> {
        let members = self
            .blocks
            .get_mut(block)
            .ok_or_else(|| DefinitionError::UnknownBlock(block.clone()))?;
        let id = AttributeId::qualified(block, name);
        if self.attributes.contains_key(&id) {
            return Err(DefinitionError::DuplicateAttribute(id));
        }
        members.insert(id.clone());
        self.attributes.insert(
            id.clone(),
            AttributeDecl {
                block: block.clone(),
                spec,
            },
        );
        Ok(id)
    }

    /// Validate the full definition set and freeze it.
    ///
    /// Checks that every declared dependency resolves to an existing
    /// attribute and that every calculated attribute has a formula
    /// bound. On success the registry is consumed; the returned model
    /// is immutable and safe for concurrent reads.
    pub fn seal(self) -> Result<SealedModel> {
        // Validate dependencies against the complete attribute set
        for (id, decl) in &self.attributes {
            if let DeclSpec::Calculated { dependencies, .. } = &decl.spec {
                for dep in dependencies {
                    if !self.attributes.contains_key(dep) {
                        return Err(DefinitionError::UnknownDependency {
                            attribute: id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let version = self.structural_version();

        let mut attributes = IndexMap::with_capacity(self.attributes.len());
        for (order, (id, decl)) in self.attributes.into_iter().enumerate() {
            let spec = match decl.spec {
                DeclSpec::Input { default } => AttributeSpec::Input { default },
                DeclSpec::Calculated {
                    dependencies,
                    formula,
                } => AttributeSpec::Calculated {
                    dependencies,
                    formula: formula.ok_or_else(|| DefinitionError::MissingFormula(id.clone()))?,
                },
            };
            attributes.insert(
                id.clone(),
                Attribute {
                    id,
                    block: decl.block,
                    order,
                    spec,
                },
            );
        }

        info!(
            version,
            blocks = self.blocks.len(),
            attributes = attributes.len(),
            "model sealed"
        );

        Ok(SealedModel {
            version,
            blocks: self.blocks,
            attributes,
        })
    }

    /// Stable hash of the model structure: attribute identities, kinds,
    /// input defaults and declared dependencies, in declaration order.
    /// This is the model version cache fingerprints are keyed on.
    fn structural_version(&self) -> u64 {
        let mut h = FNV1A_OFFSET_BASIS_64;
        for (id, decl) in &self.attributes {
            h = fnv1a64_mix(h, id.as_str().as_bytes());
            match &decl.spec {
                DeclSpec::Input { default } => {
                    h = fnv1a64_mix(h, b"input");
                    h = fnv1a64_f64(h, *default);
                }
                DeclSpec::Calculated { dependencies, .. } => {
                    h = fnv1a64_mix(h, b"calculated");
                    for dep in dependencies {
                        h = fnv1a64_mix(h, dep.as_str().as_bytes());
                    }
                }
            }
        }
        h
    }
}

/// Immutable, validated model. Shared behind `Arc` across runs.
pub struct SealedModel {
    version: u64,
    blocks: IndexMap<BlockId, IndexSet<AttributeId>>,
    attributes: IndexMap<AttributeId, Attribute>,
}

impl SealedModel {
    /// Structural model version; part of every cache fingerprint.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Resolve an attribute identity.
    pub fn resolve(&self, id: &AttributeId) -> Option<&Attribute> {
        self.attributes.get(id)
    }

    /// All attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// All attribute identities in declaration order.
    pub fn attribute_ids(&self) -> impl Iterator<Item = &AttributeId> {
        self.attributes.keys()
    }

    /// Input attributes and their defaults, in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = (&AttributeId, f64)> {
        self.attributes.iter().filter_map(|(id, attr)| {
            attr.default_value().map(|default| (id, default))
        })
    }

    /// Member identities of a block.
    pub fn block_members(&self, block: &BlockId) -> Option<&IndexSet<AttributeId>> {
        self.blocks.get(block)
    }

    /// Kind of an attribute, if it exists.
    pub fn kind(&self, id: &AttributeId) -> Option<AttributeKind> {
        self.resolve(id).map(Attribute::kind)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
