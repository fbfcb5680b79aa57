//! Scenario store
//!
//! A scenario is a named set of input overrides applied on top of the
//! model's defaults. Overrides are validated against the sealed model
//! at definition time; a scenario can only ever target input
//! attributes. Resolution is a layered merge (defaults first, then the
//! named scenario's overrides) producing a total mapping over every
//! input attribute.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use metron_foundation::{AttributeId, ScenarioId};

use crate::def::ScenarioDef;
use crate::error::{DefinitionError, Result};
use crate::registry::SealedModel;

/// The scenario every store starts with: no overrides, pure defaults.
pub const BASELINE: &str = "baseline";

/// A named input-override set
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: ScenarioId,
    pub overrides: IndexMap<AttributeId, f64>,
}

/// Named scenarios over one sealed model
pub struct ScenarioStore {
    model: Arc<SealedModel>,
    scenarios: IndexMap<ScenarioId, Scenario>,
}

impl ScenarioStore {
    /// Create a store for a sealed model, seeded with the empty
    /// [`BASELINE`] scenario.
    pub fn new(model: Arc<SealedModel>) -> Self {
        let mut scenarios = IndexMap::new();
        let baseline = ScenarioId::from(BASELINE);
        scenarios.insert(
            baseline.clone(),
            Scenario {
                id: baseline,
                overrides: IndexMap::new(),
            },
        );
        Self { model, scenarios }
    }

    /// The model this store validates against.
    pub fn model(&self) -> &Arc<SealedModel> {
        &self.model
    }

    /// Define a named scenario. Every override must target an existing
    /// input attribute.
    pub fn define_scenario(
        &mut self,
        name: impl Into<ScenarioId>,
        overrides: impl IntoIterator<Item = (AttributeId, f64)>,
    ) -> Result<ScenarioId> {
        let id = name.into();
        if self.scenarios.contains_key(&id) {
            return Err(DefinitionError::DuplicateScenario(id));
        }

        let mut validated = IndexMap::new();
        for (attr, value) in overrides {
            match self.model.resolve(&attr) {
                None => {
                    return Err(DefinitionError::InvalidOverride {
                        scenario: id,
                        attribute: attr,
                        reason: "does not exist",
                    });
                }
                Some(def) if !def.is_input() => {
                    return Err(DefinitionError::InvalidOverride {
                        scenario: id,
                        attribute: attr,
                        reason: "targets a calculated attribute",
                    });
                }
                Some(_) => {
                    validated.insert(attr, value);
                }
            }
        }

        debug!(scenario = %id, overrides = validated.len(), "scenario defined");
        self.scenarios.insert(
            id.clone(),
            Scenario {
                id: id.clone(),
                overrides: validated,
            },
        );
        Ok(id)
    }

    /// Define a scenario from its serde-facing definition.
    pub fn load_def(&mut self, def: &ScenarioDef) -> Result<ScenarioId> {
        let overrides = def
            .overrides
            .iter()
            .map(|(name, value)| (AttributeId::from(name.as_str()), *value));
        self.define_scenario(def.name.as_str(), overrides)
    }

    /// Look up a scenario by name.
    pub fn get(&self, id: &ScenarioId) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    /// Resolve the effective value of every input attribute under a
    /// scenario: defaults first, then the scenario's overrides.
    ///
    /// The result is total over the model's inputs and deterministic
    /// (declaration order).
    pub fn resolve_inputs(&self, id: &ScenarioId) -> Result<IndexMap<AttributeId, f64>> {
        let scenario = self
            .scenarios
            .get(id)
            .ok_or_else(|| DefinitionError::UnknownScenario(id.clone()))?;

        let mut resolved: IndexMap<AttributeId, f64> = self
            .model
            .inputs()
            .map(|(attr, default)| (attr.clone(), default))
            .collect();
        for (attr, value) in &scenario.overrides {
            resolved.insert(attr.clone(), *value);
        }
        Ok(resolved)
    }
}
