//! Simulation engine facade
//!
//! Composes the graph builder, analyzer, scheduler and cache behind
//! `run(scenario, options)`. The dependency graph and its analysis are
//! computed once per engine: the sealed model is immutable, so they
//! never change across runs.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use metron_foundation::{AttributeId, ScenarioId};
use metron_model::{ScenarioStore, SealedModel};

use crate::analyze::{analyze, Analysis};
use crate::cache::{CacheEntry, CacheManager, Lookup};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::schedule::Scheduler;
use crate::types::{RunOptions, RunResult};

/// Evaluates scenarios over one sealed model.
///
/// Safe to share across threads: runs own their context exclusively,
/// and the cache is the only shared mutable state.
pub struct SimulationEngine {
    scenarios: ScenarioStore,
    graph: DependencyGraph,
    analysis: Analysis,
    cache: CacheManager,
}

impl SimulationEngine {
    /// Build an engine over a scenario store (which carries the sealed
    /// model). Fails if the declared dependencies do not form a valid
    /// graph.
    pub fn new(scenarios: ScenarioStore) -> Result<Self> {
        let graph = DependencyGraph::build(scenarios.model())?;
        let analysis = analyze(&graph);
        info!(
            attributes = graph.node_count(),
            components = analysis.components.len(),
            cyclic = analysis.cyclic_count(),
            "engine ready"
        );
        Ok(Self {
            scenarios,
            graph,
            analysis,
            cache: CacheManager::new(),
        })
    }

    pub fn model(&self) -> &Arc<SealedModel> {
        self.scenarios.model()
    }

    pub fn scenarios(&self) -> &ScenarioStore {
        &self.scenarios
    }

    /// Define a scenario on the underlying store. Existing cache
    /// entries are unaffected: fingerprints include the scenario name.
    pub fn define_scenario(
        &mut self,
        name: impl Into<ScenarioId>,
        overrides: impl IntoIterator<Item = (AttributeId, f64)>,
    ) -> Result<ScenarioId> {
        Ok(self.scenarios.define_scenario(name, overrides)?)
    }

    /// Evaluate a scenario.
    ///
    /// Deterministic for fixed (model version, scenario, options).
    /// Consults the cache first; on a miss, computes under a
    /// single-flight guard and stores the result. Results cut short by
    /// a wall-clock deadline, and failed or cancelled runs, are never
    /// cached.
    #[instrument(skip_all)]
    pub fn run(&self, scenario_name: impl Into<ScenarioId>, opts: &RunOptions) -> Result<RunResult> {
        let scenario = scenario_name.into();
        debug!(scenario = %scenario, "run requested");
        if self.scenarios.get(&scenario).is_none() {
            return Err(Error::ScenarioNotFound(scenario));
        }
        let inputs = self.scenarios.resolve_inputs(&scenario)?;

        let model = self.scenarios.model();
        let fingerprint =
            CacheManager::fingerprint(model.version(), &scenario, &inputs, opts);

        match self.cache.lookup_or_begin(fingerprint) {
            Lookup::Hit(entry) => {
                debug!(fingerprint, "serving cached result");
                Ok(RunResult {
                    values: (*entry.values).clone(),
                    diagnostics: (*entry.diagnostics).clone(),
                    state: entry.state,
                    cache_hit: true,
                })
            }
            Lookup::Miss(flight) => {
                let warm = self.cache.warm_hints(&scenario);
                let scheduler = Scheduler::new(model, &self.graph, &self.analysis);
                // An Err drops the flight guard: nothing is cached and
                // waiters take over
                let outcome = scheduler.execute(&inputs, warm.as_deref(), opts)?;

                let result = RunResult {
                    values: outcome.values,
                    diagnostics: outcome.diagnostics,
                    state: outcome.state,
                    cache_hit: false,
                };
                if outcome.deadline_hit {
                    debug!(fingerprint, "deadline cut the run short, not caching");
                    drop(flight);
                } else {
                    flight.complete(CacheEntry {
                        fingerprint,
                        scenario,
                        inputs: Arc::new(inputs),
                        values: Arc::new(result.values.clone()),
                        diagnostics: Arc::new(result.diagnostics.clone()),
                        state: result.state,
                    });
                }
                Ok(result)
            }
        }
    }

    /// Report an upstream change to a single input's effective value.
    ///
    /// Uses the reverse-dependency index to drop only cache entries the
    /// change can actually affect; see
    /// [`CacheManager::invalidate_input`].
    pub fn invalidate_input(&self, input: &AttributeId, new_value: f64) {
        let closure = self.graph.downstream_closure(input);
        self.cache.invalidate_input(input, new_value, &closure);
    }

    /// Number of cached scenario-level results.
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Drop all cached results.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
