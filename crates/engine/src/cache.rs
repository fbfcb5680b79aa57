//! Scenario-level result cache
//!
//! Entries are keyed by a stable fingerprint of (model version,
//! scenario, resolved inputs, value-affecting options) and are immutable
//! once written; superseding a fingerprint replaces the entry. A hit
//! short-circuits the entire scheduler.
//!
//! Concurrency discipline is single-flight per fingerprint: the first
//! caller computes, concurrent callers for the same fingerprint block
//! until the flight finishes. A failed or cancelled flight caches
//! nothing; its waiters simply become the next leader.
//!
//! Invalidation is dependency-aware: when an upstream input changes,
//! only entries whose recorded value for that input is stale are
//! dropped. Attribute values outside the input's transitive downstream
//! closure are provably unaffected and are retained as warm-start
//! seeds for the recompute.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use metron_foundation::{fnv1a64_f64, fnv1a64_mix, AttributeId, ScenarioId, FNV1A_OFFSET_BASIS_64};

use crate::types::{GroupDiagnostic, RunOptions, RunState};

/// One cached run result
#[derive(Clone)]
pub struct CacheEntry {
    pub fingerprint: u64,
    pub scenario: ScenarioId,
    /// Resolved inputs the result was computed from
    pub inputs: Arc<IndexMap<AttributeId, f64>>,
    /// Final context snapshot
    pub values: Arc<IndexMap<AttributeId, f64>>,
    pub diagnostics: Arc<Vec<GroupDiagnostic>>,
    /// `Done` or `Exhausted`
    pub state: RunState,
}

struct CacheState {
    entries: IndexMap<u64, CacheEntry>,
    in_flight: HashSet<u64>,
    /// Latest snapshot per scenario, kept for warm-starting cyclic
    /// groups even after the entry itself is invalidated
    warm: IndexMap<ScenarioId, Arc<IndexMap<AttributeId, f64>>>,
}

/// Cross-run result cache with single-flight writes.
pub struct CacheManager {
    state: Mutex<CacheState>,
    flights: Condvar,
}

/// Outcome of a cache lookup: a hit, or leadership of the flight that
/// must compute the missing entry.
pub enum Lookup<'a> {
    Hit(CacheEntry),
    Miss(FlightGuard<'a>),
}

/// Leadership of one in-progress computation. Completing publishes the
/// entry and wakes waiters; dropping without completing (error or
/// cancellation path) wakes them without publishing anything.
pub struct FlightGuard<'a> {
    cache: &'a CacheManager,
    fingerprint: u64,
    completed: bool,
}

impl FlightGuard<'_> {
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Publish the computed entry.
    pub fn complete(mut self, entry: CacheEntry) {
        let mut state = self.cache.state.lock().expect("cache lock poisoned");
        state.in_flight.remove(&self.fingerprint);
        state
            .warm
            .insert(entry.scenario.clone(), Arc::clone(&entry.values));
        state.entries.insert(self.fingerprint, entry);
        self.completed = true;
        drop(state);
        self.cache.flights.notify_all();
        trace!(fingerprint = self.fingerprint, "cache entry published");
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // Abandoned flight: wake waiters, publish nothing
        let mut state = self.cache.state.lock().expect("cache lock poisoned");
        state.in_flight.remove(&self.fingerprint);
        drop(state);
        self.cache.flights.notify_all();
        trace!(fingerprint = self.fingerprint, "cache flight abandoned");
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: IndexMap::new(),
                in_flight: HashSet::new(),
                warm: IndexMap::new(),
            }),
            flights: Condvar::new(),
        }
    }

    /// Stable fingerprint of everything the result is a pure function
    /// of: model version, scenario identity, resolved inputs, and the
    /// options that affect values. Wall-clock options are excluded.
    pub fn fingerprint(
        model_version: u64,
        scenario: &ScenarioId,
        inputs: &IndexMap<AttributeId, f64>,
        opts: &RunOptions,
    ) -> u64 {
        let mut h = FNV1A_OFFSET_BASIS_64;
        h = fnv1a64_mix(h, &model_version.to_le_bytes());
        h = fnv1a64_mix(h, scenario.as_str().as_bytes());
        for (id, value) in inputs {
            h = fnv1a64_mix(h, id.as_str().as_bytes());
            h = fnv1a64_f64(h, *value);
        }
        h = fnv1a64_mix(h, &opts.max_iterations.to_le_bytes());
        h = fnv1a64_f64(h, opts.threshold);
        h
    }

    /// Look up a fingerprint, or take leadership of its flight.
    ///
    /// Blocks while another caller is computing the same fingerprint;
    /// wakes to either the published entry or leadership.
    pub fn lookup_or_begin(&self, fingerprint: u64) -> Lookup<'_> {
        let mut state = self.state.lock().expect("cache lock poisoned");
        loop {
            if let Some(entry) = state.entries.get(&fingerprint) {
                trace!(fingerprint, "cache hit");
                return Lookup::Hit(entry.clone());
            }
            if state.in_flight.insert(fingerprint) {
                trace!(fingerprint, "cache miss, flight started");
                return Lookup::Miss(FlightGuard {
                    cache: self,
                    fingerprint,
                    completed: false,
                });
            }
            state = self
                .flights
                .wait(state)
                .expect("cache lock poisoned");
        }
    }

    /// Warm-start snapshot for a scenario: the most recent completed
    /// context, regardless of fingerprint.
    pub fn warm_hints(&self, scenario: &ScenarioId) -> Option<Arc<IndexMap<AttributeId, f64>>> {
        let state = self.state.lock().expect("cache lock poisoned");
        state.warm.get(scenario).cloned()
    }

    /// Drop entries made stale by an upstream input change.
    ///
    /// An entry whose recorded resolved value for `input` already equals
    /// `new_value` is still valid and kept. For each dropped entry the
    /// scenario's warm snapshot is narrowed to attributes outside the
    /// input's downstream `closure`: those values cannot have changed
    /// and remain good seeds.
    pub fn invalidate_input(
        &self,
        input: &AttributeId,
        new_value: f64,
        closure: &IndexSet<AttributeId>,
    ) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        let mut dropped = 0usize;
        let mut stale_scenarios: Vec<ScenarioId> = Vec::new();
        state.entries.retain(|_, entry| {
            let recorded = entry.inputs.get(input).copied();
            let stale = recorded.is_some() && recorded != Some(new_value);
            if stale {
                dropped += 1;
                stale_scenarios.push(entry.scenario.clone());
            }
            !stale
        });
        for scenario in stale_scenarios {
            if let Some(snapshot) = state.warm.get(&scenario) {
                let narrowed: IndexMap<AttributeId, f64> = snapshot
                    .iter()
                    .filter(|(id, _)| !closure.contains(*id))
                    .map(|(id, v)| (id.clone(), *v))
                    .collect();
                state.warm.insert(scenario, Arc::new(narrowed));
            }
        }
        debug!(input = %input, dropped, "cache invalidated for input change");
    }

    /// Drop every entry for one scenario.
    pub fn invalidate_scenario(&self, scenario: &ScenarioId) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.entries.retain(|_, entry| entry.scenario != *scenario);
        state.warm.shift_remove(scenario);
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.entries.clear();
        state.warm.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
