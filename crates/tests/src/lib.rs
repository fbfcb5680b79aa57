//! Test support for Metron integration tests.
//!
//! Provides a harness around the reference recycling-cost model: two
//! coupled feedback loops (disposal/CO2 and logistics/eco-fees) over
//! three input costs, with every formula invocation counted so cache
//! behavior is observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use metron_engine::{RunOptions, RunResult, SimulationEngine};
use metron_model::{DepSnapshot, FormulaFn, ModelRegistry, ScenarioStore};

static TRACING: Once = Once::new();

/// Install a tracing subscriber honoring `RUST_LOG`; safe to call from
/// every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// Engine over the reference recycling-cost model.
pub struct TestHarness {
    pub engine: SimulationEngine,
    formula_calls: Arc<AtomicUsize>,
}

impl TestHarness {
    /// Build the reference model:
    ///
    /// - inputs: `material_cost = 120`, `energy_cost = 60`,
    ///   `transport_cost = 35`
    /// - `disposal_cost = material_cost * 0.8 + co2_cost`
    /// - `co2_cost = energy_cost * 0.1 + disposal_cost * 0.05`
    /// - `logistics_cost = transport_cost + eco_fees`
    /// - `eco_fees = logistics_cost * 0.1 + co2_cost * 0.05`
    ///
    /// plus two scenarios: `green_energy` (energy 90, transport 40) and
    /// `cheap_transport` (transport 40 only).
    pub fn recycling() -> Self {
        init_tracing();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = |f: fn(&DepSnapshot<'_>) -> f64| -> FormulaFn {
            let calls = Arc::clone(&calls);
            Box::new(move |d| {
                calls.fetch_add(1, Ordering::Relaxed);
                f(d)
            })
        };

        let mut reg = ModelRegistry::new();
        let costs = reg.define_block("costs").unwrap();
        reg.define_input(&costs, "material_cost", 120.0).unwrap();
        reg.define_input(&costs, "energy_cost", 60.0).unwrap();
        reg.define_input(&costs, "transport_cost", 35.0).unwrap();
        reg.define_calculated(
            &costs,
            "disposal_cost",
            vec!["costs.material_cost".into(), "costs.co2_cost".into()],
            counted(|d| d.value("costs.material_cost") * 0.8 + d.value("costs.co2_cost")),
        )
        .unwrap();
        reg.define_calculated(
            &costs,
            "co2_cost",
            vec!["costs.energy_cost".into(), "costs.disposal_cost".into()],
            counted(|d| {
                d.value("costs.energy_cost") * 0.1 + d.value("costs.disposal_cost") * 0.05
            }),
        )
        .unwrap();
        reg.define_calculated(
            &costs,
            "logistics_cost",
            vec!["costs.transport_cost".into(), "costs.eco_fees".into()],
            counted(|d| d.value("costs.transport_cost") + d.value("costs.eco_fees")),
        )
        .unwrap();
        reg.define_calculated(
            &costs,
            "eco_fees",
            vec!["costs.logistics_cost".into(), "costs.co2_cost".into()],
            counted(|d| {
                d.value("costs.logistics_cost") * 0.1 + d.value("costs.co2_cost") * 0.05
            }),
        )
        .unwrap();

        let model = Arc::new(reg.seal().unwrap());
        let mut store = ScenarioStore::new(model);
        store
            .define_scenario(
                "green_energy",
                vec![
                    ("costs.energy_cost".into(), 90.0),
                    ("costs.transport_cost".into(), 40.0),
                ],
            )
            .unwrap();
        store
            .define_scenario(
                "cheap_transport",
                vec![("costs.transport_cost".into(), 40.0)],
            )
            .unwrap();

        Self {
            engine: SimulationEngine::new(store).unwrap(),
            formula_calls: calls,
        }
    }

    /// Reference options: iteration cap 50, convergence threshold 1e-3.
    pub fn options() -> RunOptions {
        RunOptions::new(50, 1e-3)
    }

    /// Run a scenario with the reference options.
    pub fn run(&self, scenario: &str) -> RunResult {
        self.engine.run(scenario, &Self::options()).unwrap()
    }

    /// Total formula invocations since construction.
    pub fn formula_calls(&self) -> usize {
        self.formula_calls.load(Ordering::Relaxed)
    }
}

/// Assert two values agree to the reference tolerance (1e-3).
pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "{what}: expected ~{expected}, got {actual}"
    );
}
