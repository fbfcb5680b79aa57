//! End-to-end tests over the public engine surface.

use std::sync::Arc;
use std::time::Duration;

use metron_engine::{RunOptions, RunState, SimulationEngine};
use metron_foundation::AttributeId;
use metron_model::{ModelDef, ModelRegistry, ScenarioDef, ScenarioStore};
use metron_tests::{assert_close, init_tracing, TestHarness};

#[test]
fn baseline_converges_to_reference_values() {
    let harness = TestHarness::recycling();
    let result = harness.run("baseline");

    assert_eq!(result.state, RunState::Done);
    assert!(result.converged());
    assert!(!result.cache_hit);
    assert_eq!(result.values.len(), 7);

    // Inputs pass through at their defaults
    assert_close(
        result.value("costs.material_cost").unwrap(),
        120.0,
        "material_cost",
    );

    assert_close(result.value("costs.co2_cost").unwrap(), 11.368, "co2_cost");
    assert_close(
        result.value("costs.disposal_cost").unwrap(),
        107.368,
        "disposal_cost",
    );
    assert_close(
        result.value("costs.logistics_cost").unwrap(),
        39.520,
        "logistics_cost",
    );
    assert_close(result.value("costs.eco_fees").unwrap(), 4.520, "eco_fees");

    // Two feedback loops, each settling in six Gauss-Seidel sweeps at
    // threshold 1e-3
    assert_eq!(result.diagnostics.len(), 2);
    for diag in &result.diagnostics {
        assert!(diag.converged);
        assert_eq!(diag.iterations, 6);
        assert!(diag.max_delta < 1e-3);
    }
}

#[test]
fn override_scenario_converges_to_reference_values() {
    let harness = TestHarness::recycling();
    let result = harness.run("green_energy");

    assert_eq!(result.state, RunState::Done);
    assert!(result.converged());

    // Overridden inputs are in effect, untouched siblings keep their
    // defaults
    assert_close(
        result.value("costs.energy_cost").unwrap(),
        90.0,
        "energy_cost",
    );
    assert_close(
        result.value("costs.transport_cost").unwrap(),
        40.0,
        "transport_cost",
    );
    assert_close(
        result.value("costs.material_cost").unwrap(),
        120.0,
        "material_cost",
    );

    assert_close(result.value("costs.co2_cost").unwrap(), 14.526, "co2_cost");
    assert_close(
        result.value("costs.disposal_cost").unwrap(),
        110.526,
        "disposal_cost",
    );
    assert_close(
        result.value("costs.logistics_cost").unwrap(),
        45.251,
        "logistics_cost",
    );
    assert_close(result.value("costs.eco_fees").unwrap(), 5.251, "eco_fees");

    for diag in &result.diagnostics {
        assert_eq!(diag.iterations, 6);
    }
}

#[test]
fn second_run_is_served_from_the_cache() {
    let harness = TestHarness::recycling();

    let first = harness.run("baseline");
    let calls_after_first = harness.formula_calls();
    assert!(calls_after_first > 0);

    let second = harness.run("baseline");
    assert!(second.cache_hit);
    assert_eq!(harness.formula_calls(), calls_after_first);
    assert_eq!(first.values, second.values);
    assert_eq!(first.diagnostics.len(), second.diagnostics.len());
}

#[test]
fn input_change_outside_a_loop_leaves_it_untouched() {
    let harness = TestHarness::recycling();
    let baseline = harness.run("baseline");
    // transport_cost feeds only the logistics loop
    let cheap = harness.run("cheap_transport");

    assert_eq!(
        baseline.value("costs.co2_cost"),
        cheap.value("costs.co2_cost")
    );
    assert_eq!(
        baseline.value("costs.disposal_cost"),
        cheap.value("costs.disposal_cost")
    );
    assert!(
        baseline.value("costs.logistics_cost") != cheap.value("costs.logistics_cost"),
        "logistics loop should move with its input"
    );
}

fn damped_pair(reg: &mut ModelRegistry, block: &str, default: f64) {
    let b = reg.define_block(block).unwrap();
    reg.define_input(&b, "src", default).unwrap();
    let src: AttributeId = format!("{block}.src").as_str().into();
    let x: AttributeId = format!("{block}.x").as_str().into();
    let y: AttributeId = format!("{block}.y").as_str().into();
    let (src2, y2) = (src.clone(), y.clone());
    reg.define_calculated(
        &b,
        "x",
        vec![src, y],
        Box::new(move |d| d.value(src2.clone()) * 0.1 + d.value(y2.clone()) * 0.5),
    )
    .unwrap();
    let x2 = x.clone();
    reg.define_calculated(
        &b,
        "y",
        vec![x],
        Box::new(move |d| d.value(x2.clone()) * 0.5),
    )
    .unwrap();
}

#[test]
fn invalidation_keeps_warm_state_for_untouched_loops() {
    init_tracing();
    // Two structurally identical, fully disjoint feedback loops
    let mut reg = ModelRegistry::new();
    damped_pair(&mut reg, "a", 12.0);
    damped_pair(&mut reg, "b", 12.0);
    let store = ScenarioStore::new(Arc::new(reg.seal().unwrap()));
    let engine = SimulationEngine::new(store).unwrap();
    let opts = RunOptions::new(50, 1e-3);

    let first = engine.run("baseline", &opts).unwrap();
    assert!(first.converged());
    assert_eq!(engine.cached_results(), 1);

    // An upstream change to a.src invalidates the entry but only the
    // a-loop's warm state
    engine.invalidate_input(&"a.src".into(), 99.0);
    assert_eq!(engine.cached_results(), 0);

    let second = engine.run("baseline", &opts).unwrap();
    assert!(!second.cache_hit);
    for (id, value) in &first.values {
        assert_close(second.values[id], *value, &id.as_str());
    }

    let diag_of = |result: &metron_engine::RunResult, member: &str| {
        result
            .diagnostics
            .iter()
            .find(|d| d.members.iter().any(|m| m.as_str() == member))
            .cloned()
            .unwrap()
    };
    // The b-loop resumes from its converged values and settles in one
    // sweep; the a-loop starts cold again
    assert_eq!(diag_of(&second, "b.x").iterations, 1);
    assert!(diag_of(&second, "a.x").iterations > 1);
}

// Feedback gain above one: the group can never converge
fn divergent_engine() -> SimulationEngine {
    let mut reg = ModelRegistry::new();
    let m = reg.define_block("m").unwrap();
    reg.define_input(&m, "base", 1.0).unwrap();
    reg.define_calculated(
        &m,
        "x",
        vec!["m.base".into(), "m.y".into()],
        Box::new(|d| d.value("m.base") + d.value("m.y") * 1.5),
    )
    .unwrap();
    reg.define_calculated(
        &m,
        "y",
        vec!["m.x".into()],
        Box::new(|d| d.value("m.x") * 1.5),
    )
    .unwrap();
    let store = ScenarioStore::new(Arc::new(reg.seal().unwrap()));
    SimulationEngine::new(store).unwrap()
}

#[test]
fn exhausted_groups_report_without_failing() {
    init_tracing();
    let engine = divergent_engine();

    let opts = RunOptions::new(10, 1e-3);
    let result = engine.run("baseline", &opts).unwrap();

    assert_eq!(result.state, RunState::Exhausted);
    assert!(!result.converged());
    let diag = &result.diagnostics[0];
    assert_eq!(diag.iterations, 10);
    assert!(diag.max_delta >= 1e-3);
    // Best-effort values are still finite and reported
    assert!(result.value("m.x").unwrap().is_finite());

    // Exhaustion is deterministic for fixed options, so it caches too
    let again = engine.run("baseline", &opts).unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.state, RunState::Exhausted);
}

#[test]
fn deadline_cut_runs_report_and_never_cache() {
    init_tracing();
    let engine = divergent_engine();

    // An already-expired deadline stops the solver after its first sweep
    let opts = RunOptions {
        deadline: Some(Duration::ZERO),
        ..RunOptions::new(1000, 1e-3)
    };
    let result = engine.run("baseline", &opts).unwrap();

    assert_eq!(result.state, RunState::Exhausted);
    assert!(!result.converged());
    assert_eq!(result.diagnostics[0].iterations, 1);
    assert!(result.value("m.x").unwrap().is_finite());

    // Deadline-cut results are wall-clock dependent: never cached
    assert_eq!(engine.cached_results(), 0);
    let again = engine.run("baseline", &opts).unwrap();
    assert!(!again.cache_hit);
    assert_eq!(engine.cached_results(), 0);
}

#[test]
fn fresh_engines_agree_exactly() {
    let a = TestHarness::recycling().run("green_energy");
    let b = TestHarness::recycling().run("green_energy");
    let c = TestHarness::recycling().run("green_energy");
    assert_eq!(a.values, b.values);
    assert_eq!(b.values, c.values);
}

#[test]
fn defs_load_bind_and_run() {
    init_tracing();
    let model_json = r#"{
        "blocks": [
            {
                "name": "m",
                "attributes": [
                    { "kind": "input", "name": "base", "default": 10.0 },
                    {
                        "kind": "calculated",
                        "name": "doubled",
                        "dependencies": ["m.base"]
                    }
                ]
            }
        ]
    }"#;
    let scenario_json = r#"{ "name": "big", "overrides": { "m.base": 50.0 } }"#;

    let def: ModelDef = serde_json::from_str(model_json).unwrap();
    let mut reg = ModelRegistry::new();
    reg.load_def(&def).unwrap();
    reg.bind_formula(
        &"m.doubled".into(),
        Box::new(|d| d.value("m.base") * 2.0),
    )
    .unwrap();

    let mut store = ScenarioStore::new(Arc::new(reg.seal().unwrap()));
    let scenario: ScenarioDef = serde_json::from_str(scenario_json).unwrap();
    store.load_def(&scenario).unwrap();
    let engine = SimulationEngine::new(store).unwrap();

    let baseline = engine.run("baseline", &RunOptions::default()).unwrap();
    assert_eq!(baseline.value("m.doubled"), Some(20.0));
    let big = engine.run("big", &RunOptions::default()).unwrap();
    assert_eq!(big.value("m.doubled"), Some(100.0));
}
