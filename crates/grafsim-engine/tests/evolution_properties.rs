use grafsim_core::value::Value;
use grafsim_engine::expr::{evaluate, parse_to_rpn, token::parse_literal};
use grafsim_engine::{Simulator, Snapshot, StepEvolution};
use grafsim_test_utils::{and_convergence_chart, bool_vars, linear_chart, or_convergence_chart, DiagramBuilder};

use std::collections::HashMap;

fn snapshot(active: &[&str], since_ms: u64, vars: &[(&str, Value)]) -> Snapshot {
    Snapshot {
        active_steps: active.iter().map(|s| s.to_string()).collect(),
        step_activation_times: active.iter().map(|s| (s.to_string(), since_ms)).collect(),
        variables: vars.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        previous_variables: HashMap::new(),
    }
}

#[test]
fn test_single_transition_moves_token() {
    let engine = StepEvolution::new(&linear_chart(), &bool_vars(&["start", "stop"]));
    let snap = snapshot(&["S0"], 0, &[("start", Value::Bool(true))]);

    let out = engine.evaluate(&snap, 100);
    assert_eq!(out.active_steps, vec!["S1"]);
    assert_eq!(out.fired_transitions, vec!["T0"]);
}

#[test]
fn test_and_convergence_requires_all_upstream_steps() {
    let engine = StepEvolution::new(&and_convergence_chart(), &bool_vars(&["go"]));
    assert_eq!(engine.upstream_of("T"), vec!["S0", "S1"]);

    let only_one = snapshot(&["S0"], 0, &[("go", Value::Bool(true))]);
    let out = engine.evaluate(&only_one, 100);
    assert!(out.fired_transitions.is_empty());
    assert_eq!(out.active_steps, vec!["S0"]);

    let both = snapshot(&["S0", "S1"], 0, &[("go", Value::Bool(true))]);
    let out = engine.evaluate(&both, 100);
    assert_eq!(out.fired_transitions, vec!["T"]);
    assert_eq!(out.active_steps, vec!["S2"]);
}

#[test]
fn test_or_gate_behaves_like_and_gate() {
    // OR convergence is not given any-of semantics: every step feeding the
    // gate must be active, exactly like an AND gate.
    let engine = StepEvolution::new(&or_convergence_chart(), &bool_vars(&["go"]));
    assert_eq!(engine.upstream_of("T"), vec!["S0", "S1"]);

    let only_one = snapshot(&["S0"], 0, &[("go", Value::Bool(true))]);
    assert!(engine.evaluate(&only_one, 100).fired_transitions.is_empty());

    let both = snapshot(&["S0", "S1"], 0, &[("go", Value::Bool(true))]);
    assert_eq!(engine.evaluate(&both, 100).fired_transitions, vec!["T"]);
}

#[test]
fn test_step_timer_condition() {
    let diagram = DiagramBuilder::new()
        .step("S1", 1)
        .step("S2", 2)
        .transition("T", "X1.t > 5")
        .link("S1", "T", "S2")
        .build();
    let engine = StepEvolution::new(&diagram, &[]);
    let t0 = 10_000;
    let snap = snapshot(&["S1"], t0, &[]);

    assert!(engine.evaluate(&snap, t0).fired_transitions.is_empty());
    assert!(engine.evaluate(&snap, t0 + 4_900).fired_transitions.is_empty());
    // Strict comparison: exactly 5.0s is not yet greater than 5.
    assert!(engine.evaluate(&snap, t0 + 5_000).fired_transitions.is_empty());
    assert_eq!(engine.evaluate(&snap, t0 + 5_100).fired_transitions, vec!["T"]);
}

#[test]
fn test_step_timer_inclusive_boundary() {
    let diagram = DiagramBuilder::new()
        .step("S1", 1)
        .step("S2", 2)
        .transition("T", "X1.t >= 5s")
        .link("S1", "T", "S2")
        .build();
    let engine = StepEvolution::new(&diagram, &[]);
    let snap = snapshot(&["S1"], 0, &[]);
    assert!(engine.evaluate(&snap, 4_999).fired_transitions.is_empty());
    assert_eq!(engine.evaluate(&snap, 5_000).fired_transitions, vec!["T"]);
}

#[test]
fn test_malformed_condition_never_fires() {
    let diagram = DiagramBuilder::new()
        .initial_step("S0", 0)
        .step("S1", 1)
        .transition("T", "A AND")
        .link("S0", "T", "S1")
        .build();
    let engine = StepEvolution::new(&diagram, &bool_vars(&["A"]));
    let snap = snapshot(&["S0"], 0, &[("A", Value::Bool(true))]);
    let out = engine.evaluate(&snap, 100);
    assert!(out.fired_transitions.is_empty());
    assert_eq!(out.active_steps, vec!["S0"]);
}

#[test]
fn test_evaluate_is_deterministic() {
    let engine = StepEvolution::new(&and_convergence_chart(), &bool_vars(&["go"]));
    let snap = snapshot(&["S0", "S1"], 50, &[("go", Value::Bool(true))]);
    let first = engine.evaluate(&snap, 700);
    for _ in 0..10 {
        assert_eq!(engine.evaluate(&snap, 700), first);
    }
}

#[test]
fn test_no_fire_is_idempotent() {
    let engine = StepEvolution::new(&linear_chart(), &bool_vars(&["start", "stop"]));
    let snap = snapshot(&["S0"], 0, &[]);
    let out = engine.evaluate(&snap, 1_000);
    assert!(out.fired_transitions.is_empty());
    assert_eq!(out.active_steps, vec!["S0"]);
    assert_eq!(out.step_activation_times, snap.step_activation_times);
}

#[test]
fn test_firing_is_synchronous() {
    // S0 -T0-> S1 -T1-> S2, both conditions true: only T0 may fire this tick.
    let diagram = DiagramBuilder::new()
        .initial_step("S0", 0)
        .step("S1", 1)
        .step("S2", 2)
        .transition("T0", "TRUE")
        .transition("T1", "TRUE")
        .link("S0", "T0", "S1")
        .link("S1", "T1", "S2")
        .build();
    let engine = StepEvolution::new(&diagram, &[]);

    let out = engine.evaluate(&snapshot(&["S0"], 0, &[]), 100);
    assert_eq!(out.fired_transitions, vec!["T0"]);
    assert_eq!(out.active_steps, vec!["S1"]);
}

#[test]
fn test_parallel_firings_apply_together() {
    // Two tokens swap places in one tick.
    let diagram = DiagramBuilder::new()
        .initial_step("A", 0)
        .initial_step("B", 1)
        .transition("TA", "TRUE")
        .transition("TB", "TRUE")
        .link("A", "TA", "B")
        .link("B", "TB", "A")
        .build();
    let engine = StepEvolution::new(&diagram, &[]);
    let out = engine.evaluate(&snapshot(&["A", "B"], 0, &[]), 100);
    assert_eq!(out.fired_transitions, vec!["TA", "TB"]);
    assert_eq!(out.active_steps, vec!["A", "B"]);
    assert_eq!(out.step_activation_times.get("A"), Some(&100));
    assert_eq!(out.step_activation_times.get("B"), Some(&100));
}

#[test]
fn test_time_literals() {
    assert_eq!(parse_literal("5s"), Some(Value::Number(5.0)));
    assert_eq!(parse_literal("500ms"), Some(Value::Number(0.5)));
}

#[test]
fn test_rising_edge_true_for_one_tick() {
    let diagram = DiagramBuilder::new()
        .initial_step("S0", 0)
        .step("S1", 1)
        .transition("T0", "RE(v)")
        .link("S0", "T0", "S1")
        .link("S1", "T1", "S0")
        .transition("T1", "TRUE")
        .build();
    let mut sim = Simulator::new(&diagram, &bool_vars(&["v"]));
    sim.start(0);
    sim.tick(100).unwrap();
    sim.set_variable("v", Value::Bool(true)).unwrap();

    assert_eq!(sim.tick(200).unwrap().fired_transitions, vec!["T0"]);
    assert_eq!(sim.tick(300).unwrap().fired_transitions, vec!["T1"]);
    // v is still true, so no new edge: the token stays in S0.
    assert!(sim.tick(400).unwrap().fired_transitions.is_empty());
    assert_eq!(sim.active_steps(), vec!["S0"]);
}

#[test]
fn test_rpn_evaluation_against_plain_maps() {
    let rpn = parse_to_rpn("RE(v) AND level > 2.5");
    let current: HashMap<String, Value> = [
        ("v".to_string(), Value::Bool(true)),
        ("level".to_string(), Value::Number(3.0)),
    ]
    .into_iter()
    .collect();
    let previous: HashMap<String, Value> = [("v".to_string(), Value::Bool(false))].into_iter().collect();
    assert!(evaluate(&rpn, &current, &previous));
    assert!(!evaluate(&rpn, &current, &current));
}
