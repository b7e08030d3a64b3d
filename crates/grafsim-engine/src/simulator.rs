use std::collections::BTreeMap;

use tracing::{debug, info};

use grafsim_core::diagram::{Diagram, Variable};
use grafsim_core::error::{GrafsimError, Result};
use grafsim_core::value::Value;

use crate::evolution::{Snapshot, StepEvolution, TickOutcome};

/// A simulation session over one diagram.
///
/// Owns the snapshot between ticks and performs the caller-side duties of
/// the pure engine: seeding initial steps, rotating current values into
/// previous values after every tick, and clearing state on stop.
#[derive(Debug, Clone)]
pub struct Simulator {
    engine: StepEvolution,
    snapshot: Snapshot,
    running: bool,
    tick_count: u64,
    last_fired: Vec<String>,
}

impl Simulator {
    pub fn new(diagram: &Diagram, variables: &[Variable]) -> Self {
        Self::with_engine(StepEvolution::new(diagram, variables))
    }

    pub fn with_engine(engine: StepEvolution) -> Self {
        Self {
            engine,
            snapshot: Snapshot::default(),
            running: false,
            tick_count: 0,
            last_fired: Vec::new(),
        }
    }

    pub fn engine(&self) -> &StepEvolution {
        &self.engine
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Transitions fired by the most recent tick.
    pub fn last_fired(&self) -> &[String] {
        &self.last_fired
    }

    /// Start (or restart) the simulation at logical time `now_ms`.
    ///
    /// Activates every initial step, resets variables to their declared
    /// values and forgets previous-tick history. Returns the active steps.
    pub fn start(&mut self, now_ms: u64) -> Vec<String> {
        let mut snapshot = Snapshot::default();
        for step in self.engine.steps().iter().filter(|s| s.is_initial()) {
            snapshot.active_steps.insert(step.id.clone());
            snapshot.step_activation_times.insert(step.id.clone(), now_ms);
        }
        for var in self.engine.variables() {
            snapshot.variables.insert(var.id.clone(), var.value);
        }

        self.snapshot = snapshot;
        self.running = true;
        self.tick_count = 0;
        self.last_fired.clear();

        let active = self.active_steps();
        info!(active_steps = ?active, "Simulation started");
        active
    }

    /// Stop the simulation and drop all transient state.
    pub fn stop(&mut self) {
        if self.running {
            info!(ticks = self.tick_count, "Simulation stopped");
        }
        self.snapshot = Snapshot::default();
        self.running = false;
        self.tick_count = 0;
        self.last_fired.clear();
    }

    /// Write a variable by name or id. Takes effect on the next tick.
    pub fn set_variable(&mut self, key: &str, value: Value) -> Result<()> {
        if !self.running {
            return Err(GrafsimError::SimulationNotRunning);
        }
        let id = self
            .resolve_variable(key)
            .ok_or_else(|| GrafsimError::UnknownVariable(key.to_string()))?
            .id
            .clone();
        debug!(variable = %key, %value, "Variable set");
        self.snapshot.variables.insert(id, value);
        Ok(())
    }

    fn resolve_variable(&self, key: &str) -> Option<&Variable> {
        let vars = self.engine.variables();
        vars.iter()
            .find(|v| v.name == key)
            .or_else(|| vars.iter().find(|v| v.id == key))
    }

    /// Evaluate one tick at logical time `now_ms` and advance the session.
    pub fn tick(&mut self, now_ms: u64) -> Result<TickOutcome> {
        if !self.running {
            return Err(GrafsimError::SimulationNotRunning);
        }

        let outcome = self.engine.evaluate(&self.snapshot, now_ms);

        self.snapshot.previous_variables = self.snapshot.variables.clone();
        self.snapshot.apply(&outcome);
        self.tick_count += 1;
        self.last_fired = outcome.fired_transitions.clone();

        if outcome.changed() {
            debug!(
                tick = self.tick_count,
                fired = ?outcome.fired_transitions,
                active = ?outcome.active_steps,
                "Tick evolved"
            );
        }
        Ok(outcome)
    }

    /// Active steps in declaration order.
    pub fn active_steps(&self) -> Vec<String> {
        let snapshot = &self.snapshot;
        let mut out: Vec<String> = self
            .engine
            .steps()
            .iter()
            .filter(|s| snapshot.active_steps.contains(&s.id))
            .map(|s| s.id.clone())
            .collect();
        for id in &snapshot.active_steps {
            if !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }

    /// Action variables asserted by the active steps.
    pub fn active_actions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for step in self.engine.steps() {
            if !self.snapshot.active_steps.contains(&step.id) {
                continue;
            }
            for action in &step.actions {
                if !out.contains(&action.variable) {
                    out.push(action.variable.clone());
                }
            }
        }
        out
    }

    /// Current variable values keyed by name.
    pub fn variables_by_name(&self) -> BTreeMap<String, Value> {
        self.engine
            .variables()
            .iter()
            .map(|v| {
                let value = self.snapshot.variables.get(&v.id).copied().unwrap_or(v.value);
                (v.name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grafsim_core::diagram::{Connection, Step, Transition};

    fn diagram() -> Diagram {
        Diagram {
            steps: vec![
                Step::initial("s0", 0),
                Step::new("s1", 1).with_action("MOTOR").with_action("LAMP"),
            ],
            transitions: vec![Transition::new("t0", "RE(button)"), Transition::new("t1", "X1.t >= 1s")],
            connections: vec![
                Connection::new("c0", "s0", "t0"),
                Connection::new("c1", "t0", "s1"),
                Connection::new("c2", "s1", "t1"),
                Connection::new("c3", "t1", "s0"),
            ],
            gates: vec![],
        }
    }

    fn vars() -> Vec<Variable> {
        vec![Variable::boolean("v_button", "button")]
    }

    #[test]
    fn test_start_activates_initial_steps() {
        let mut sim = Simulator::new(&diagram(), &vars());
        assert!(!sim.is_running());
        let active = sim.start(0);
        assert_eq!(active, vec!["s0"]);
        assert_eq!(sim.snapshot().step_activation_times.get("s0"), Some(&0));
        assert!(sim.snapshot().previous_variables.is_empty());
    }

    #[test]
    fn test_tick_requires_running() {
        let mut sim = Simulator::new(&diagram(), &vars());
        assert!(matches!(sim.tick(0), Err(GrafsimError::SimulationNotRunning)));
        assert!(matches!(
            sim.set_variable("button", Value::Bool(true)),
            Err(GrafsimError::SimulationNotRunning)
        ));
    }

    #[test]
    fn test_unknown_variable() {
        let mut sim = Simulator::new(&diagram(), &vars());
        sim.start(0);
        assert!(matches!(
            sim.set_variable("nope", Value::Bool(true)),
            Err(GrafsimError::UnknownVariable(_))
        ));
        // Lookup by id also works.
        sim.set_variable("v_button", Value::Bool(true)).unwrap();
        assert_eq!(sim.variables_by_name().get("button"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_rising_edge_fires_once() {
        let mut sim = Simulator::new(&diagram(), &vars());
        sim.start(0);
        sim.set_variable("button", Value::Bool(true)).unwrap();

        let out = sim.tick(100).unwrap();
        assert_eq!(out.fired_transitions, vec!["t0"]);
        assert_eq!(sim.active_steps(), vec!["s1"]);
        assert_eq!(sim.active_actions(), vec!["MOTOR", "LAMP"]);

        // Timer not elapsed yet; button still held but no new edge.
        let out = sim.tick(200).unwrap();
        assert!(out.fired_transitions.is_empty());

        // 1s after activation at t=100ms.
        let out = sim.tick(1_100).unwrap();
        assert_eq!(out.fired_transitions, vec!["t1"]);
        assert_eq!(sim.active_steps(), vec!["s0"]);

        // Button still held: RE does not re-trigger.
        let out = sim.tick(1_200).unwrap();
        assert!(out.fired_transitions.is_empty());
        assert_eq!(sim.tick_count(), 4);
    }

    #[test]
    fn test_stop_clears_state() {
        let mut sim = Simulator::new(&diagram(), &vars());
        sim.start(0);
        sim.set_variable("button", Value::Bool(true)).unwrap();
        sim.tick(100).unwrap();
        sim.stop();
        assert!(!sim.is_running());
        assert!(sim.active_steps().is_empty());
        assert!(sim.last_fired().is_empty());
        assert_eq!(sim.tick_count(), 0);

        // Restart resets variables to declared values.
        sim.start(0);
        assert_eq!(sim.variables_by_name().get("button"), Some(&Value::Bool(false)));
    }
}
