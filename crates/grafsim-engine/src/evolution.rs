use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use grafsim_core::diagram::{Diagram, Step, Variable};
use grafsim_core::value::Value;

use crate::expr::Condition;
use crate::graph::{GraphIndex, NodeKind};

/// Complete mutable state of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub active_steps: BTreeSet<String>,
    /// Logical milliseconds at which each active step was activated.
    pub step_activation_times: BTreeMap<String, u64>,
    /// Current values by variable id.
    pub variables: HashMap<String, Value>,
    /// Values of the previous tick by variable id.
    pub previous_variables: HashMap<String, Value>,
}

impl Snapshot {
    /// Install the step part of a tick result.
    pub fn apply(&mut self, outcome: &TickOutcome) {
        self.active_steps = outcome.active_steps.iter().cloned().collect();
        self.step_activation_times = outcome.step_activation_times.clone();
    }
}

/// Result of evaluating one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    pub active_steps: Vec<String>,
    pub fired_transitions: Vec<String>,
    pub step_activation_times: BTreeMap<String, u64>,
}

impl TickOutcome {
    /// Whether anything fired this tick.
    pub fn changed(&self) -> bool {
        !self.fired_transitions.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledTransition {
    id: String,
    condition: Condition,
    /// Step node indices, ascending (declaration order).
    upstream: Vec<usize>,
    downstream: Vec<usize>,
}

/// Synchronous step evolution over an immutable diagram.
///
/// Construction indexes the graph and parses every condition once; each
/// call to [`StepEvolution::evaluate`] is then a pure function of the
/// snapshot and the logical time.
#[derive(Debug, Clone)]
pub struct StepEvolution {
    index: GraphIndex,
    steps: Vec<Step>,
    transitions: Vec<CompiledTransition>,
    variables: Vec<Variable>,
}

impl StepEvolution {
    pub fn new(diagram: &Diagram, variables: &[Variable]) -> Self {
        let index = GraphIndex::new(diagram);

        let transitions = diagram
            .transitions
            .iter()
            .filter_map(|t| {
                let idx = index
                    .index_of(&t.id)
                    .filter(|&i| index.kind(i) == NodeKind::Transition)?;
                Some(CompiledTransition {
                    id: t.id.clone(),
                    condition: Condition::parse(t.condition.as_str()),
                    upstream: index.upstream_step_nodes(idx).into_iter().collect(),
                    downstream: index.downstream_step_nodes(idx).into_iter().collect(),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            steps = diagram.steps.len(),
            transitions = transitions.len(),
            gates = diagram.gates.len(),
            "Step evolution compiled"
        );

        Self {
            index,
            steps: diagram.steps.clone(),
            transitions,
            variables: variables.to_vec(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn graph(&self) -> &GraphIndex {
        &self.index
    }

    /// Upstream step ids of a transition, in declaration order.
    pub fn upstream_of(&self, transition_id: &str) -> Vec<String> {
        self.compiled(transition_id)
            .map(|t| self.ids(&t.upstream))
            .unwrap_or_default()
    }

    /// Downstream step ids of a transition, in declaration order.
    pub fn downstream_of(&self, transition_id: &str) -> Vec<String> {
        self.compiled(transition_id)
            .map(|t| self.ids(&t.downstream))
            .unwrap_or_default()
    }

    fn compiled(&self, transition_id: &str) -> Option<&CompiledTransition> {
        self.transitions.iter().find(|t| t.id == transition_id)
    }

    fn ids(&self, nodes: &[usize]) -> Vec<String> {
        nodes.iter().map(|&n| self.index.id(n).to_string()).collect()
    }

    /// Compute the next tick from `snapshot` at logical time `now_ms`.
    ///
    /// Every transition is judged against the untouched snapshot; effects
    /// of all fired transitions are then applied together (deactivations
    /// first, then activations).
    pub fn evaluate(&self, snapshot: &Snapshot, now_ms: u64) -> TickOutcome {
        let (vars, prev_vars) = self.build_context(snapshot, now_ms);

        let fired: Vec<&CompiledTransition> = self
            .transitions
            .iter()
            .filter(|t| self.should_fire(t, snapshot, &vars, &prev_vars))
            .collect();

        let mut deactivate: BTreeSet<usize> = BTreeSet::new();
        let mut activate: BTreeSet<usize> = BTreeSet::new();
        for t in &fired {
            deactivate.extend(t.upstream.iter().copied());
            activate.extend(t.downstream.iter().copied());
        }

        let mut active = snapshot.active_steps.clone();
        let mut times = snapshot.step_activation_times.clone();
        times.retain(|id, _| active.contains(id));

        for &node in &deactivate {
            let id = self.index.id(node);
            active.remove(id);
            times.remove(id);
        }
        for &node in &activate {
            let id = self.index.id(node);
            active.insert(id.to_string());
            times.insert(id.to_string(), now_ms);
        }

        TickOutcome {
            active_steps: self.ordered(&active),
            fired_transitions: fired.iter().map(|t| t.id.clone()).collect(),
            step_activation_times: times,
        }
    }

    fn should_fire(
        &self,
        transition: &CompiledTransition,
        snapshot: &Snapshot,
        vars: &HashMap<String, Value>,
        prev_vars: &HashMap<String, Value>,
    ) -> bool {
        if transition.upstream.is_empty() {
            trace!(transition = %transition.id, "No upstream step, never fires");
            return false;
        }
        let enabled = transition
            .upstream
            .iter()
            .all(|&node| snapshot.active_steps.contains(self.index.id(node)));
        if !enabled {
            return false;
        }
        let receptive = transition.condition.evaluate(vars, prev_vars);
        if receptive {
            debug!(
                transition = %transition.id,
                condition = %transition.condition.source(),
                "Transition fires"
            );
        }
        receptive
    }

    /// Name → value context for the current and previous tick, including
    /// `X<n>` and `X<n>.t` for every active step.
    pub fn build_context(
        &self,
        snapshot: &Snapshot,
        now_ms: u64,
    ) -> (HashMap<String, Value>, HashMap<String, Value>) {
        let mut vars = HashMap::with_capacity(self.variables.len() + 2 * self.steps.len());
        let mut prev_vars = HashMap::with_capacity(self.variables.len());

        for var in &self.variables {
            let current = snapshot.variables.get(&var.id).copied().unwrap_or(var.value);
            vars.insert(var.name.clone(), current);
            if let Some(previous) = snapshot.previous_variables.get(&var.id) {
                prev_vars.insert(var.name.clone(), *previous);
            }
        }

        for step in &self.steps {
            if !snapshot.active_steps.contains(&step.id) {
                continue;
            }
            let elapsed_ms = snapshot
                .step_activation_times
                .get(&step.id)
                .map(|&since| now_ms.saturating_sub(since))
                .unwrap_or(0);
            vars.insert(step.activity_var(), Value::Bool(true));
            vars.insert(step.elapsed_var(), Value::Number(elapsed_ms as f64 / 1000.0));
        }

        (vars, prev_vars)
    }

    /// Active ids in step declaration order; ids unknown to the diagram
    /// follow in lexical order.
    fn ordered(&self, active: &BTreeSet<String>) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out: Vec<String> = self
            .steps
            .iter()
            .filter(|s| active.contains(&s.id) && seen.insert(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect();
        for id in active {
            if !seen.contains(id.as_str()) {
                out.push(id.clone());
            }
        }
        out
    }
}
