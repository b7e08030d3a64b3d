//! Shared fixtures for grafsim tests: a fluent diagram builder, a few
//! canonical charts, and helpers for writing inputs to temp files.

use std::io::Write;

use grafsim_core::diagram::{Connection, Diagram, Gate, Step, Transition, Variable};
use tempfile::NamedTempFile;

/// Fluent builder for test diagrams. Connection ids are generated.
#[derive(Debug, Default)]
pub struct DiagramBuilder {
    diagram: Diagram,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_step(mut self, id: &str, number: u32) -> Self {
        self.diagram.steps.push(Step::initial(id, number));
        self
    }

    pub fn step(mut self, id: &str, number: u32) -> Self {
        self.diagram.steps.push(Step::new(id, number));
        self
    }

    pub fn step_with_actions(mut self, id: &str, number: u32, actions: &[&str]) -> Self {
        let step = actions
            .iter()
            .fold(Step::new(id, number), |s, a| s.with_action(*a));
        self.diagram.steps.push(step);
        self
    }

    pub fn transition(mut self, id: &str, condition: &str) -> Self {
        self.diagram.transitions.push(Transition::new(id, condition));
        self
    }

    pub fn and_gate(mut self, id: &str) -> Self {
        self.diagram.gates.push(Gate::and(id));
        self
    }

    pub fn or_gate(mut self, id: &str) -> Self {
        self.diagram.gates.push(Gate::or(id));
        self
    }

    pub fn connect(mut self, source: &str, target: &str) -> Self {
        let id = format!("c{}", self.diagram.connections.len());
        self.diagram.connections.push(Connection::new(id, source, target));
        self
    }

    /// `from -> transition -> to`.
    pub fn link(self, from: &str, transition: &str, to: &str) -> Self {
        self.connect(from, transition).connect(transition, to)
    }

    pub fn build(self) -> Diagram {
        self.diagram
    }
}

/// `S0 (initial) -T0 start-> S1 -T1 stop-> S0`, with `MOTOR` on S1.
pub fn linear_chart() -> Diagram {
    DiagramBuilder::new()
        .initial_step("S0", 0)
        .step_with_actions("S1", 1, &["MOTOR"])
        .transition("T0", "start")
        .transition("T1", "stop")
        .link("S0", "T0", "S1")
        .link("S1", "T1", "S0")
        .build()
}

/// `S0` and `S1` converge through an AND gate into `T` -> `S2`.
pub fn and_convergence_chart() -> Diagram {
    convergence_chart(Gate::and("G"))
}

/// Same shape as [`and_convergence_chart`] through an OR gate.
pub fn or_convergence_chart() -> Diagram {
    convergence_chart(Gate::or("G"))
}

fn convergence_chart(gate: Gate) -> Diagram {
    let mut diagram = DiagramBuilder::new()
        .initial_step("S0", 0)
        .step("S1", 1)
        .step("S2", 2)
        .transition("T", "go")
        .connect("S0", "G")
        .connect("S1", "G")
        .connect("G", "T")
        .connect("T", "S2")
        .build();
    diagram.gates.push(gate);
    diagram
}

/// Boolean variables named after themselves (`id == name`), all false.
pub fn bool_vars(names: &[&str]) -> Vec<Variable> {
    names.iter().map(|n| Variable::boolean(*n, *n)).collect()
}

/// Write `content` to a named temp file that lives as long as the handle.
pub fn temp_file(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

/// Serialize a diagram to a `.json` temp file.
pub fn diagram_file(diagram: &Diagram) -> NamedTempFile {
    let json = serde_json::to_string_pretty(diagram).expect("serialize diagram");
    temp_file(&json, ".json")
}

/// Serialize variable definitions to a `.json` temp file.
pub fn variables_file(variables: &[Variable]) -> NamedTempFile {
    let json = serde_json::to_string_pretty(variables).expect("serialize variables");
    temp_file(&json, ".json")
}
