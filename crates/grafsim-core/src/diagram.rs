use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GrafsimError, Result};
use crate::value::Value;

/// Role of a step in the chart. Only `Initial` changes behavior: initial
/// steps are activated when a simulation starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Initial,
    #[default]
    #[serde(alias = "normal")]
    Task,
    Macro,
}

/// A continuous action attached to a step, asserted while the step is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Output variable driven by the action.
    pub variable: String,
    /// IEC qualifier as written by the editor (`N`, `S`, ...). Reported as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

/// A step of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// Ordinal used to build the `X<number>` pseudovariables.
    pub number: u32,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    /// Display name from the editor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Step {
    /// Create a task step.
    pub fn new(id: impl Into<String>, number: u32) -> Self {
        Self {
            id: id.into(),
            number,
            kind: StepKind::Task,
            label: None,
            actions: vec![],
        }
    }

    /// Create an initial step.
    pub fn initial(id: impl Into<String>, number: u32) -> Self {
        Self {
            kind: StepKind::Initial,
            ..Self::new(id, number)
        }
    }

    /// Attach a continuous action.
    pub fn with_action(mut self, variable: impl Into<String>) -> Self {
        self.actions.push(Action {
            variable: variable.into(),
            qualifier: None,
        });
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label when set, id otherwise.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_initial(&self) -> bool {
        self.kind == StepKind::Initial
    }

    /// Name of the activity pseudovariable (`X3`).
    pub fn activity_var(&self) -> String {
        format!("X{}", self.number)
    }

    /// Name of the elapsed-time pseudovariable (`X3.t`), in seconds.
    pub fn elapsed_var(&self) -> String {
        format!("X{}.t", self.number)
    }
}

/// A guarded transition. An empty condition never fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(default)]
    pub condition: String,
}

impl Transition {
    pub fn new(id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
        }
    }
}

/// A directed edge between any two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub source_id: String,
    pub target_id: String,
}

impl Connection {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    And,
    Or,
}

/// Convergence/divergence node. Carries no state of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: String,
    pub kind: GateKind,
}

impl Gate {
    pub fn and(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: GateKind::And,
        }
    }

    pub fn or(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: GateKind::Or,
        }
    }
}

/// The diagram graph consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub gates: Vec<Gate>,
}

/// Editor element as persisted in `.sfc` files.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Element {
    Step(StepElement),
    Transition(Transition),
    Connection(Connection),
    AndGate { id: String },
    OrGate { id: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepElement {
    id: String,
    #[serde(default)]
    number: Option<u32>,
    #[serde(default)]
    step_type: Option<String>,
    #[serde(default)]
    is_initial: bool,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DiagramDocument {
    Elements { elements: Vec<Element> },
    Lists(Diagram),
}

impl Diagram {
    /// Parse a diagram from JSON, accepting both the list form and the
    /// editor's element form.
    pub fn from_json(input: &str) -> Result<Self> {
        let doc: DiagramDocument =
            serde_json::from_str(input).map_err(|e| GrafsimError::DiagramParse(e.to_string()))?;
        Ok(match doc {
            DiagramDocument::Lists(diagram) => diagram,
            DiagramDocument::Elements { elements } => Self::from_elements(elements),
        })
    }

    /// Load a diagram file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn from_elements(elements: Vec<Element>) -> Self {
        let mut diagram = Diagram::default();
        for element in elements {
            match element {
                Element::Step(s) => {
                    let kind = if s.is_initial {
                        StepKind::Initial
                    } else {
                        match s.step_type.as_deref() {
                            Some("initial") => StepKind::Initial,
                            Some("macro") | Some("enclosing") => StepKind::Macro,
                            _ => StepKind::Task,
                        }
                    };
                    // Steps without an explicit number are numbered by position.
                    let number = s.number.unwrap_or(diagram.steps.len() as u32);
                    diagram.steps.push(Step {
                        id: s.id,
                        number,
                        kind,
                        label: s.label,
                        actions: s.actions,
                    });
                }
                Element::Transition(t) => diagram.transitions.push(t),
                Element::Connection(c) => diagram.connections.push(c),
                Element::AndGate { id } => diagram.gates.push(Gate::and(id)),
                Element::OrGate { id } => diagram.gates.push(Gate::or(id)),
                Element::Other => {}
            }
        }
        diagram
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    pub fn initial_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.is_initial())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    #[default]
    Boolean,
    Integer,
    Float,
}

/// A process variable definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    /// Name used in conditions.
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: VarType,
    /// Declared initial value.
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariablesDocument {
    Wrapped { variables: Vec<Variable> },
    List(Vec<Variable>),
}

impl Variable {
    pub fn boolean(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            var_type: VarType::Boolean,
            value: Value::Bool(false),
        }
    }

    pub fn number(id: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            var_type: VarType::Float,
            value: Value::Number(value),
        }
    }

    /// Set the declared value.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Parse a variable definition list, bare or wrapped in `{"variables": [...]}`.
    pub fn list_from_json(input: &str) -> Result<Vec<Variable>> {
        let doc: VariablesDocument =
            serde_json::from_str(input).map_err(|e| GrafsimError::VariablesParse(e.to_string()))?;
        Ok(match doc {
            VariablesDocument::Wrapped { variables } => variables,
            VariablesDocument::List(list) => list,
        })
    }

    /// Load a variable definition file.
    pub fn load_list(path: &Path) -> Result<Vec<Variable>> {
        let content = std::fs::read_to_string(path)?;
        Self::list_from_json(&content)
    }
}
