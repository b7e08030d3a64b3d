pub mod analyzer;
pub mod evolution;
pub mod expr;
pub mod graph;
pub mod runner;
pub mod scenario;
pub mod simulator;

pub use analyzer::{AnalysisReport, Analyzer, Issue, IssueKind, Severity};
pub use evolution::{Snapshot, StepEvolution, TickOutcome};
pub use expr::{Condition, Operator, Token};
pub use graph::{GraphIndex, NodeKind};
pub use runner::{RunSummary, TickRunner, VariableWrite};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner, TraceEntry};
pub use simulator::Simulator;
