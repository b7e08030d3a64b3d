use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use grafsim_core::config::SimulationConfig;
use grafsim_core::diagram::{Diagram, Variable};
use grafsim_core::error::{GrafsimError, Result};
use grafsim_core::types::SessionId;
use grafsim_core::value::Value;

use crate::simulator::Simulator;

/// One input phase: variables to write, then ticks to evaluate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u32>,
    #[serde(default, alias = "duration_ms", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioDocument {
    List(Vec<Scenario>),
    Wrapped { scenarios: Vec<Scenario> },
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set(mut self, variable: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(variable.into(), value.into());
        self
    }

    pub fn ticks(mut self, ticks: u32) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Accepts a bare list or `{"scenarios": [...]}`.
    pub fn list_from_json(input: &str) -> Result<Vec<Scenario>> {
        let doc: ScenarioDocument =
            serde_json::from_str(input).map_err(|e| GrafsimError::Scenario(e.to_string()))?;
        Ok(match doc {
            ScenarioDocument::List(list) => list,
            ScenarioDocument::Wrapped { scenarios } => scenarios,
        })
    }

    pub fn load_list(path: &Path) -> Result<Vec<Scenario>> {
        let content = std::fs::read_to_string(path)?;
        Self::list_from_json(&content)
    }

    /// Ticks to run: explicit count, else duration rounded up to whole
    /// ticks, else `default_ticks`. Never zero.
    fn tick_count(&self, tick_ms: u64, default_ticks: u32) -> u32 {
        let n = match (self.ticks, self.duration_ms) {
            (Some(n), _) => n,
            (None, Some(ms)) => u32::try_from(ms.div_ceil(tick_ms.max(1))).unwrap_or(u32::MAX),
            (None, None) => default_ticks,
        };
        n.max(1)
    }
}

/// One row of a simulation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub tick: u64,
    pub time_ms: u64,
    pub scenario: Option<String>,
    pub active_steps: Vec<String>,
    pub fired_transitions: Vec<String>,
    pub active_actions: Vec<String>,
    pub variables: BTreeMap<String, Value>,
}

impl TraceEntry {
    fn capture(sim: &Simulator, time_ms: u64, scenario: Option<&str>) -> Self {
        Self {
            tick: sim.tick_count(),
            time_ms,
            scenario: scenario.map(str::to_string),
            active_steps: sim.active_steps(),
            fired_transitions: sim.last_fired().to_vec(),
            active_actions: sim.active_actions(),
            variables: sim.variables_by_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub trace: Vec<TraceEntry>,
    pub warnings: Vec<String>,
}

impl ScenarioReport {
    pub fn final_entry(&self) -> Option<&TraceEntry> {
        self.trace.last()
    }

    /// Every transition firing in order, as `(tick, transition id)`.
    pub fn firings(&self) -> Vec<(u64, &str)> {
        self.trace
            .iter()
            .flat_map(|e| e.fired_transitions.iter().map(move |t| (e.tick, t.as_str())))
            .collect()
    }

    /// Plain-text rendering, one line per tick.
    pub fn render(&self) -> String {
        let mut out = format!("session {} ({})\n", self.session_id, self.started_at.to_rfc3339());
        for entry in &self.trace {
            out.push_str(&format!(
                "#{:<4} {:>7}ms  [{}]  active: {}",
                entry.tick,
                entry.time_ms,
                entry.scenario.as_deref().unwrap_or("-"),
                entry.active_steps.join(", ")
            ));
            if !entry.fired_transitions.is_empty() {
                out.push_str(&format!("  fired: {}", entry.fired_transitions.join(", ")));
            }
            if !entry.active_actions.is_empty() {
                out.push_str(&format!("  actions: {}", entry.active_actions.join(", ")));
            }
            out.push('\n');
        }
        for w in &self.warnings {
            out.push_str(&format!("warning: {}\n", w));
        }
        out
    }
}

/// Runs scenario lists against a fresh simulator on a logical clock.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    tick_ms: u64,
    default_ticks: u32,
}

impl ScenarioRunner {
    pub fn new(tick_ms: u64, default_ticks: u32) -> Self {
        Self {
            tick_ms,
            default_ticks,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.tick_ms, config.ticks_per_scenario)
    }

    pub fn run(
        &self,
        diagram: &Diagram,
        variables: &[Variable],
        scenarios: &[Scenario],
    ) -> Result<ScenarioReport> {
        let session_id = SessionId::new();
        let started_at = Utc::now();
        let mut sim = Simulator::new(diagram, variables);
        let mut now_ms: u64 = 0;

        sim.start(now_ms);
        let mut trace = vec![TraceEntry::capture(&sim, now_ms, None)];
        info!(session = %session_id, scenarios = scenarios.len(), "Scenario run started");

        for scenario in scenarios {
            for (name, value) in &scenario.variables {
                sim.set_variable(name, *value).map_err(|e| {
                    GrafsimError::Scenario(format!("scenario '{}': {}", scenario.name, e))
                })?;
            }
            for _ in 0..scenario.tick_count(self.tick_ms, self.default_ticks) {
                now_ms += self.tick_ms;
                sim.tick(now_ms)?;
                trace.push(TraceEntry::capture(&sim, now_ms, Some(&scenario.name)));
            }
        }

        let mut warnings = Vec::new();
        if sim.active_steps().is_empty() {
            warn!(session = %session_id, "Run ended with no active step");
            warnings.push("run ended with no active step".to_string());
        }
        info!(session = %session_id, ticks = sim.tick_count(), "Scenario run finished");
        sim.stop();

        Ok(ScenarioReport {
            session_id,
            started_at,
            trace,
            warnings,
        })
    }
}
