use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GrafsimError, Result};

/// Top-level grafsim configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Tick loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tick period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Upper bound on ticks for a real-time run (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Ticks evaluated per scenario entry when the scenario does not say.
    #[serde(default = "default_ticks_per_scenario")]
    pub ticks_per_scenario: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            max_ticks: default_max_ticks(),
            ticks_per_scenario: default_ticks_per_scenario(),
        }
    }
}

fn default_tick_ms() -> u64 { 100 }
fn default_max_ticks() -> u64 { 1000 }
fn default_ticks_per_scenario() -> u32 { 1 }

/// Static analysis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Treat warnings as failures in `grafsim check`.
    #[serde(default)]
    pub warnings_as_errors: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive. `RUST_LOG` takes precedence.
    #[serde(default)]
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| GrafsimError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| GrafsimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file absent, using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.simulation.tick_ms == 0 {
            return Err(GrafsimError::Config(
                "simulation.tick_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
