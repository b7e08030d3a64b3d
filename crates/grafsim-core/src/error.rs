use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrafsimError {
    // Diagram errors
    #[error("Diagram parse error: {0}")]
    DiagramParse(String),

    #[error("Variable definitions parse error: {0}")]
    VariablesParse(String),

    // Simulation errors
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Simulation is not running")]
    SimulationNotRunning,

    #[error("Scenario error: {0}")]
    Scenario(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GrafsimError>;
