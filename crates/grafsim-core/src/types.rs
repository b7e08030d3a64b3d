use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique simulation session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted while a simulation is driven in real time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    Started {
        session_id: SessionId,
        active_steps: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Tick {
        session_id: SessionId,
        tick: u64,
        time_ms: u64,
        active_steps: Vec<String>,
        fired_transitions: Vec<String>,
    },
    Stopped {
        session_id: SessionId,
        ticks: u64,
        timestamp: DateTime<Utc>,
    },
}
