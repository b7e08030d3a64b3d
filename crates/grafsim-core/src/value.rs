use std::fmt;

use serde::{Deserialize, Serialize};

/// A process variable value: either a boolean or a number.
///
/// Integers and floats share the `Number` representation; the declared
/// variable type only matters to the editor and to display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
}

impl Value {
    /// Boolean view of the value. Numbers are true when non-zero.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
        }
    }

    /// Numeric view of the value. Booleans map to `1.0` / `0.0`.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => *n,
        }
    }

    /// Parse a loosely written value as typed on a command line or in a
    /// scenario table: `true`/`false` (any case), `on`/`off`, or a number.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "on" => return Some(Value::Bool(true)),
            "false" | "off" => return Some(Value::Bool(false)),
            _ => {}
        }
        trimmed.parse::<f64>().ok().map(Value::Number)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Bool(false)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}
