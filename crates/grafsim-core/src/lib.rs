pub mod config;
pub mod diagram;
pub mod error;
pub mod event;
pub mod types;
pub mod value;

pub use config::AppConfig;
pub use diagram::{Action, Connection, Diagram, Gate, GateKind, Step, StepKind, Transition, VarType, Variable};
pub use error::{GrafsimError, Result};
pub use event::EventBus;
pub use types::*;
pub use value::Value;
