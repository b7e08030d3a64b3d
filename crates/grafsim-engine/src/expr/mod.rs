//! Transition condition language.
//!
//! Conditions are written in the GRAFCET style: `start AND NOT stop`,
//! `RE(button) + X3.t > 5s`, `level >= 2.5`. They are tokenized on
//! whitespace, converted to RPN with a shunting-yard pass, and evaluated
//! against a name → value context plus the previous tick's values for
//! edge detection.

pub mod eval;
pub mod parser;
pub mod token;

use std::collections::HashMap;

use grafsim_core::value::Value;

pub use eval::{evaluate, is_well_formed, reduce, StackEntry};
pub use parser::{parens_balanced, parse_to_rpn, tokenize};
pub use token::{Operator, Token};

/// A condition parsed once and evaluated many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    rpn: Vec<Token>,
}

impl Condition {
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let rpn = parse_to_rpn(&source);
        Self { source, rpn }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rpn(&self) -> &[Token] {
        &self.rpn
    }

    pub fn is_empty(&self) -> bool {
        self.rpn.is_empty()
    }

    pub fn evaluate(&self, vars: &HashMap<String, Value>, prev_vars: &HashMap<String, Value>) -> bool {
        evaluate(&self.rpn, vars, prev_vars)
    }

    /// Names referenced by the condition, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for token in &self.rpn {
            if let Token::Variable(name) = token {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// RPN rendered as space-separated words, for diagnostics.
    pub fn rpn_string(&self) -> String {
        self.rpn
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
