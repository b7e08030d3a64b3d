use std::collections::HashMap;

use grafsim_core::value::Value;

use super::token::{Operator, Token};

/// One entry of the evaluation stack.
///
/// `source` is set when the value was read from a named variable, so that
/// edge operators can look up that variable's previous value by name.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub value: Value,
    pub source: Option<String>,
}

impl StackEntry {
    fn computed(value: Value) -> Self {
        Self {
            value,
            source: None,
        }
    }
}

/// Evaluate an RPN sequence to a boolean.
///
/// Unknown names read as `false` (and keep their name for `RE`/`FE`).
/// A sequence that underflows the stack or does not reduce to exactly one
/// value is treated as not satisfied.
pub fn evaluate(
    rpn: &[Token],
    vars: &HashMap<String, Value>,
    prev_vars: &HashMap<String, Value>,
) -> bool {
    reduce(rpn, vars, prev_vars).is_some_and(|v| v.truthy())
}

/// Reduce an RPN sequence to its single result value, if it has one.
pub fn reduce(
    rpn: &[Token],
    vars: &HashMap<String, Value>,
    prev_vars: &HashMap<String, Value>,
) -> Option<Value> {
    let mut stack: Vec<StackEntry> = Vec::with_capacity(rpn.len());

    for token in rpn {
        match token {
            Token::Literal(value) => stack.push(StackEntry::computed(*value)),
            Token::Variable(name) => stack.push(StackEntry {
                value: vars.get(name).copied().unwrap_or(Value::Bool(false)),
                source: Some(name.clone()),
            }),
            // Only reachable from unbalanced input; reads like an unknown operand.
            Token::LeftParen | Token::RightParen => {
                stack.push(StackEntry::computed(Value::Bool(false)))
            }
            Token::Operator(op) if op.is_unary() => {
                let operand = stack.pop()?;
                stack.push(StackEntry::computed(apply_unary(*op, &operand, prev_vars)));
            }
            Token::Operator(op) => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(StackEntry::computed(apply_binary(*op, &lhs, &rhs)));
            }
        }
    }

    if stack.len() != 1 {
        return None;
    }
    stack.pop().map(|entry| entry.value)
}

fn apply_unary(op: Operator, operand: &StackEntry, prev_vars: &HashMap<String, Value>) -> Value {
    let current = operand.value.truthy();
    let previous = || {
        operand
            .source
            .as_ref()
            .and_then(|name| prev_vars.get(name))
            .is_some_and(|v| v.truthy())
    };
    let result = match op {
        Operator::Not => !current,
        Operator::RisingEdge => current && !previous(),
        Operator::FallingEdge => !current && previous(),
        _ => false,
    };
    Value::Bool(result)
}

fn apply_binary(op: Operator, lhs: &StackEntry, rhs: &StackEntry) -> Value {
    let (a, b) = (&lhs.value, &rhs.value);
    let result = match op {
        Operator::And => a.truthy() && b.truthy(),
        Operator::Or => a.truthy() || b.truthy(),
        Operator::Greater => a.as_number() > b.as_number(),
        Operator::Less => a.as_number() < b.as_number(),
        Operator::GreaterEq => a.as_number() >= b.as_number(),
        Operator::LessEq => a.as_number() <= b.as_number(),
        _ => false,
    };
    Value::Bool(result)
}

/// Structural check: does the sequence reduce to exactly one value without
/// underflowing, regardless of variable values?
pub fn is_well_formed(rpn: &[Token]) -> bool {
    let mut depth: usize = 0;
    for token in rpn {
        match token {
            Token::Operator(op) if op.is_unary() => {
                if depth < 1 {
                    return false;
                }
            }
            Token::Operator(_) => {
                if depth < 2 {
                    return false;
                }
                depth -= 1;
            }
            _ => depth += 1,
        }
    }
    depth == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse_to_rpn;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn eval(condition: &str, current: &[(&str, Value)], previous: &[(&str, Value)]) -> bool {
        evaluate(&parse_to_rpn(condition), &vars(current), &vars(previous))
    }

    const T: Value = Value::Bool(true);
    const F: Value = Value::Bool(false);

    #[test]
    fn test_boolean_operators() {
        assert!(eval("a AND b", &[("a", T), ("b", T)], &[]));
        assert!(!eval("a AND b", &[("a", T), ("b", F)], &[]));
        assert!(eval("a OR b", &[("a", F), ("b", T)], &[]));
        assert!(eval("a . b", &[("a", T), ("b", T)], &[]));
        assert!(eval("a + b", &[("a", F), ("b", T)], &[]));
        assert!(eval("NOT a", &[("a", F)], &[]));
        assert!(!eval("NOT a", &[("a", T)], &[]));
    }

    #[test]
    fn test_literals() {
        assert!(eval("TRUE", &[], &[]));
        assert!(eval("1", &[], &[]));
        assert!(!eval("FALSE", &[], &[]));
        assert!(!eval("0", &[], &[]));
        assert!(eval("a OR TRUE", &[], &[]));
    }

    #[test]
    fn test_unknown_variable_is_false() {
        assert!(!eval("missing", &[], &[]));
        assert!(eval("NOT missing", &[], &[]));
    }

    #[test]
    fn test_empty_condition_is_false() {
        assert!(!eval("", &[], &[]));
    }

    #[test]
    fn test_comparators() {
        let level = [("level", Value::Number(3.0))];
        assert!(eval("level > 2", &level, &[]));
        assert!(!eval("level < 2", &level, &[]));
        assert!(eval("level >= 3", &level, &[]));
        assert!(eval("level <= 3", &level, &[]));
        assert!(eval("level > 2 AND level < 4", &level, &[]));
        // Booleans compare as 1/0.
        assert!(eval("flag > 0", &[("flag", T)], &[]));
    }

    #[test]
    fn test_time_literal_comparison() {
        assert!(eval("X1.t >= 500ms", &[("X1.t", Value::Number(0.5))], &[]));
        assert!(!eval("X1.t > 5s", &[("X1.t", Value::Number(4.9))], &[]));
    }

    #[test]
    fn test_rising_edge() {
        assert!(eval("RE(v)", &[("v", T)], &[("v", F)]));
        assert!(eval("RE(v)", &[("v", T)], &[]));
        assert!(!eval("RE(v)", &[("v", T)], &[("v", T)]));
        assert!(!eval("RE(v)", &[("v", F)], &[("v", F)]));
        assert!(eval("RE v", &[("v", T)], &[]));
    }

    #[test]
    fn test_falling_edge() {
        assert!(eval("FE(v)", &[("v", F)], &[("v", T)]));
        assert!(!eval("FE(v)", &[("v", F)], &[]));
        assert!(!eval("FE(v)", &[("v", T)], &[("v", T)]));
    }

    #[test]
    fn test_edge_on_unknown_name_uses_identity() {
        // Absent now, present before: a consistent name still falls.
        assert!(eval("FE(ghost)", &[], &[("ghost", T)]));
    }

    #[test]
    fn test_edge_combined_with_logic() {
        assert!(eval("RE(start) AND NOT stop", &[("start", T), ("stop", F)], &[("start", F)]));
        assert!(!eval("RE(start) AND NOT stop", &[("start", T), ("stop", T)], &[("start", F)]));
    }

    #[test]
    fn test_malformed_is_false() {
        assert!(!eval("A AND", &[("A", T)], &[]));
        assert!(!eval("A OR", &[("A", T)], &[]));
        assert!(!eval("A B", &[("A", T), ("B", T)], &[]));
        assert!(!eval("NOT", &[], &[]));
        assert!(!eval("( A", &[("A", T)], &[]));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&parse_to_rpn("a AND (b OR NOT c)")));
        assert!(is_well_formed(&parse_to_rpn("RE(x)")));
        assert!(!is_well_formed(&parse_to_rpn("a AND")));
        assert!(!is_well_formed(&parse_to_rpn("a b")));
        assert!(!is_well_formed(&parse_to_rpn("")));
    }

    #[test]
    fn test_reduce_returns_numeric_value() {
        let rpn = parse_to_rpn("level");
        let v = reduce(&rpn, &vars(&[("level", Value::Number(7.0))]), &HashMap::new());
        assert_eq!(v, Some(Value::Number(7.0)));
    }
}
