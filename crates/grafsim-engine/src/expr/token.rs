use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use grafsim_core::value::Value;

/// Condition operators, unary (`NOT`, `RE`, `FE`) and binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Not,
    RisingEdge,
    FallingEdge,
    And,
    Or,
    Greater,
    Less,
    GreaterEq,
    LessEq,
}

impl Operator {
    /// Classify a raw token. Keywords are case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let op = match raw.to_ascii_uppercase().as_str() {
            "NOT" => Operator::Not,
            "RE" => Operator::RisingEdge,
            "FE" => Operator::FallingEdge,
            "AND" | "." | "*" => Operator::And,
            "OR" | "+" => Operator::Or,
            ">" => Operator::Greater,
            "<" => Operator::Less,
            ">=" => Operator::GreaterEq,
            "<=" => Operator::LessEq,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength; higher binds tighter. `(` acts as 0 on the stack.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Not | Operator::RisingEdge | Operator::FallingEdge => 5,
            Operator::Greater | Operator::Less | Operator::GreaterEq | Operator::LessEq => 4,
            Operator::And => 2,
            Operator::Or => 1,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::Not | Operator::RisingEdge | Operator::FallingEdge
        )
    }

    pub fn is_edge(self) -> bool {
        matches!(self, Operator::RisingEdge | Operator::FallingEdge)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Not => "NOT",
            Operator::RisingEdge => "RE",
            Operator::FallingEdge => "FE",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::GreaterEq => ">=",
            Operator::LessEq => "<=",
        };
        f.write_str(s)
    }
}

/// A lexical unit of a condition, and an entry of the RPN sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Operator(Operator),
    Variable(String),
    Literal(Value),
    LeftParen,
    RightParen,
}

impl Token {
    /// Classify one whitespace-delimited word.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "(" => return Token::LeftParen,
            ")" => return Token::RightParen,
            _ => {}
        }
        if let Some(op) = Operator::parse(raw) {
            return Token::Operator(op);
        }
        match parse_literal(raw) {
            Some(value) => Token::Literal(value),
            None => Token::Variable(raw.to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Operator(op) => write!(f, "{}", op),
            Token::Variable(name) => f.write_str(name),
            Token::Literal(value) => write!(f, "{}", value),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
        }
    }
}

fn time_literal() -> &'static Regex {
    static TIME: OnceLock<Regex> = OnceLock::new();
    TIME.get_or_init(|| Regex::new(r"^(\d+)(ms|s)$").expect("valid time literal pattern"))
}

/// `TRUE`/`1`, `FALSE`/`0`, time literals (`5s`, `500ms`, in seconds), or a
/// bare number. Anything else is a variable reference.
pub fn parse_literal(raw: &str) -> Option<Value> {
    match raw.to_ascii_uppercase().as_str() {
        "TRUE" | "1" => return Some(Value::Bool(true)),
        "FALSE" | "0" => return Some(Value::Bool(false)),
        _ => {}
    }

    if let Some(caps) = time_literal().captures(raw) {
        let amount: f64 = caps[1].parse().ok()?;
        let seconds = if &caps[2] == "ms" { amount / 1000.0 } else { amount };
        return Some(Value::Number(seconds));
    }

    // `f64::from_str` also accepts `inf`/`nan`, which are valid variable names here.
    let numeric_start = raw
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.');
    if numeric_start {
        return raw.parse::<f64>().ok().map(Value::Number);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_keywords_case_insensitive() {
        assert_eq!(Operator::parse("and"), Some(Operator::And));
        assert_eq!(Operator::parse("Or"), Some(Operator::Or));
        assert_eq!(Operator::parse("not"), Some(Operator::Not));
        assert_eq!(Operator::parse("re"), Some(Operator::RisingEdge));
        assert_eq!(Operator::parse("FE"), Some(Operator::FallingEdge));
        assert_eq!(Operator::parse("."), Some(Operator::And));
        assert_eq!(Operator::parse("*"), Some(Operator::And));
        assert_eq!(Operator::parse("+"), Some(Operator::Or));
        assert_eq!(Operator::parse(">="), Some(Operator::GreaterEq));
        assert_eq!(Operator::parse("start"), None);
    }

    #[test]
    fn test_precedence_table() {
        assert_eq!(Operator::Not.precedence(), 5);
        assert_eq!(Operator::RisingEdge.precedence(), 5);
        assert_eq!(Operator::LessEq.precedence(), 4);
        assert_eq!(Operator::And.precedence(), 2);
        assert_eq!(Operator::Or.precedence(), 1);
        assert!(Operator::Not.is_unary());
        assert!(!Operator::Not.is_edge());
        assert!(Operator::FallingEdge.is_edge());
    }

    #[test]
    fn test_time_literals() {
        assert_eq!(parse_literal("5s"), Some(Value::Number(5.0)));
        assert_eq!(parse_literal("500ms"), Some(Value::Number(0.5)));
        assert_eq!(parse_literal("0ms"), Some(Value::Number(0.0)));
    }

    #[test]
    fn test_boolean_and_numeric_literals() {
        assert_eq!(parse_literal("TRUE"), Some(Value::Bool(true)));
        assert_eq!(parse_literal("false"), Some(Value::Bool(false)));
        assert_eq!(parse_literal("1"), Some(Value::Bool(true)));
        assert_eq!(parse_literal("0"), Some(Value::Bool(false)));
        assert_eq!(parse_literal("12"), Some(Value::Number(12.0)));
        assert_eq!(parse_literal("2.5"), Some(Value::Number(2.5)));
    }

    #[test]
    fn test_names_are_not_literals() {
        assert_eq!(parse_literal("start"), None);
        assert_eq!(parse_literal("X1.t"), None);
        assert_eq!(parse_literal("nan"), None);
        assert_eq!(parse_literal("5sec"), None);
        assert_eq!(Token::classify("X1"), Token::Variable("X1".into()));
    }
}
