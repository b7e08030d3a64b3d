use super::token::Token;

/// Put spaces around parentheses and comparators so that splitting on
/// whitespace isolates them. `>=`/`<=` are kept whole.
fn normalize(condition: &str) -> String {
    let mut out = String::with_capacity(condition.len() * 2);
    let mut chars = condition.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' | ')' => {
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            '>' | '<' => {
                out.push(' ');
                out.push(c);
                if chars.peek() == Some(&'=') {
                    chars.next();
                    out.push('=');
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split a condition into classified tokens.
pub fn tokenize(condition: &str) -> Vec<Token> {
    normalize(condition)
        .split_whitespace()
        .map(Token::classify)
        .collect()
}

/// Convert a condition to Reverse Polish Notation (shunting-yard).
///
/// A `)` pops operators until the matching `(`; if an edge operator sits
/// right under that `(` it is popped too, so `RE(x)` binds as a unit.
/// Parentheses are not checked for balance: a stray `)` drains the whole
/// stack and a stray `(` is left in the output.
pub fn parse_to_rpn(condition: &str) -> Vec<Token> {
    let mut output: Vec<Token> = Vec::new();
    let mut stack: Vec<Token> = Vec::new();

    for token in tokenize(condition) {
        match token {
            Token::Variable(_) | Token::Literal(_) => output.push(token),
            Token::LeftParen => stack.push(token),
            Token::RightParen => {
                while let Some(top) = stack.pop() {
                    if top == Token::LeftParen {
                        break;
                    }
                    output.push(top);
                }
                if matches!(stack.last(), Some(Token::Operator(op)) if op.is_edge()) {
                    output.extend(stack.pop());
                }
            }
            Token::Operator(op) => {
                while let Some(Token::Operator(top)) = stack.last() {
                    let top = *top;
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    // Prefix operators never pop their own kind.
                    if op.is_unary() && top.precedence() == op.precedence() {
                        break;
                    }
                    output.push(Token::Operator(top));
                    stack.pop();
                }
                stack.push(Token::Operator(op));
            }
        }
    }

    while let Some(token) = stack.pop() {
        output.push(token);
    }
    output
}

/// True when every `)` closes an earlier `(` and none stay open.
pub fn parens_balanced(condition: &str) -> bool {
    let mut depth: i64 = 0;
    for token in tokenize(condition) {
        match token {
            Token::LeftParen => depth += 1,
            Token::RightParen => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpn(condition: &str) -> String {
        parse_to_rpn(condition)
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_normalize_spacing() {
        let words: Vec<String> = tokenize("(a>=5)AND(b<c)")
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(words, vec!["(", "a", ">=", "5", ")", "AND", "(", "b", "<", "c", ")"]);
    }

    #[test]
    fn test_single_variable() {
        assert_eq!(rpn("start"), "start");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(rpn("a OR b AND c"), "a b c AND OR");
        assert_eq!(rpn("a . b + c"), "a b AND c OR");
        assert_eq!(rpn("a * b"), "a b AND");
    }

    #[test]
    fn test_left_associative_binary() {
        assert_eq!(rpn("a AND b AND c"), "a b AND c AND");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(rpn("(a OR b) AND c"), "a b OR c AND");
    }

    #[test]
    fn test_comparators_bind_tighter_than_logic() {
        assert_eq!(rpn("X1.t > 5 AND ok"), "X1.t 5 > ok AND");
        assert_eq!(rpn("level>=2.5"), "level 2.5 >=");
    }

    #[test]
    fn test_unary_prefix_chain() {
        assert_eq!(rpn("NOT NOT a"), "a NOT NOT");
        assert_eq!(rpn("NOT a AND b"), "a NOT b AND");
    }

    #[test]
    fn test_edge_binds_to_parenthesized_operand() {
        assert_eq!(rpn("RE(x) AND y"), "x RE y AND");
        assert_eq!(rpn("FE (a OR b)"), "a b OR FE");
        assert_eq!(rpn("NOT (a) AND b"), "a NOT b AND");
    }

    #[test]
    fn test_unbalanced_parentheses_are_not_rejected() {
        // Stray `)` drains the stack; stray `(` lands in the output.
        assert_eq!(rpn("a AND b )"), "a b AND");
        assert_eq!(rpn("( a AND b"), "a b AND (");
    }

    #[test]
    fn test_empty_condition() {
        assert!(parse_to_rpn("").is_empty());
        assert!(parse_to_rpn("   ").is_empty());
    }

    #[test]
    fn test_parens_balanced() {
        assert!(parens_balanced("(a AND (b OR c))"));
        assert!(parens_balanced("a"));
        assert!(!parens_balanced("(a"));
        assert!(!parens_balanced("a)("));
    }
}
