//! Compound license expressions.
//!
//! Parses expressions such as:
//!   `MIT OR Apache-2.0`
//!   `GPL-2.0-only WITH Classpath-exception-2.0 OR MIT`
//!   `(MIT AND BSD-2-Clause) OR Apache-2.0`
//!
//! Resolution and selection only work on pure `OR` compounds; `AND` is
//! recognized so it can be rejected explicitly.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ClearanceError, Result};

/// A parsed license expression with flattened n-ary operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpression {
    /// Simple license identifier (e.g. "MIT").
    Simple(String),
    /// License with exception (e.g. "GPL-2.0 WITH Classpath-exception-2.0").
    WithException { license: String, exception: String },
    /// Conjunction, all operands apply.
    And(Vec<LicenseExpression>),
    /// Disjunction, any operand may be chosen.
    Or(Vec<LicenseExpression>),
}

impl LicenseExpression {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ClearanceError::InvalidExpression(
                "empty expression".to_string(),
            ));
        }
        let (expr, rest) = parse_or(&tokens)?;
        if !rest.is_empty() {
            return Err(ClearanceError::InvalidExpression(format!(
                "unexpected tokens after expression in '{}'",
                input
            )));
        }
        Ok(expr)
    }

    /// Whether an `AND` appears anywhere in the expression.
    pub fn contains_and(&self) -> bool {
        match self {
            LicenseExpression::Simple(_) | LicenseExpression::WithException { .. } => false,
            LicenseExpression::And(_) => true,
            LicenseExpression::Or(items) => items.iter().any(|e| e.contains_and()),
        }
    }

    /// Alternatives of a pure `OR` compound, or `None` for anything else.
    ///
    /// Nested disjunctions are flattened; a single term is not a compound.
    pub fn alternatives(&self) -> Option<BTreeSet<String>> {
        match self {
            LicenseExpression::Or(_) if !self.contains_and() => {
                let mut out = BTreeSet::new();
                self.collect_alternatives(&mut out);
                (out.len() > 1).then_some(out)
            }
            _ => None,
        }
    }

    fn collect_alternatives(&self, out: &mut BTreeSet<String>) {
        match self {
            LicenseExpression::Or(items) => {
                for item in items {
                    item.collect_alternatives(out);
                }
            }
            other => {
                out.insert(other.to_string());
            }
        }
    }
}

impl fmt::Display for LicenseExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseExpression::Simple(id) => write!(f, "{}", id),
            LicenseExpression::WithException { license, exception } => {
                write!(f, "{} WITH {}", license, exception)
            }
            LicenseExpression::And(items) => write_joined(f, items, " AND "),
            LicenseExpression::Or(items) => write_joined(f, items, " OR "),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    items: &[LicenseExpression],
    separator: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        match item {
            LicenseExpression::And(_) | LicenseExpression::Or(_) => write!(f, "({})", item)?,
            _ => write!(f, "{}", item)?,
        }
    }
    Ok(())
}

/// Alternatives of a pure `OR` compound given as text.
pub fn or_alternatives(expression: &str) -> Option<BTreeSet<String>> {
    LicenseExpression::parse(expression)
        .ok()
        .and_then(|e| e.alternatives())
}

/// Whether two texts denote the same `OR` compound, regardless of operand order.
pub fn same_compound(a: &str, b: &str) -> bool {
    match (or_alternatives(a), or_alternatives(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Whether a license value looks like a compound of any kind.
pub fn is_compound(license: &str) -> bool {
    LicenseExpression::parse(license)
        .map(|e| matches!(e, LicenseExpression::And(_) | LicenseExpression::Or(_)))
        .unwrap_or(false)
}

// ─── Tokenizer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "WITH" => Token::With,
                    _ => Token::Identifier(word),
                });
            }
        }
    }

    Ok(tokens)
}

// ─── Recursive descent: or > and > with > atom ─────────────────────

fn parse_or(tokens: &[Token]) -> Result<(LicenseExpression, &[Token])> {
    let (first, mut rest) = parse_and(tokens)?;
    let mut items = vec![first];
    while let Some((Token::Or, after)) = rest.split_first() {
        let (next, remaining) = parse_and(after)?;
        items.push(next);
        rest = remaining;
    }
    Ok((collapse(items, LicenseExpression::Or), rest))
}

fn parse_and(tokens: &[Token]) -> Result<(LicenseExpression, &[Token])> {
    let (first, mut rest) = parse_with(tokens)?;
    let mut items = vec![first];
    while let Some((Token::And, after)) = rest.split_first() {
        let (next, remaining) = parse_with(after)?;
        items.push(next);
        rest = remaining;
    }
    Ok((collapse(items, LicenseExpression::And), rest))
}

fn parse_with(tokens: &[Token]) -> Result<(LicenseExpression, &[Token])> {
    let (atom, rest) = parse_atom(tokens)?;
    match (atom, rest) {
        (LicenseExpression::Simple(license), [Token::With, Token::Identifier(exception), tail @ ..]) => {
            Ok((
                LicenseExpression::WithException {
                    license,
                    exception: exception.clone(),
                },
                tail,
            ))
        }
        (_, [Token::With, ..]) => Err(ClearanceError::InvalidExpression(
            "WITH must join a license and an exception".to_string(),
        )),
        (atom, rest) => Ok((atom, rest)),
    }
}

fn parse_atom(tokens: &[Token]) -> Result<(LicenseExpression, &[Token])> {
    match tokens.split_first() {
        Some((Token::Identifier(id), rest)) => Ok((LicenseExpression::Simple(id.clone()), rest)),
        Some((Token::LParen, rest)) => {
            let (inner, rest) = parse_or(rest)?;
            match rest.split_first() {
                Some((Token::RParen, rest)) => Ok((inner, rest)),
                _ => Err(ClearanceError::InvalidExpression(
                    "missing closing parenthesis".to_string(),
                )),
            }
        }
        Some((token, _)) => Err(ClearanceError::InvalidExpression(format!(
            "unexpected token {:?}",
            token
        ))),
        None => Err(ClearanceError::InvalidExpression(
            "unexpected end of expression".to_string(),
        )),
    }
}

fn collapse(
    mut items: Vec<LicenseExpression>,
    wrap: fn(Vec<LicenseExpression>) -> LicenseExpression,
) -> LicenseExpression {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple() {
        let expr = LicenseExpression::parse("MIT").expect("parse failed");
        assert_eq!(expr, LicenseExpression::Simple("MIT".to_string()));
        assert!(expr.alternatives().is_none());
    }

    #[test]
    fn test_or_alternatives_ignore_order() {
        assert_eq!(
            or_alternatives("MIT OR Apache-2.0"),
            Some(set(&["Apache-2.0", "MIT"]))
        );
        assert!(same_compound("MIT OR Apache-2.0", "Apache-2.0 OR MIT"));
        assert!(!same_compound("MIT OR Apache-2.0", "MIT OR BSD-3-Clause"));
    }

    #[test]
    fn test_nested_or_is_flattened() {
        assert_eq!(
            or_alternatives("MIT OR (Apache-2.0 OR BSD-3-Clause)"),
            Some(set(&["Apache-2.0", "BSD-3-Clause", "MIT"]))
        );
    }

    #[test]
    fn test_and_is_not_an_or_compound() {
        let expr = LicenseExpression::parse("(MIT AND BSD-2-Clause) OR Apache-2.0")
            .expect("parse failed");
        assert!(expr.contains_and());
        assert!(expr.alternatives().is_none());
        assert!(is_compound("MIT AND BSD-2-Clause"));
    }

    #[test]
    fn test_with_exception_is_one_alternative() {
        assert_eq!(
            or_alternatives("GPL-2.0-only WITH Classpath-exception-2.0 OR MIT"),
            Some(set(&["GPL-2.0-only WITH Classpath-exception-2.0", "MIT"]))
        );
    }

    #[test]
    fn test_lowercase_words_are_identifiers() {
        assert!(!is_compound("GPL-2.0-or-later"));
        assert!(or_alternatives("MIT or Apache-2.0").is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(LicenseExpression::parse("").is_err());
        assert!(LicenseExpression::parse("(MIT OR Apache-2.0").is_err());
        assert!(LicenseExpression::parse("MIT OR").is_err());
        assert!(LicenseExpression::parse("MIT Apache-2.0").is_err());
    }

    #[test]
    fn test_display_round_trips_structure() {
        let expr = LicenseExpression::parse("(MIT AND BSD-2-Clause) OR Apache-2.0")
            .expect("parse failed");
        assert_eq!(expr.to_string(), "(MIT AND BSD-2-Clause) OR Apache-2.0");
    }
}
