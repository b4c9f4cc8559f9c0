//! Version matching for rule identifiers.
//!
//! A rule version is either blank (any version), an exact version, an Ivy
//! dynamic revision such as `1.0.+`, or an Ivy range:
//!
//! | Expression   | Meaning              |
//! |--------------|----------------------|
//! | `[1.0,2.0]`  | 1.0 <= v <= 2.0      |
//! | `[1.0,2.0[`  | 1.0 <= v < 2.0       |
//! | `]1.0,2.0]`  | 1.0 < v <= 2.0       |
//! | `[1.0,)`     | v >= 1.0             |
//! | `(,2.0]`     | v <= 2.0             |

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ClearanceError, Result};

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\[\]\(])\s*([^,\s]*)\s*,\s*([^,\s]*)\s*([\[\]\)])$")
        .unwrap_or_else(|e| panic!("invalid range regex: {e}"))
});

/// One end of a version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: String,
    pub inclusive: bool,
}

/// Parsed version constraint of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Blank version: every package version matches.
    Any,
    /// Exactly this version.
    Exact(String),
    /// Dynamic revision: versions starting with this prefix.
    Prefix(String),
    /// Interval with optional bounds.
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
}

impl VersionSpec {
    /// Parse a version constraint.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() || input == "+" {
            return Ok(VersionSpec::Any);
        }
        if let Some(prefix) = input.strip_suffix('+') {
            return Ok(VersionSpec::Prefix(prefix.to_string()));
        }
        if !input.starts_with(['[', ']', '(']) {
            return Ok(VersionSpec::Exact(input.to_string()));
        }

        let caps = RANGE.captures(input).ok_or_else(|| {
            ClearanceError::InvalidRule(format!("malformed version range '{}'", input))
        })?;
        let lower = bound(&caps[2], &caps[1] == "[");
        let upper = bound(&caps[3], &caps[4] == "]");

        match (&lower, &upper) {
            (None, None) => Err(ClearanceError::InvalidRule(format!(
                "version range '{}' has no bounds",
                input
            ))),
            (Some(l), Some(u)) if compare_versions(&l.version, &u.version) == Ordering::Greater => {
                Err(ClearanceError::InvalidRule(format!(
                    "version range '{}' has lower bound above upper bound",
                    input
                )))
            }
            _ => Ok(VersionSpec::Range { lower, upper }),
        }
    }

    /// Whether a concrete package version satisfies the constraint.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Exact(expected) => expected == version,
            VersionSpec::Prefix(prefix) => version.starts_with(prefix.as_str()),
            VersionSpec::Range { lower, upper } => {
                let above = lower.as_ref().is_none_or(|b| {
                    match compare_versions(version, &b.version) {
                        Ordering::Greater => true,
                        Ordering::Equal => b.inclusive,
                        Ordering::Less => false,
                    }
                });
                let below = upper.as_ref().is_none_or(|b| {
                    match compare_versions(version, &b.version) {
                        Ordering::Less => true,
                        Ordering::Equal => b.inclusive,
                        Ordering::Greater => false,
                    }
                });
                above && below
            }
        }
    }
}

fn bound(version: &str, inclusive: bool) -> Option<Bound> {
    (!version.is_empty()).then(|| Bound {
        version: version.to_string(),
        inclusive,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Part<'a> {
    Number(u64),
    Text(&'a str),
}

fn parts(version: &str) -> Vec<Part<'_>> {
    let mut out = Vec::new();
    for segment in version.split(['.', '-', '_', '+']) {
        let mut start = 0;
        let bytes = segment.as_bytes();
        for i in 1..=bytes.len() {
            let boundary = i == bytes.len()
                || bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit();
            if boundary {
                let piece = &segment[start..i];
                out.push(match piece.parse::<u64>() {
                    Ok(n) => Part::Number(n),
                    Err(_) => Part::Text(piece),
                });
                start = i;
            }
        }
    }
    out
}

/// Compare two versions part by part.
///
/// Numeric parts compare numerically and sort above text parts. When one
/// version runs out, a trailing text part (a qualifier such as `beta`) makes
/// the longer version smaller, a trailing number makes it larger.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = parts(a);
    let right = parts(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Part::Number(x), Part::Number(y)) => x.cmp(y),
            (Part::Text(x), Part::Text(y)) => x.cmp(y),
            (Part::Number(_), Part::Text(_)) => Ordering::Greater,
            (Part::Text(_), Part::Number(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => match left[right.len()] {
            Part::Text(_) => Ordering::Less,
            Part::Number(_) => Ordering::Greater,
        },
        Ordering::Less => match right[left.len()] {
            Part::Text(_) => Ordering::Greater,
            Part::Number(_) => Ordering::Less,
        },
    }
}
