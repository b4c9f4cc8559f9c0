//! Error types for the Clearance library.

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::Violation;

/// Main error type for Clearance operations.
///
/// Only fatal conditions are represented here. Malformed rules, ambiguous
/// matches and unsupported expressions are recorded as issues in the output
/// record instead.
#[derive(Debug, Error)]
pub enum ClearanceError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A rule file could not be parsed as YAML.
    #[error("YAML error in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Error from the archive library.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Error fetching a remote document.
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// A rule failed semantic validation.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A package identifier could not be parsed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A license expression could not be parsed.
    #[error("Invalid license expression: {0}")]
    InvalidExpression(String),

    /// A blob path from the record points outside the archive directory.
    #[error("Archive path '{0}' leaves the archive directory")]
    UnsafePath(String),

    /// The record and the archive disagree.
    #[error("Record and archive are inconsistent ({} violation(s))", .violations.len())]
    Inconsistent { violations: Vec<Violation> },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClearanceError {
    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClearanceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for Clearance operations.
pub type Result<T> = std::result::Result<T, ClearanceError>;

/// Process-level classification of a stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stage completed and wrote its output.
    Success,
    /// The consistency validator found violations.
    Inconsistent,
    /// Reading or writing inputs/outputs failed.
    IoFailure,
}

impl Outcome {
    /// Classify the result of a stage run.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) => Self::of_error(e),
        }
    }

    /// Classify a failure.
    pub fn of_error(error: &ClearanceError) -> Self {
        match error {
            ClearanceError::Inconsistent { .. } => Outcome::Inconsistent,
            _ => Outcome::IoFailure,
        }
    }

    /// Exit code the CLI reports for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Inconsistent => 2,
            Outcome::IoFailure => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let ok: Result<()> = Ok(());
        assert_eq!(Outcome::of(&ok), Outcome::Success);

        let inconsistent: Result<()> = Err(ClearanceError::Inconsistent {
            violations: Vec::new(),
        });
        assert_eq!(Outcome::of(&inconsistent), Outcome::Inconsistent);

        let io: Result<()> = Err(ClearanceError::io(
            "missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        ));
        assert_eq!(Outcome::of(&io), Outcome::IoFailure);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_ne!(Outcome::Inconsistent.exit_code(), Outcome::IoFailure.exit_code());
        assert_ne!(Outcome::Inconsistent.exit_code(), 0);
    }
}
