//! Issue types recorded in compliance records.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity level of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only, no action required.
    Info,
    /// Potential problem that should be reviewed.
    Warning,
    /// Definite problem; the affected package is excluded from later stages.
    Error,
}

impl Severity {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Prefix used when numbering issues of this severity.
    pub fn prefix(&self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Warning => 'W',
            Severity::Error => 'E',
        }
    }
}

/// A single issue attached to a scope of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Identifier such as `W02`, unique per severity within its owner.
    pub id: String,
    /// Human-readable description.
    pub message: String,
    /// Stage or component that raised the issue.
    #[serde(default)]
    pub source: String,
}

/// Issues of one scope, grouped by severity in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Issue>,
}

impl IssueList {
    /// Create an empty issue list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no issue of any severity is present.
    pub fn is_empty(&self) -> bool {
        self.info.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Total number of issues.
    pub fn len(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }

    /// Whether any error-level issue is present.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Issues of the given severity.
    pub fn of(&self, severity: Severity) -> &[Issue] {
        match severity {
            Severity::Info => &self.info,
            Severity::Warning => &self.warnings,
            Severity::Error => &self.errors,
        }
    }

    /// Append an issue with the given severity.
    pub fn push(&mut self, severity: Severity, issue: Issue) {
        match severity {
            Severity::Info => self.info.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Error => self.errors.push(issue),
        }
    }

    /// Drop every severity the level does not keep.
    pub fn retain_level(&mut self, level: IssueLevel) {
        if !level.keeps(Severity::Info) {
            self.info.clear();
        }
        if !level.keeps(Severity::Warning) {
            self.warnings.clear();
        }
        if !level.keeps(Severity::Error) {
            self.errors.clear();
        }
    }

    /// Highest sequence number already used for a severity.
    pub(crate) fn max_sequence(&self, severity: Severity) -> u32 {
        let prefix = severity.prefix();
        self.of(severity)
            .iter()
            .filter_map(|issue| {
                let rest = issue.id.strip_prefix(prefix)?;
                rest.parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0)
    }
}

/// Threshold applied to every issue list before output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    /// Keep every issue.
    #[default]
    All,
    /// Drop info-level issues.
    Warnings,
    /// Drop info and warning issues.
    Errors,
    /// Drop all issues.
    None,
}

impl IssueLevel {
    /// Whether issues of this severity survive filtering.
    pub fn keeps(&self, severity: Severity) -> bool {
        match self {
            IssueLevel::All => true,
            IssueLevel::Warnings => severity >= Severity::Warning,
            IssueLevel::Errors => severity == Severity::Error,
            IssueLevel::None => false,
        }
    }
}

impl FromStr for IssueLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "info" => Ok(IssueLevel::All),
            "warnings" | "warning" => Ok(IssueLevel::Warnings),
            "errors" | "error" => Ok(IssueLevel::Errors),
            "none" | "off" => Ok(IssueLevel::None),
            _ => Err(format!(
                "Unknown issue level: {}. Use all, warnings, errors, or none.",
                s
            )),
        }
    }
}

impl std::fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueLevel::All => write!(f, "all"),
            IssueLevel::Warnings => write!(f, "warnings"),
            IssueLevel::Errors => write!(f, "errors"),
            IssueLevel::None => write!(f, "none"),
        }
    }
}
