//! Structured package identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClearanceError;

/// Identifies a package by ecosystem type, namespace, name and version.
///
/// The canonical string form is `Type:namespace:name:version`, e.g.
/// `NPM::left-pad:1.0.0` for a package without namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl Identifier {
    /// Create an identifier from its four parts.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Relative directory used for this package's blobs inside an archive.
    pub fn archive_dir(&self) -> String {
        [&self.kind, &self.namespace, &self.name, &self.version]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| sanitize(part))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// File name used for rule templates generated for this package.
    pub fn file_stem(&self) -> String {
        self.archive_dir().replace('/', "_")
    }
}

/// Keep a path part filesystem-safe; parts made only of dots become
/// underscores so `.` and `..` never act as directory references.
fn sanitize(part: &str) -> String {
    if part.chars().all(|c| c == '.') {
        return "_".repeat(part.len());
    }
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.kind, self.namespace, self.name, self.version
        )
    }
}

impl FromStr for Identifier {
    type Err = ClearanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(namespace), Some(name), Some(version))
                if !kind.is_empty() && !name.is_empty() =>
            {
                Ok(Identifier::new(kind, namespace, name, version))
            }
            _ => Err(ClearanceError::InvalidIdentifier(format!(
                "'{}' is not of the form Type:namespace:name:version",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier_without_namespace() {
        let id: Identifier = "NPM::left-pad:1.0.0".parse().expect("parse failed");
        assert_eq!(id.kind, "NPM");
        assert_eq!(id.namespace, "");
        assert_eq!(id.name, "left-pad");
        assert_eq!(id.version, "1.0.0");
        assert_eq!(id.to_string(), "NPM::left-pad:1.0.0");
    }

    #[test]
    fn test_parse_identifier_rejects_short_forms() {
        assert!("NPM:left-pad".parse::<Identifier>().is_err());
        assert!(":ns:name:1".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_version_may_contain_colons() {
        let id: Identifier = "Maven:org.acme:core:1:2".parse().expect("parse failed");
        assert_eq!(id.version, "1:2");
    }

    #[test]
    fn test_archive_dir_sanitizes_parts() {
        let id = Identifier::new("NPM", "@types", "node", "18.0.0");
        assert_eq!(id.archive_dir(), "NPM/_types/node/18.0.0");
        assert_eq!(id.file_stem(), "NPM__types_node_18.0.0");
    }

    #[test]
    fn test_archive_dir_neutralizes_dot_parts() {
        let id = Identifier::new("NPM", "..", "..", ".");
        assert_eq!(id.archive_dir(), "NPM/__/__/_");
        assert!(!id.archive_dir().split('/').any(|p| p == ".." || p == "."));
    }
}
