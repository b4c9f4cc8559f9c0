//! Bidirectional check between record references and archive contents.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::issues::{Finding, IssueSink, IssueTarget};
use crate::record::{ComplianceRecord, Identifier};

use super::blobs::BlobStore;

const SOURCE: &str = "ConsistencyValidator";

/// A disagreement between the record and the archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    /// A package references a blob the archive does not contain.
    Missing { path: String, package: Identifier },
    /// The archive contains a file nothing references.
    Unreferenced { path: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing { path, package } => {
                write!(f, "'{}' referenced by {} is missing from the archive", path, package)
            }
            Violation::Unreferenced { path } => {
                write!(f, "'{}' is in the archive but not referenced", path)
            }
        }
    }
}

/// Compare the record against the blob store in both directions.
///
/// Sentinel markers are not blob references and are never checked.
pub fn check_consistency(record: &ComplianceRecord, store: &BlobStore) -> Result<Vec<Violation>> {
    let files = store.files()?;
    let mut violations = BTreeSet::new();
    let mut referenced: BTreeSet<&str> = BTreeSet::new();

    for package in &record.project.packages {
        for path in package.blob_references() {
            referenced.insert(path);
            if !files.contains(path) {
                violations.insert(Violation::Missing {
                    path: path.to_string(),
                    package: package.id.clone(),
                });
            }
        }
    }

    for file in &files {
        if !referenced.contains(file.as_str()) {
            violations.insert(Violation::Unreferenced { path: file.clone() });
        }
    }

    Ok(violations.into_iter().collect())
}

/// Report each violation as a project-level error.
pub fn report_violations(violations: &[Violation], sink: &mut dyn IssueSink) {
    for violation in violations {
        sink.report(Finding::error(IssueTarget::Project, violation.to_string()).with_source(SOURCE));
    }
}
