//! The compliance record: project, packages and their scoped facts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::issues::IssueList;

use super::identifier::Identifier;

/// Path sentinel for facts derived from the declared-license summary.
pub const DECLARED_PATH: &str = "[DECLARED]";

/// Path sentinel for facts added by a curation rule.
pub const CURATED_PATH: &str = "[CURATED]";

/// Text marker for facts that are configured or declared but carry no text
/// of their own; never resolved against the archive.
pub const FOUND_IN_FILE_SCOPE: &str = "[FOUND-IN-FILE-SCOPE]";

/// License value that never collapses into an ancestor scope.
pub const NOASSERTION: &str = "NOASSERTION";

/// Root of a compliance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub project: Project,
}

/// The project owning all packages and the archive reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub name: String,

    /// Archive file, relative to the record file.
    pub archive_path: String,

    #[serde(default)]
    pub has_issues: bool,

    #[serde(default, skip_serializing_if = "IssueList::is_empty")]
    pub issues: IssueList,

    #[serde(default)]
    pub packages: Vec<Package>,
}

/// How a package reaches the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Distribution {
    #[default]
    Distributed,
    Preinstalled,
    Dev,
}

/// Kind of artifact a package contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
    #[default]
    Library,
    Executable,
}

/// A package and all of its license and copyright facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: Identifier,

    /// Declared license expression, if the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_license: Option<String>,

    #[serde(default)]
    pub distribution: Distribution,

    #[serde(default)]
    pub package_type: PackageType,

    /// License facts come from standardized per-file declarations.
    #[serde(default)]
    pub reuse_compliant: bool,

    #[serde(default)]
    pub has_issues: bool,

    #[serde(default, skip_serializing_if = "IssueList::is_empty")]
    pub issues: IssueList,

    #[serde(default)]
    pub default_licensings: Vec<LicenseFact>,

    #[serde(default)]
    pub default_copyrights: Vec<CopyrightFact>,

    #[serde(default)]
    pub dir_licensings: Vec<DirLicensing>,

    #[serde(default)]
    pub file_licensings: Vec<FileLicensing>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified_copyrights: Option<Vec<String>>,
}

/// A license fact at any scope level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseFact {
    pub license: Option<String>,

    /// Origin of the fact within its scope.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_text_in_archive: Option<String>,

    /// Full expression before a selection rule picked one branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_licenses: Option<String>,

    #[serde(default)]
    pub has_issues: bool,

    #[serde(default, skip_serializing_if = "IssueList::is_empty")]
    pub issues: IssueList,
}

/// A copyright fact at any scope level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyrightFact {
    pub copyright: Option<String>,
    pub path: String,
}

/// Facts scoped to a directory subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirLicensing {
    pub scope: String,

    #[serde(default)]
    pub licenses: Vec<LicenseFact>,

    #[serde(default)]
    pub copyrights: Vec<CopyrightFact>,
}

/// Facts scoped to a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLicensing {
    pub scope: String,

    /// The file's own content, stored in the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content_in_archive: Option<String>,

    #[serde(default)]
    pub licenses: Vec<LicenseFact>,

    #[serde(default)]
    pub copyrights: Vec<CopyrightFact>,
}

impl ComplianceRecord {
    /// Create an empty record pointing at the given archive.
    pub fn new(name: impl Into<String>, archive_path: impl Into<String>) -> Self {
        Self {
            project: Project {
                name: name.into(),
                archive_path: archive_path.into(),
                has_issues: false,
                issues: IssueList::new(),
                packages: Vec::new(),
            },
        }
    }

    /// Get a package by identifier.
    pub fn package(&self, id: &Identifier) -> Option<&Package> {
        self.project.packages.iter().find(|p| &p.id == id)
    }

    /// Get a package by identifier for mutation.
    pub fn package_mut(&mut self, id: &Identifier) -> Option<&mut Package> {
        self.project.packages.iter_mut().find(|p| &p.id == id)
    }

    /// Every archive path referenced anywhere in the record, sentinels excluded.
    pub fn blob_references(&self) -> impl Iterator<Item = &str> {
        self.project.packages.iter().flat_map(|p| p.blob_references())
    }
}

impl Package {
    /// Create a package without any facts.
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            declared_license: None,
            distribution: Distribution::default(),
            package_type: PackageType::default(),
            reuse_compliant: false,
            has_issues: false,
            issues: IssueList::new(),
            default_licensings: Vec::new(),
            default_copyrights: Vec::new(),
            dir_licensings: Vec::new(),
            file_licensings: Vec::new(),
            unified_copyrights: None,
        }
    }

    /// Whether the package or any of its facts carries an error-level issue.
    pub fn has_errors(&self) -> bool {
        self.issues.has_errors()
            || self.default_licensings.iter().any(|f| f.issues.has_errors())
            || self
                .dir_licensings
                .iter()
                .flat_map(|d| d.licenses.iter())
                .any(|f| f.issues.has_errors())
    }

    /// Archive paths referenced by this package, sentinels excluded.
    pub fn blob_references(&self) -> impl Iterator<Item = &str> {
        let default = self
            .default_licensings
            .iter()
            .filter_map(|f| f.license_text_in_archive.as_deref());
        let dirs = self
            .dir_licensings
            .iter()
            .flat_map(|d| d.licenses.iter())
            .filter_map(|f| f.license_text_in_archive.as_deref());
        let files = self.file_licensings.iter().flat_map(|f| {
            f.licenses
                .iter()
                .filter_map(|l| l.license_text_in_archive.as_deref())
                .chain(f.file_content_in_archive.as_deref())
        });
        default
            .chain(dirs)
            .chain(files)
            .filter(|path| !is_sentinel(path))
    }

    /// Distinct default-scope license values.
    pub fn default_license_values(&self) -> BTreeSet<String> {
        self.default_licensings
            .iter()
            .filter_map(|f| f.license.clone())
            .collect()
    }

    /// Get a directory scope by path.
    pub fn dir_licensing(&self, scope: &str) -> Option<&DirLicensing> {
        self.dir_licensings.iter().find(|d| d.scope == scope)
    }

    /// Get a file scope by path.
    pub fn file_licensing(&self, scope: &str) -> Option<&FileLicensing> {
        self.file_licensings.iter().find(|f| f.scope == scope)
    }

    /// Remove file and directory scopes that no longer carry any fact.
    ///
    /// A file scope that still references its own content is kept unless
    /// `purge` is set. Returns the blob paths released by removed scopes.
    pub fn prune_empty_scopes(&mut self, purge: bool) -> Vec<String> {
        let mut released = Vec::new();

        self.file_licensings.retain(|f| {
            let empty = f.licenses.is_empty() && f.copyrights.is_empty();
            if !empty {
                return true;
            }
            match &f.file_content_in_archive {
                Some(_) if !purge => true,
                Some(content) => {
                    released.push(content.clone());
                    false
                }
                None => false,
            }
        });

        self.dir_licensings
            .retain(|d| !(d.licenses.is_empty() && d.copyrights.is_empty()));

        released
    }
}

impl LicenseFact {
    /// Create a license fact without archive text.
    pub fn new(license: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            license: Some(license.into()),
            path: path.into(),
            license_text_in_archive: None,
            original_licenses: None,
            has_issues: false,
            issues: IssueList::new(),
        }
    }

    /// Set the archive path of the license text.
    pub fn with_text(mut self, archive_path: impl Into<String>) -> Self {
        self.license_text_in_archive = Some(archive_path.into());
        self
    }

    /// Whether this fact was derived from the declared-license summary.
    pub fn is_declared(&self) -> bool {
        self.path == DECLARED_PATH
    }

    /// Archive blob owned by this fact, sentinels excluded.
    pub fn blob(&self) -> Option<&str> {
        self.license_text_in_archive
            .as_deref()
            .filter(|path| !is_sentinel(path))
    }
}

impl CopyrightFact {
    /// Create a copyright fact.
    pub fn new(copyright: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            copyright: Some(copyright.into()),
            path: path.into(),
        }
    }
}

impl DirLicensing {
    /// Create an empty directory scope.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            licenses: Vec::new(),
            copyrights: Vec::new(),
        }
    }
}

impl FileLicensing {
    /// Create an empty file scope.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            file_content_in_archive: None,
            licenses: Vec::new(),
            copyrights: Vec::new(),
        }
    }

    /// Distinct license values of this file.
    pub fn license_values(&self) -> BTreeSet<String> {
        self.licenses.iter().filter_map(|f| f.license.clone()).collect()
    }
}

/// Whether an archive path is a marker rather than a real blob.
pub fn is_sentinel(path: &str) -> bool {
    path == FOUND_IN_FILE_SCOPE || path == DECLARED_PATH
}
