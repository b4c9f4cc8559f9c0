//! Combining several records and their archives into one.
//!
//! Blob paths of every input are moved below a directory named after a
//! hash of that input's origin, so inputs never overwrite each other's
//! files. Packages with the same identifier in more than one input are
//! collisions and are settled by the configured [`CollisionPolicy`].

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::archive::BlobStore;
use crate::error::{ClearanceError, Result};
use crate::issues::{Finding, IssueSink, IssueTarget};
use crate::record::{is_sentinel, ComplianceRecord, Identifier, Package};

use super::StageStats;

const SOURCE: &str = "Merge";
const PREFIX_LEN: usize = 12;

/// What to do with packages that differ between inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep the package of the earliest input and warn about the rest.
    #[default]
    FirstWins,
    /// Leave every copy out of the merged record and report an error.
    Reject,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::FirstWins => write!(f, "first-wins"),
            CollisionPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for CollisionPolicy {
    type Err = ClearanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "first-wins" | "first" => Ok(CollisionPolicy::FirstWins),
            "reject" => Ok(CollisionPolicy::Reject),
            other => Err(ClearanceError::Config(format!(
                "unknown collision policy '{}' (expected first-wins or reject)",
                other
            ))),
        }
    }
}

/// Merge settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub project_name: String,
    pub collision_policy: CollisionPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            project_name: "merged".to_string(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }
}

/// One record to merge, with the unpacked archive it refers to.
pub struct MergeInput<'a> {
    record: &'a ComplianceRecord,
    store: &'a BlobStore,
    prefix: String,
}

impl<'a> MergeInput<'a> {
    /// `origin_key` identifies the input, usually the bytes of its archive.
    /// Equal keys give equal blob prefixes across runs.
    pub fn new(record: &'a ComplianceRecord, store: &'a BlobStore, origin_key: &[u8]) -> Self {
        let digest = format!("{:x}", Sha256::digest(origin_key));
        Self {
            record,
            store,
            prefix: digest[..PREFIX_LEN].to_string(),
        }
    }

    /// Directory all blobs of this input are moved into.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Merges records into a fresh one.
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Merge `inputs` in order, copying referenced blobs into `target`.
    ///
    /// The returned record has an empty archive path; the caller sets it
    /// once the target directory is packed.
    pub fn run(
        &self,
        inputs: &[MergeInput<'_>],
        target: &BlobStore,
        sink: &mut dyn IssueSink,
    ) -> Result<(ComplianceRecord, StageStats)> {
        let mut stats = StageStats::default();
        let mut candidates: IndexMap<&Identifier, Vec<(usize, &Package)>> = IndexMap::new();

        for (index, input) in inputs.iter().enumerate() {
            for package in &input.record.project.packages {
                if package.has_errors() {
                    sink.report(
                        Finding::warning(
                            IssueTarget::Project,
                            format!(
                                "{} of input {} has errors and was not merged",
                                package.id,
                                index + 1
                            ),
                        )
                        .with_source(SOURCE),
                    );
                    stats.packages_skipped += 1;
                    continue;
                }
                candidates.entry(&package.id).or_default().push((index, package));
            }
        }

        let mut record = ComplianceRecord::new(self.config.project_name.clone(), "");
        for (id, copies) in candidates {
            let (index, package) = copies[0];
            let differing = copies.iter().filter(|(_, p)| *p != package).count();

            if differing > 0 {
                let inputs_seen: Vec<String> =
                    copies.iter().map(|(i, _)| (i + 1).to_string()).collect();
                match self.config.collision_policy {
                    CollisionPolicy::FirstWins => {
                        sink.report(
                            Finding::warning(
                                IssueTarget::Package(id.clone()),
                                format!(
                                    "differs between inputs {}; kept input {}",
                                    inputs_seen.join(", "),
                                    index + 1
                                ),
                            )
                            .with_source(SOURCE),
                        );
                        stats.packages_skipped += copies.len() - 1;
                    }
                    CollisionPolicy::Reject => {
                        sink.report(
                            Finding::error(
                                IssueTarget::Project,
                                format!(
                                    "{} differs between inputs {} and was left out",
                                    id,
                                    inputs_seen.join(", ")
                                ),
                            )
                            .with_source(SOURCE),
                        );
                        stats.packages_skipped += copies.len();
                        continue;
                    }
                }
            } else if copies.len() > 1 {
                tracing::debug!(package = %id, copies = copies.len(), "Identical duplicates merged");
            }

            let merged = self.relocate(package, &inputs[index], target)?;
            stats.packages_changed += 1;
            stats.facts_changed += merged.blob_references().count();
            record.project.packages.push(merged);
        }

        tracing::info!(
            inputs = inputs.len(),
            packages = record.project.packages.len(),
            skipped = stats.packages_skipped,
            "Merge finished"
        );
        Ok((record, stats))
    }

    /// Copy a package's blobs into `target` below the input prefix and
    /// rewrite its references to match.
    fn relocate(&self, package: &Package, input: &MergeInput<'_>, target: &BlobStore) -> Result<Package> {
        for path in package.blob_references() {
            let relocated = format!("{}/{}", input.prefix, path);
            if !target.contains(&relocated) {
                target.write(&relocated, &input.store.read(path)?)?;
            }
        }

        let mut package = package.clone();
        let prefix = |slot: &mut Option<String>| {
            if let Some(path) = slot
                && !is_sentinel(path)
            {
                *path = format!("{}/{}", input.prefix, path);
            }
        };

        for fact in &mut package.default_licensings {
            prefix(&mut fact.license_text_in_archive);
        }
        for dir in &mut package.dir_licensings {
            for fact in &mut dir.licenses {
                prefix(&mut fact.license_text_in_archive);
            }
        }
        for file in &mut package.file_licensings {
            prefix(&mut file.file_content_in_archive);
            for fact in &mut file.licenses {
                prefix(&mut fact.license_text_in_archive);
            }
        }
        Ok(package)
    }
}
