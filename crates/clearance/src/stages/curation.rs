//! Applying curation rules to default-scope facts.

use std::path::Path;

use crate::archive::BlobStore;
use crate::error::Result;
use crate::issues::{Finding, IssueSink, IssueTarget};
use crate::record::{
    ComplianceRecord, CopyrightFact, LicenseFact, Package, CURATED_PATH, FOUND_IN_FILE_SCOPE,
};
use crate::rules::{wildcard_regex, CopyrightOp, CurationRule, LicenseOp, RuleCatalog};

use super::StageStats;

const SOURCE: &str = "Curation";

/// Applies the matching curation rule to each package.
pub struct CurationEngine<'a> {
    catalog: &'a RuleCatalog,
    store: &'a BlobStore,
}

impl<'a> CurationEngine<'a> {
    pub fn new(catalog: &'a RuleCatalog, store: &'a BlobStore) -> Self {
        Self { catalog, store }
    }

    /// Curate every package that has exactly one matching rule.
    pub fn run(&self, record: &mut ComplianceRecord, sink: &mut dyn IssueSink) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let mut released = Vec::new();

        for package in &mut record.project.packages {
            let ambiguous = self.catalog.matching(&package.id).len() > 1;
            let Some(rule) = self.catalog.find(&package.id, sink) else {
                if ambiguous {
                    stats.packages_skipped += 1;
                }
                continue;
            };
            let Some(curation) = rule.as_curation() else {
                continue;
            };

            tracing::debug!(package = %package.id, origin = %rule.origin, "Applying curation");
            let changed = self.apply(package, curation, &mut released, sink)?;
            stats.changed(changed);
        }

        stats.blobs_deleted = self.store.collect_garbage(record, released)?.len();
        tracing::info!(
            packages = stats.packages_changed,
            facts = stats.facts_changed,
            "Curation finished"
        );
        Ok(stats)
    }

    /// Apply one rule; blobs of deleted facts are pushed to `released`.
    fn apply(
        &self,
        package: &mut Package,
        rule: &CurationRule,
        released: &mut Vec<String>,
        sink: &mut dyn IssueSink,
    ) -> Result<usize> {
        let mut changed = 0;

        for op in rule.license_ops() {
            match op {
                LicenseOp::Delete(license) => {
                    let (kept, removed): (Vec<_>, Vec<_>) = package
                        .default_licensings
                        .drain(..)
                        .partition(|f| f.license.as_deref() != Some(license.as_str()));
                    package.default_licensings = kept;
                    if removed.is_empty() {
                        sink.report(
                            Finding::info(
                                IssueTarget::Package(package.id.clone()),
                                format!("no default license '{}' to delete", license),
                            )
                            .with_source(SOURCE),
                        );
                    }
                    changed += removed.len();
                    released.extend(removed.iter().filter_map(|f| f.blob()).map(str::to_string));
                }
                LicenseOp::Insert {
                    license,
                    path,
                    text,
                } => {
                    let present = package
                        .default_licensings
                        .iter()
                        .any(|f| f.license.as_deref() == Some(license.as_str()));
                    if present {
                        tracing::debug!(package = %package.id, %license, "License already present");
                        continue;
                    }
                    let archived = match &text {
                        Some(file) => self.store_text(package, file)?,
                        None => FOUND_IN_FILE_SCOPE.to_string(),
                    };
                    let path = path.unwrap_or_else(|| CURATED_PATH.to_string());
                    package
                        .default_licensings
                        .push(LicenseFact::new(license, path).with_text(archived));
                    changed += 1;
                }
            }
        }

        for op in rule.copyright_ops() {
            match op {
                CopyrightOp::DeleteAll => {
                    if package.default_copyrights.is_empty() {
                        sink.report(
                            Finding::info(
                                IssueTarget::Package(package.id.clone()),
                                "no default copyrights to delete",
                            )
                            .with_source(SOURCE),
                        );
                    }
                    changed += package.default_copyrights.len();
                    package.default_copyrights.clear();
                }
                CopyrightOp::Delete(pattern) => {
                    let re = wildcard_regex(&pattern)?;
                    let before = package.default_copyrights.len();
                    package
                        .default_copyrights
                        .retain(|c| !c.copyright.as_deref().is_some_and(|v| re.is_match(v)));
                    let removed = before - package.default_copyrights.len();
                    if removed == 0 {
                        sink.report(
                            Finding::info(
                                IssueTarget::Package(package.id.clone()),
                                format!("no default copyright matches '{}'", pattern),
                            )
                            .with_source(SOURCE),
                        );
                    }
                    changed += removed;
                }
                CopyrightOp::Insert { copyright, path } => {
                    let present = package
                        .default_copyrights
                        .iter()
                        .any(|c| c.copyright.as_deref() == Some(copyright.as_str()));
                    if !present {
                        let path = path.unwrap_or_else(|| CURATED_PATH.to_string());
                        package
                            .default_copyrights
                            .push(CopyrightFact::new(copyright, path));
                        changed += 1;
                    }
                }
            }
        }

        Ok(changed)
    }

    /// Copy a curated license text below the package's archive directory.
    fn store_text(&self, package: &Package, file: &Path) -> Result<String> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "LICENSE".to_string());
        let relative = format!("{}/curated/{}", package.id.archive_dir(), name);
        self.store.copy_in(file, &relative)?;
        Ok(relative)
    }
}
