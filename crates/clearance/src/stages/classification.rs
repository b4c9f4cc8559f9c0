//! Setting distribution and package type from classification rules.

use crate::error::Result;
use crate::issues::IssueSink;
use crate::record::ComplianceRecord;
use crate::rules::RuleCatalog;

use super::StageStats;

/// Overwrites the classification of every package with exactly one rule.
pub struct ClassificationEngine<'a> {
    catalog: &'a RuleCatalog,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn run(&self, record: &mut ComplianceRecord, sink: &mut dyn IssueSink) -> Result<StageStats> {
        let mut stats = StageStats::default();

        for package in &mut record.project.packages {
            let ambiguous = self.catalog.matching(&package.id).len() > 1;
            let Some(rule) = self
                .catalog
                .find(&package.id, sink)
                .and_then(|r| r.as_classification())
            else {
                if ambiguous {
                    stats.packages_skipped += 1;
                }
                continue;
            };

            let mut changed = 0;
            if let Some(distribution) = rule.distribution
                && distribution != package.distribution
            {
                package.distribution = distribution;
                changed += 1;
            }
            if let Some(package_type) = rule.package_type
                && package_type != package.package_type
            {
                package.package_type = package_type;
                changed += 1;
            }
            if changed > 0 {
                tracing::debug!(
                    package = %package.id,
                    distribution = ?package.distribution,
                    package_type = ?package.package_type,
                    "Package reclassified"
                );
            }
            stats.changed(changed);
        }

        tracing::info!(packages = stats.packages_changed, "Classification finished");
        Ok(stats)
    }
}
