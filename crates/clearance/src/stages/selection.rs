//! Choosing one branch of the OR compounds left after resolution.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::issues::{Finding, IssueSink, IssueTarget};
use crate::license::LicenseExpression;
use crate::record::{ComplianceRecord, LicenseFact, Package};
use crate::rules::{RuleCatalog, SelectorRule};

use super::StageStats;

const SOURCE: &str = "Selection";

/// The selection engine.
pub struct SelectionEngine<'a> {
    catalog: &'a RuleCatalog,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self { catalog }
    }

    /// Rewrite every compound a selector rule covers.
    ///
    /// Compounds nobody selects for stay as they are and are reported as
    /// informational findings.
    pub fn run(&self, record: &mut ComplianceRecord, sink: &mut dyn IssueSink) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let empty = SelectorRule::new();

        for package in &mut record.project.packages {
            if self.catalog.matching(&package.id).len() > 1 {
                self.catalog.find(&package.id, sink);
                stats.packages_skipped += 1;
                continue;
            }
            let rule = self
                .catalog
                .find(&package.id, sink)
                .and_then(|r| r.as_selector())
                .unwrap_or(&empty);

            let changed = select_package(package, rule, sink);
            stats.changed(changed);
        }

        tracing::info!(
            packages = stats.packages_changed,
            facts = stats.facts_changed,
            "Selection finished"
        );
        Ok(stats)
    }
}

#[derive(Clone, Copy)]
enum Location<'a> {
    Default,
    Dir(&'a str),
    File,
}

/// Apply a selector rule to every file, directory and default fact.
pub fn select_package(package: &mut Package, rule: &SelectorRule, sink: &mut dyn IssueSink) -> usize {
    let id = package.id.clone();
    let mut unmatched: BTreeSet<String> = BTreeSet::new();
    let mut changed = 0;

    let mut visit = |fact: &mut LicenseFact, location: Location<'_>, sink: &mut dyn IssueSink| {
        let Some(license) = fact.license.clone() else {
            return;
        };
        let Ok(expression) = LicenseExpression::parse(&license) else {
            return;
        };
        if !matches!(expression, LicenseExpression::And(_) | LicenseExpression::Or(_)) {
            return;
        }

        // AND compounds have no single branch to pick, so they always end
        // up unmatched.
        let selection = expression
            .alternatives()
            .and_then(|alternatives| rule.selection_for(&alternatives));
        match selection {
            Some(selection) => {
                fact.original_licenses = Some(license);
                fact.license = Some(selection.selected.clone());
                changed += 1;
            }
            None => {
                if matches!(location, Location::File) && !unmatched.insert(license.clone()) {
                    return;
                }
                let target = match location {
                    Location::Default => IssueTarget::DefaultLicense {
                        package: id.clone(),
                        license: Some(license.clone()),
                        path: fact.path.clone(),
                    },
                    Location::Dir(scope) => IssueTarget::DirLicense {
                        package: id.clone(),
                        scope: scope.to_string(),
                        license: Some(license.clone()),
                    },
                    Location::File => IssueTarget::Package(id.clone()),
                };
                sink.report(
                    Finding::info(target, format!("no selection for compound '{}'", license))
                        .with_source(SOURCE),
                );
            }
        }
    };

    for file in &mut package.file_licensings {
        for fact in &mut file.licenses {
            visit(fact, Location::File, sink);
        }
    }
    for dir in &mut package.dir_licensings {
        let scope = dir.scope.clone();
        for fact in &mut dir.licenses {
            visit(fact, Location::Dir(&scope), sink);
        }
    }
    for fact in &mut package.default_licensings {
        visit(fact, Location::Default, sink);
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::{IssueTracker, Severity};
    use crate::record::{DirLicensing, FileLicensing, Identifier};
    use crate::rules::{Rule, RuleIdentifier, RulePayload};

    fn package() -> Package {
        let mut pkg = Package::new(Identifier::new("NPM", "", "left-pad", "1.0.0"));
        let mut file = FileLicensing::new("lib/a.js");
        file.licenses.push(LicenseFact::new("MIT OR Apache-2.0", "lib/a.js"));
        pkg.file_licensings.push(file);
        let mut dir = DirLicensing::new("lib");
        dir.licenses.push(LicenseFact::new("Apache-2.0 OR MIT", "lib/a.js"));
        pkg.dir_licensings.push(dir);
        pkg.default_licensings
            .push(LicenseFact::new("MIT OR Apache-2.0", "lib/a.js"));
        pkg.default_licensings.push(LicenseFact::new("GPL-2.0 OR ISC", "COPYING"));
        pkg
    }

    #[test]
    fn test_selection_keeps_original_expression() {
        let mut pkg = package();
        let rule = SelectorRule::new().with_selection("MIT OR Apache-2.0", "MIT");
        let mut tracker = IssueTracker::new();

        let changed = select_package(&mut pkg, &rule, &mut tracker);

        assert_eq!(changed, 3);
        let file_fact = &pkg.file_licensings[0].licenses[0];
        assert_eq!(file_fact.license.as_deref(), Some("MIT"));
        assert_eq!(file_fact.original_licenses.as_deref(), Some("MIT OR Apache-2.0"));
        let dir_fact = &pkg.dir_licensings[0].licenses[0];
        assert_eq!(dir_fact.license.as_deref(), Some("MIT"));
        assert_eq!(dir_fact.original_licenses.as_deref(), Some("Apache-2.0 OR MIT"));
    }

    #[test]
    fn test_unmatched_compound_is_informational() {
        let mut pkg = package();
        let rule = SelectorRule::new().with_selection("MIT OR Apache-2.0", "MIT");
        let mut tracker = IssueTracker::new();

        select_package(&mut pkg, &rule, &mut tracker);

        assert_eq!(tracker.count(Severity::Info), 1);
        assert_eq!(tracker.count(Severity::Error), 0);
        assert_eq!(
            pkg.default_licensings[1].license.as_deref(),
            Some("GPL-2.0 OR ISC")
        );
        assert!(matches!(
            tracker.findings()[0].target,
            IssueTarget::DefaultLicense { .. }
        ));
    }

    #[test]
    fn test_and_compound_is_reported_unmatched() {
        let mut pkg = Package::new(Identifier::new("NPM", "", "left-pad", "1.0.0"));
        let mut file = FileLicensing::new("lib/a.js");
        file.licenses
            .push(LicenseFact::new("MIT AND (Apache-2.0 OR ISC)", "lib/a.js"));
        pkg.file_licensings.push(file);
        pkg.default_licensings.push(LicenseFact::new("MIT AND BSD-3-Clause", "LICENSE"));
        pkg.default_licensings.push(LicenseFact::new("MIT", "LICENSE"));
        let rule = SelectorRule::new().with_selection("Apache-2.0 OR ISC", "ISC");
        let mut tracker = IssueTracker::new();

        let changed = select_package(&mut pkg, &rule, &mut tracker);

        assert_eq!(changed, 0);
        assert_eq!(tracker.count(Severity::Info), 2);
        assert!(tracker.findings()[0].message.contains("MIT AND (Apache-2.0 OR ISC)"));
        assert!(matches!(tracker.findings()[0].target, IssueTarget::Package(_)));
        assert!(matches!(
            tracker.findings()[1].target,
            IssueTarget::DefaultLicense { .. }
        ));
    }

    #[test]
    fn test_engine_runs_without_rule() {
        let catalog = RuleCatalog::from_rules(vec![Rule::new(
            RuleIdentifier::new("NPM", "", "other", ""),
            RulePayload::Selector(SelectorRule::new().with_selection("MIT OR ISC", "ISC")),
        )
        .expect("valid rule")]);
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(package());

        let mut tracker = IssueTracker::new();
        let stats = SelectionEngine::new(&catalog)
            .run(&mut record, &mut tracker)
            .expect("selection failed");

        assert_eq!(stats.packages_changed, 0);
        assert_eq!(tracker.count(Severity::Info), 4);
    }
}
