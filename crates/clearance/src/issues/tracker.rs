//! Collecting findings during a stage and attaching them to the record.

use std::collections::HashMap;

use crate::record::{ComplianceRecord, Identifier, LicenseFact, Package};

use super::issue::{Issue, IssueLevel, IssueList, Severity};

/// Where a finding should be attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueTarget {
    /// The project itself.
    Project,
    /// A package.
    Package(Identifier),
    /// A default-scope license fact, located by value and origin path.
    DefaultLicense {
        package: Identifier,
        license: Option<String>,
        path: String,
    },
    /// A directory-scope license fact.
    DirLicense {
        package: Identifier,
        scope: String,
        license: Option<String>,
    },
}

impl IssueTarget {
    /// Package the target belongs to, if any.
    pub fn package(&self) -> Option<&Identifier> {
        match self {
            IssueTarget::Project => None,
            IssueTarget::Package(id)
            | IssueTarget::DefaultLicense { package: id, .. }
            | IssueTarget::DirLicense { package: id, .. } => Some(id),
        }
    }
}

/// A finding reported by an engine, not yet numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub target: IssueTarget,
    pub message: String,
    pub source: String,
}

impl Finding {
    /// Create a new finding.
    pub fn new(severity: Severity, target: IssueTarget, message: impl Into<String>) -> Self {
        Self {
            severity,
            target,
            message: message.into(),
            source: String::new(),
        }
    }

    /// Shorthand for an info-level finding.
    pub fn info(target: IssueTarget, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, target, message)
    }

    /// Shorthand for a warning-level finding.
    pub fn warning(target: IssueTarget, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, target, message)
    }

    /// Shorthand for an error-level finding.
    pub fn error(target: IssueTarget, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, target, message)
    }

    /// Set the reporting component.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Sink every engine reports its findings to.
///
/// One sink is created per run and passed explicitly to each engine call.
pub trait IssueSink {
    /// Record a finding.
    fn report(&mut self, finding: Finding);
}

/// Default sink: keeps findings in order until they are attached.
#[derive(Debug, Default)]
pub struct IssueTracker {
    findings: Vec<Finding>,
}

impl IssueSink for IssueTracker {
    fn report(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Info => tracing::debug!(source = %finding.source, "{}", finding.message),
            Severity::Warning => tracing::warn!(source = %finding.source, "{}", finding.message),
            Severity::Error => tracing::error!(source = %finding.source, "{}", finding.message),
        }
        self.findings.push(finding);
    }
}

impl IssueTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings reported so far.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Number of findings with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Number ids and move every finding into the record.
    ///
    /// Ids continue the per-severity counters of each owner (the project, or
    /// a package together with its facts). Findings for a package missing
    /// from the record are demoted to the project with a package-qualified
    /// id such as `W-NPM::left-pad:1.0.0`.
    pub fn attach(self, record: &mut ComplianceRecord) {
        let mut counters = Counters::default();

        for finding in self.findings {
            let package_index = finding.target.package().map(|id| {
                record
                    .project
                    .packages
                    .iter()
                    .position(|p| &p.id == id)
            });

            match package_index {
                None => {
                    let seq = counters.next_project(&record.project.issues, finding.severity);
                    let id = format!("{}{:02}", finding.severity.prefix(), seq);
                    push(&mut record.project.issues, &finding, id);
                }
                Some(None) => {
                    let qualifier = finding
                        .target
                        .package()
                        .map(|id| id.to_string())
                        .unwrap_or_default();
                    let id = format!("{}-{}", finding.severity.prefix(), qualifier);
                    push(&mut record.project.issues, &finding, id);
                }
                Some(Some(index)) => {
                    let package = &mut record.project.packages[index];
                    let seq = counters.next_package(index, package, finding.severity);
                    let id = format!("{}{:02}", finding.severity.prefix(), seq);
                    let list = target_list(package, &finding.target);
                    push(list, &finding, id);
                }
            }
        }
    }
}

fn push(list: &mut IssueList, finding: &Finding, id: String) {
    list.push(
        finding.severity,
        Issue {
            id,
            message: finding.message.clone(),
            source: finding.source.clone(),
        },
    );
}

/// Issue list a finding lands in; falls back to the package when the fact
/// no longer exists.
fn target_list<'a>(package: &'a mut Package, target: &IssueTarget) -> &'a mut IssueList {
    let fact_index = match target {
        IssueTarget::DefaultLicense { license, path, .. } => package
            .default_licensings
            .iter()
            .position(|f| &f.license == license && &f.path == path)
            .map(|i| (None, i)),
        IssueTarget::DirLicense { scope, license, .. } => package
            .dir_licensings
            .iter()
            .position(|d| &d.scope == scope)
            .and_then(|d| {
                package.dir_licensings[d]
                    .licenses
                    .iter()
                    .position(|f| &f.license == license)
                    .map(|i| (Some(d), i))
            }),
        IssueTarget::Project | IssueTarget::Package(_) => None,
    };

    match fact_index {
        Some((None, i)) => &mut package.default_licensings[i].issues,
        Some((Some(d), i)) => &mut package.dir_licensings[d].licenses[i].issues,
        None => &mut package.issues,
    }
}

/// Per-owner, per-severity sequence counters seeded from existing issues.
#[derive(Default)]
struct Counters {
    project: HashMap<Severity, u32>,
    packages: HashMap<(usize, Severity), u32>,
}

impl Counters {
    fn next_project(&mut self, existing: &IssueList, severity: Severity) -> u32 {
        let counter = self
            .project
            .entry(severity)
            .or_insert_with(|| existing.max_sequence(severity));
        *counter += 1;
        *counter
    }

    fn next_package(&mut self, index: usize, package: &Package, severity: Severity) -> u32 {
        let counter = self
            .packages
            .entry((index, severity))
            .or_insert_with(|| package_max_sequence(package, severity));
        *counter += 1;
        *counter
    }
}

fn package_max_sequence(package: &Package, severity: Severity) -> u32 {
    let facts = package
        .default_licensings
        .iter()
        .chain(package.dir_licensings.iter().flat_map(|d| d.licenses.iter()));
    facts
        .map(|f: &LicenseFact| f.issues.max_sequence(severity))
        .chain(std::iter::once(package.issues.max_sequence(severity)))
        .max()
        .unwrap_or(0)
}

/// Apply the issue-level threshold to every issue list of the record.
pub fn filter_issues(record: &mut ComplianceRecord, level: IssueLevel) {
    record.project.issues.retain_level(level);
    for package in &mut record.project.packages {
        package.issues.retain_level(level);
        for fact in &mut package.default_licensings {
            fact.issues.retain_level(level);
        }
        for dir in &mut package.dir_licensings {
            for fact in &mut dir.licenses {
                fact.issues.retain_level(level);
            }
        }
        for file in &mut package.file_licensings {
            for fact in &mut file.licenses {
                fact.issues.retain_level(level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DirLicensing, LicenseFact, Package};

    fn record() -> ComplianceRecord {
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        let mut pkg = Package::new(Identifier::new("NPM", "", "left-pad", "1.0.0"));
        pkg.default_licensings.push(LicenseFact::new("MIT", "LICENSE"));
        let mut dir = DirLicensing::new("lib");
        dir.licenses.push(LicenseFact::new("BSD-3-Clause", "lib/LICENSE"));
        pkg.dir_licensings.push(dir);
        record.project.packages.push(pkg);
        record
    }

    fn left_pad() -> Identifier {
        Identifier::new("NPM", "", "left-pad", "1.0.0")
    }

    #[test]
    fn test_ids_are_numbered_per_owner_and_severity() {
        let mut record = record();
        let mut tracker = IssueTracker::new();
        tracker.report(Finding::warning(IssueTarget::Project, "p1"));
        tracker.report(Finding::warning(IssueTarget::Package(left_pad()), "k1"));
        tracker.report(Finding::warning(IssueTarget::Project, "p2"));
        tracker.report(Finding::info(IssueTarget::Package(left_pad()), "k2"));
        tracker.report(Finding::warning(
            IssueTarget::DefaultLicense {
                package: left_pad(),
                license: Some("MIT".to_string()),
                path: "LICENSE".to_string(),
            },
            "k3",
        ));
        tracker.attach(&mut record);

        let project = &record.project.issues;
        assert_eq!(project.warnings[0].id, "W01");
        assert_eq!(project.warnings[1].id, "W02");

        let pkg = &record.project.packages[0];
        assert_eq!(pkg.issues.warnings[0].id, "W01");
        assert_eq!(pkg.issues.info[0].id, "I01");
        assert_eq!(pkg.default_licensings[0].issues.warnings[0].id, "W02");
    }

    #[test]
    fn test_counters_continue_existing_ids() {
        let mut record = record();
        record.project.issues.push(
            Severity::Error,
            Issue {
                id: "E04".to_string(),
                message: "old".to_string(),
                source: String::new(),
            },
        );
        let mut tracker = IssueTracker::new();
        tracker.report(Finding::error(IssueTarget::Project, "new"));
        tracker.attach(&mut record);

        assert_eq!(record.project.issues.errors[1].id, "E05");
    }

    #[test]
    fn test_unknown_package_is_demoted_to_project() {
        let mut record = record();
        let ghost = Identifier::new("NPM", "", "ghost", "0.1.0");
        let mut tracker = IssueTracker::new();
        tracker.report(Finding::warning(IssueTarget::Package(ghost), "who?"));
        tracker.attach(&mut record);

        assert_eq!(record.project.issues.warnings[0].id, "W-NPM::ghost:0.1.0");
    }

    #[test]
    fn test_missing_fact_falls_back_to_package() {
        let mut record = record();
        let mut tracker = IssueTracker::new();
        tracker.report(Finding::info(
            IssueTarget::DirLicense {
                package: left_pad(),
                scope: "lib".to_string(),
                license: Some("Apache-2.0".to_string()),
            },
            "gone",
        ));
        tracker.report(Finding::info(
            IssueTarget::DirLicense {
                package: left_pad(),
                scope: "lib".to_string(),
                license: Some("BSD-3-Clause".to_string()),
            },
            "here",
        ));
        tracker.attach(&mut record);

        let pkg = &record.project.packages[0];
        assert_eq!(pkg.issues.info[0].message, "gone");
        assert_eq!(pkg.dir_licensings[0].licenses[0].issues.info[0].id, "I02");
    }

    #[test]
    fn test_filter_applies_to_all_scopes() {
        let mut record = record();
        let mut tracker = IssueTracker::new();
        tracker.report(Finding::info(IssueTarget::Project, "p"));
        tracker.report(Finding::info(
            IssueTarget::DirLicense {
                package: left_pad(),
                scope: "lib".to_string(),
                license: Some("BSD-3-Clause".to_string()),
            },
            "d",
        ));
        tracker.report(Finding::error(IssueTarget::Package(left_pad()), "e"));
        tracker.attach(&mut record);

        filter_issues(&mut record, IssueLevel::Warnings);

        assert!(record.project.issues.is_empty());
        let pkg = &record.project.packages[0];
        assert!(pkg.dir_licensings[0].licenses[0].issues.is_empty());
        assert_eq!(pkg.issues.errors.len(), 1);
    }
}
