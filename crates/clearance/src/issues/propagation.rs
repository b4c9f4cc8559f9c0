//! Bottom-up `hasIssues` propagation.
//!
//! Flags are computed from an immutable view of the record first and then
//! written back in a second pass, so no flag is ever read while it is being
//! updated.

use crate::record::{ComplianceRecord, Package};

/// Flag values for one package and its facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFlags {
    pub package: bool,
    pub default_licensings: Vec<bool>,
    pub dir_licensings: Vec<Vec<bool>>,
    pub file_licensings: Vec<Vec<bool>>,
}

/// Flag values for a whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFlags {
    pub project: bool,
    pub packages: Vec<PackageFlags>,
}

/// Compute every `hasIssues` flag from the current issue lists.
pub fn compute_flags(record: &ComplianceRecord) -> IssueFlags {
    let packages: Vec<PackageFlags> = record.project.packages.iter().map(package_flags).collect();
    let project = !record.project.issues.is_empty() || packages.iter().any(|p| p.package);

    IssueFlags { project, packages }
}

fn package_flags(package: &Package) -> PackageFlags {
    let default_licensings: Vec<bool> = package
        .default_licensings
        .iter()
        .map(|f| !f.issues.is_empty())
        .collect();
    let dir_licensings: Vec<Vec<bool>> = package
        .dir_licensings
        .iter()
        .map(|d| d.licenses.iter().map(|f| !f.issues.is_empty()).collect())
        .collect();
    let file_licensings: Vec<Vec<bool>> = package
        .file_licensings
        .iter()
        .map(|f| f.licenses.iter().map(|l| !l.issues.is_empty()).collect())
        .collect();

    let any_child = default_licensings.iter().any(|f| *f)
        || dir_licensings.iter().flatten().any(|f| *f)
        || file_licensings.iter().flatten().any(|f| *f);

    PackageFlags {
        package: !package.issues.is_empty() || any_child,
        default_licensings,
        dir_licensings,
        file_licensings,
    }
}

/// Write computed flags back into the record.
pub fn apply_flags(record: &mut ComplianceRecord, flags: IssueFlags) {
    record.project.has_issues = flags.project;
    for (package, pf) in record.project.packages.iter_mut().zip(flags.packages) {
        package.has_issues = pf.package;
        for (fact, flag) in package.default_licensings.iter_mut().zip(pf.default_licensings) {
            fact.has_issues = flag;
        }
        for (dir, dir_flags) in package.dir_licensings.iter_mut().zip(pf.dir_licensings) {
            for (fact, flag) in dir.licenses.iter_mut().zip(dir_flags) {
                fact.has_issues = flag;
            }
        }
        for (file, file_flags) in package.file_licensings.iter_mut().zip(pf.file_licensings) {
            for (fact, flag) in file.licenses.iter_mut().zip(file_flags) {
                fact.has_issues = flag;
            }
        }
    }
}

/// Recompute and store all `hasIssues` flags.
pub fn propagate(record: &mut ComplianceRecord) {
    let flags = compute_flags(record);
    apply_flags(record, flags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::{Issue, Severity};
    use crate::record::{DirLicensing, Identifier, LicenseFact};

    fn issue() -> Issue {
        Issue {
            id: "W01".to_string(),
            message: "m".to_string(),
            source: String::new(),
        }
    }

    fn record() -> ComplianceRecord {
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        for name in ["a", "b"] {
            let mut pkg = Package::new(Identifier::new("NPM", "", name, "1.0.0"));
            pkg.default_licensings.push(LicenseFact::new("MIT", "LICENSE"));
            let mut dir = DirLicensing::new("lib");
            dir.licenses.push(LicenseFact::new("MIT", "lib/LICENSE"));
            pkg.dir_licensings.push(dir);
            record.project.packages.push(pkg);
        }
        record
    }

    #[test]
    fn test_dir_fact_issue_propagates_to_project() {
        let mut record = record();
        record.project.packages[1].dir_licensings[0].licenses[0]
            .issues
            .push(Severity::Warning, issue());

        propagate(&mut record);

        assert!(record.project.has_issues);
        assert!(!record.project.packages[0].has_issues);
        assert!(record.project.packages[1].has_issues);
        assert!(record.project.packages[1].dir_licensings[0].licenses[0].has_issues);
        assert!(!record.project.packages[1].default_licensings[0].has_issues);
    }

    #[test]
    fn test_stale_flags_are_cleared() {
        let mut record = record();
        record.project.has_issues = true;
        record.project.packages[0].has_issues = true;
        record.project.packages[0].default_licensings[0].has_issues = true;

        propagate(&mut record);

        assert!(!record.project.has_issues);
        assert!(!record.project.packages[0].has_issues);
        assert!(!record.project.packages[0].default_licensings[0].has_issues);
    }

    #[test]
    fn test_project_issue_only_sets_project_flag() {
        let mut record = record();
        record.project.issues.push(Severity::Info, issue());

        let flags = compute_flags(&record);
        assert!(flags.project);
        assert!(flags.packages.iter().all(|p| !p.package));
    }
}
