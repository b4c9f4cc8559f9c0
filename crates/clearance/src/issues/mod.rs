//! Issue tracking for every stage.
//!
//! Engines report [`Finding`]s to an [`IssueSink`] passed in by the caller.
//! After a stage the [`IssueTracker`] numbers them and attaches them to the
//! record, [`filter_issues`] applies the configured [`IssueLevel`], and
//! [`propagate`] recomputes the `hasIssues` flags bottom-up.

mod issue;
mod propagation;
mod tracker;

pub use issue::{Issue, IssueLevel, IssueList, Severity};
pub use propagation::{apply_flags, compute_flags, propagate, IssueFlags, PackageFlags};
pub use tracker::{filter_issues, Finding, IssueSink, IssueTarget, IssueTracker};
