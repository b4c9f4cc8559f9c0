//! Clearance: rule-driven transformation of license compliance records.
//!
//! A compliance record lists the packages of a project with license and
//! copyright facts at default, directory and file scope. License texts and
//! file contents live in a zip archive next to the record. Each stage reads
//! a record and its archive, transforms them, checks that the two still
//! agree, and writes a new pair:
//!
//! - **curate**: delete and insert default-scope facts per package rules
//! - **dedup**: drop facts already implied by an enclosing scope
//! - **resolve**: collapse multi-license files into one expression
//! - **select**: pick one branch of remaining OR compounds
//! - **classify**: set distribution and package type
//! - **merge**: combine several records and archives into one
//!
//! # Example
//!
//! ```no_run
//! use clearance::{IssueLevel, Pipeline, PipelineConfig, Stage};
//!
//! let config = PipelineConfig::new()
//!     .with_rules_dir("rules/resolver")
//!     .with_issue_level(IssueLevel::Warnings);
//! let report = Pipeline::new(config)
//!     .run(Stage::Resolve, "project.json", "out/project.json")
//!     .unwrap();
//!
//! println!("Packages resolved: {}", report.stats.packages_changed);
//! ```

pub mod archive;
pub mod error;
pub mod issues;
pub mod license;
pub mod record;
pub mod rules;
pub mod stages;

mod pipeline;

pub use crate::pipeline::{Pipeline, PipelineConfig, Stage, StageReport};
pub use error::{ClearanceError, Outcome, Result};
pub use issues::{Finding, IssueLevel, IssueSink, IssueTracker, Severity};
pub use record::{ComplianceRecord, Identifier, Package};
pub use rules::{Rule, RuleCatalog, RuleKind};
pub use stages::{CollisionPolicy, DedupConfig, MergeConfig, ResolverConfig, StageStats};
