//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use clearance::{CollisionPolicy, IssueLevel};
use std::path::PathBuf;

/// Clearance: rule-driven transformation of license compliance records
#[derive(Parser)]
#[command(name = "clearance")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Input and output of a record-to-record stage.
#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Input compliance record (JSON)
    #[arg(value_name = "RECORD")]
    pub input: PathBuf,

    /// Output record; the archive is written next to it as <name>.zip
    #[arg(short, long)]
    pub output: PathBuf,

    /// Issues kept in the output (all, warnings, errors, none)
    #[arg(long, default_value = "all")]
    pub issue_level: IssueLevel,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply curation rules to default-scope facts
    Curate {
        #[command(flatten)]
        stage: StageArgs,

        /// Directory of curation rule files
        #[arg(short, long)]
        rules: PathBuf,
    },

    /// Remove facts already implied by an enclosing scope
    Dedup {
        #[command(flatten)]
        stage: StageArgs,

        /// Compare license and copyright lists as sets
        #[arg(long)]
        distinct: bool,

        /// Also drop file scopes that only reference their own content
        #[arg(long)]
        purge: bool,

        /// Move file, directory and default copyrights into one sorted unifiedCopyrights list
        #[arg(long)]
        unify_copyrights: bool,
    },

    /// Collapse files with several licenses into one expression
    Resolve {
        #[command(flatten)]
        stage: StageArgs,

        /// Directory of resolver rule files
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Also resolve subsets (two or more) of a resolution's licenses
        #[arg(long)]
        any_subset: bool,

        /// Declared-license document (file path or http(s) URL)
        #[arg(long)]
        declared: Option<String>,

        /// Write rule templates for unresolved packages to this directory
        #[arg(long)]
        templates: Option<PathBuf>,
    },

    /// Pick one branch of OR compounds
    Select {
        #[command(flatten)]
        stage: StageArgs,

        /// Directory of selector rule files
        #[arg(short, long)]
        rules: PathBuf,
    },

    /// Set distribution and package type from classification rules
    Classify {
        #[command(flatten)]
        stage: StageArgs,

        /// Directory of classification rule files
        #[arg(short, long)]
        rules: PathBuf,
    },

    /// Merge several records and their archives into one
    Merge {
        /// Input compliance records, in priority order
        #[arg(value_name = "RECORD", required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output record
        #[arg(short, long)]
        output: PathBuf,

        /// Project name of the merged record
        #[arg(long, default_value = "merged")]
        name: String,

        /// Handling of packages that differ between inputs (first-wins, reject)
        #[arg(long, default_value = "first-wins")]
        collisions: CollisionPolicy,

        /// Issues kept in the output (all, warnings, errors, none)
        #[arg(long, default_value = "all")]
        issue_level: IssueLevel,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a record and its archive agree
    Validate {
        /// Compliance record (JSON)
        #[arg(value_name = "RECORD")]
        file: PathBuf,
    },

    /// Show a summary of a record
    Status {
        /// Compliance record (JSON)
        #[arg(value_name = "RECORD")]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
