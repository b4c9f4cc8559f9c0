//! Merge command - combine several records into one.

use std::path::PathBuf;

use clearance::{CollisionPolicy, IssueLevel, MergeConfig, Pipeline, PipelineConfig};
use colored::Colorize;

use super::print_report;

pub fn run(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    name: String,
    collisions: CollisionPolicy,
    issue_level: IssueLevel,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(format!("Record not found: {}", missing.display()).into());
    }

    if !json {
        println!(
            "{} {} records ({} collisions)",
            "Merging".cyan().bold(),
            inputs.len().to_string().white().bold(),
            collisions
        );
    }

    let config = PipelineConfig::new()
        .with_issue_level(issue_level)
        .with_merge(
            MergeConfig::new()
                .with_project_name(name)
                .with_collision_policy(collisions),
        );
    let report = Pipeline::new(config).merge(&inputs, &output)?;
    print_report(&report, json)
}
