//! CLI command implementations.

pub mod merge;
pub mod stage;
pub mod status;
pub mod validate;

use colored::Colorize;
use clearance::StageReport;

/// Print the outcome of a completed run.
pub(crate) fn print_report(report: &StageReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} {} in {} ms",
        "Finished".green().bold(),
        report.stage.white().bold(),
        elapsed.num_milliseconds()
    );
    println!();

    println!("{}", "Packages:".yellow().bold());
    println!("  Changed:  {}", report.stats.packages_changed.to_string().white());
    if report.stats.packages_skipped > 0 {
        println!("  Skipped:  {}", report.stats.packages_skipped.to_string().yellow());
    }
    println!("  Facts:    {}", report.stats.facts_changed.to_string().white());
    if report.stats.blobs_deleted > 0 {
        println!("  Blobs deleted: {}", report.stats.blobs_deleted.to_string().white());
    }
    println!();

    println!("{}", "Findings:".yellow().bold());
    println!("  Errors:   {}", report.errors.to_string().red());
    println!("  Warnings: {}", report.warnings.to_string().yellow());
    println!("  Info:     {}", report.info.to_string().blue());
    println!();

    println!(
        "Record written to {} (archive {})",
        report.output.display().to_string().cyan(),
        report.archive.display().to_string().cyan()
    );
    Ok(())
}
