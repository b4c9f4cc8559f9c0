//! Validate command - check a record against its archive.

use std::path::PathBuf;

use clearance::{ClearanceError, Pipeline, PipelineConfig};
use colored::Colorize;

pub fn run(file: PathBuf, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("Record not found: {}", file.display()).into());
    }

    let violations = Pipeline::new(PipelineConfig::new()).validate(&file)?;
    if violations.is_empty() {
        println!(
            "{} {} and its archive agree",
            "OK".green().bold(),
            file.display().to_string().white()
        );
        return Ok(());
    }

    println!(
        "{} {} violation(s) in {}",
        "Inconsistent:".red().bold(),
        violations.len(),
        file.display()
    );
    let shown = if verbose { violations.len() } else { 20 };
    for violation in violations.iter().take(shown) {
        println!("  {} {}", "-".red(), violation);
    }
    if violations.len() > shown {
        println!(
            "  ... and {} more (use --verbose to list all)",
            violations.len() - shown
        );
    }

    Err(Box::new(ClearanceError::Inconsistent { violations }))
}
