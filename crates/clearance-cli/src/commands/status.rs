//! Status command - show a summary of a compliance record.

use std::path::PathBuf;

use clearance::issues::IssueList;
use clearance::{ComplianceRecord, Package, Severity};
use colored::Colorize;

#[derive(Default)]
struct IssueCounts {
    errors: usize,
    warnings: usize,
    info: usize,
}

impl IssueCounts {
    fn add(&mut self, list: &IssueList) {
        self.errors += list.of(Severity::Error).len();
        self.warnings += list.of(Severity::Warning).len();
        self.info += list.of(Severity::Info).len();
    }
}

fn package_counts(package: &Package, counts: &mut IssueCounts) {
    counts.add(&package.issues);
    for fact in &package.default_licensings {
        counts.add(&fact.issues);
    }
    for dir in &package.dir_licensings {
        for fact in &dir.licenses {
            counts.add(&fact.issues);
        }
    }
    for file in &package.file_licensings {
        for fact in &file.licenses {
            counts.add(&fact.issues);
        }
    }
}

pub fn run(file: PathBuf, json_output: bool, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("Record not found: {}", file.display()).into());
    }

    let record = ComplianceRecord::load(&file)?;
    let project = &record.project;

    let mut counts = IssueCounts::default();
    counts.add(&project.issues);
    for package in &project.packages {
        package_counts(package, &mut counts);
    }

    let dir_scopes: usize = project.packages.iter().map(|p| p.dir_licensings.len()).sum();
    let file_scopes: usize = project.packages.iter().map(|p| p.file_licensings.len()).sum();
    let with_issues = project.packages.iter().filter(|p| p.has_issues).count();
    let blobs = record.blob_references().count();

    if json_output {
        let status = serde_json::json!({
            "project": project.name,
            "archive": record.archive_location(&file),
            "packages": project.packages.len(),
            "packages_with_issues": with_issues,
            "scopes": {
                "dir": dir_scopes,
                "file": file_scopes,
            },
            "blob_references": blobs,
            "issues": {
                "errors": counts.errors,
                "warnings": counts.warnings,
                "info": counts.info,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Record status for".cyan().bold(),
        project.name.white()
    );
    println!(
        "Archive: {}",
        record.archive_location(&file).display().to_string().white()
    );
    println!();

    println!("{}", "Packages:".yellow().bold());
    println!("  Total:       {}", project.packages.len().to_string().white());
    println!("  With issues: {}", with_issues.to_string().white());
    println!("  Dir scopes:  {}", dir_scopes);
    println!("  File scopes: {}", file_scopes);
    println!("  Blob refs:   {}", blobs);
    println!();

    println!("{}", "Issues:".yellow().bold());
    println!("  Errors:   {}", counts.errors.to_string().red());
    println!("  Warnings: {}", counts.warnings.to_string().yellow());
    println!("  Info:     {}", counts.info.to_string().blue());

    if verbose {
        println!();
        for package in &project.packages {
            let mut own = IssueCounts::default();
            package_counts(package, &mut own);
            let marker = if own.errors > 0 {
                "E".red().bold()
            } else if own.warnings > 0 {
                "W".yellow().bold()
            } else {
                " ".normal()
            };
            println!(
                "  {} {} ({} default, {} dir, {} file)",
                marker,
                package.id,
                package.default_licensings.len(),
                package.dir_licensings.len(),
                package.file_licensings.len()
            );
        }
    }

    println!();
    let status = if project.has_issues {
        "Record has open issues".yellow()
    } else {
        "Record has no issues".green()
    };
    println!("{}", status);

    Ok(())
}
