//! Clearance CLI - run compliance record stages from the command line.

mod cli;
mod commands;

use clap::Parser;
use clearance::{ClearanceError, Outcome};
use cli::{Cli, Commands};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Curate { stage, rules } => commands::stage::curate(stage, rules),

        Commands::Dedup {
            stage,
            distinct,
            purge,
            unify_copyrights,
        } => commands::stage::dedup(stage, distinct, purge, unify_copyrights),

        Commands::Resolve {
            stage,
            rules,
            any_subset,
            declared,
            templates,
        } => commands::stage::resolve(stage, rules, any_subset, declared, templates),

        Commands::Select { stage, rules } => commands::stage::select(stage, rules),

        Commands::Classify { stage, rules } => commands::stage::classify(stage, rules),

        Commands::Merge {
            inputs,
            output,
            name,
            collisions,
            issue_level,
            json,
        } => commands::merge::run(inputs, output, name, collisions, issue_level, json),

        Commands::Validate { file } => commands::validate::run(file, cli.verbose),

        Commands::Status { file, json } => commands::status::run(file, json, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        let outcome = e
            .downcast_ref::<ClearanceError>()
            .map(Outcome::of_error)
            .unwrap_or(Outcome::IoFailure);
        std::process::exit(outcome.exit_code());
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let default = if verbose { "clearance=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
