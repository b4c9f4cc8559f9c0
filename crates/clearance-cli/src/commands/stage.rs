//! Record-to-record stage commands.

use std::path::PathBuf;

use clearance::stages::DeclaredSource;
use clearance::{DedupConfig, Pipeline, PipelineConfig, ResolverConfig, Stage};

use super::print_report;
use crate::cli::StageArgs;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn curate(args: StageArgs, rules: PathBuf) -> CommandResult {
    let config = base_config(&args).with_rules_dir(rules);
    execute(Stage::Curate, config, args)
}

pub fn dedup(args: StageArgs, distinct: bool, purge: bool, unify_copyrights: bool) -> CommandResult {
    let dedup = DedupConfig::new()
        .with_compare_distinct(distinct)
        .with_purge_empty_scopes(purge)
        .with_unify_copyrights(unify_copyrights);
    let config = base_config(&args).with_dedup(dedup);
    execute(Stage::Dedup, config, args)
}

pub fn resolve(
    args: StageArgs,
    rules: Option<PathBuf>,
    any_subset: bool,
    declared: Option<String>,
    templates: Option<PathBuf>,
) -> CommandResult {
    let mut resolver = ResolverConfig::new().with_any_subset(any_subset);
    if let Some(location) = declared {
        resolver = resolver.with_declared_source(DeclaredSource::parse(&location));
    }
    if let Some(dir) = templates {
        resolver = resolver.with_template_dir(dir);
    }

    let mut config = base_config(&args).with_resolver(resolver);
    if let Some(dir) = rules {
        config = config.with_rules_dir(dir);
    }
    execute(Stage::Resolve, config, args)
}

pub fn select(args: StageArgs, rules: PathBuf) -> CommandResult {
    let config = base_config(&args).with_rules_dir(rules);
    execute(Stage::Select, config, args)
}

pub fn classify(args: StageArgs, rules: PathBuf) -> CommandResult {
    let config = base_config(&args).with_rules_dir(rules);
    execute(Stage::Classify, config, args)
}

fn base_config(args: &StageArgs) -> PipelineConfig {
    PipelineConfig::new().with_issue_level(args.issue_level)
}

fn execute(stage: Stage, config: PipelineConfig, args: StageArgs) -> CommandResult {
    if !args.input.exists() {
        return Err(format!("Record not found: {}", args.input.display()).into());
    }

    let report = Pipeline::new(config).run(stage, &args.input, &args.output)?;
    print_report(&report, args.json)
}
