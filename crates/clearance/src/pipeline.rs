//! Stage manager: load, unpack, run one engine, validate, pack, save.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::TempDir;

use crate::archive::{
    check_consistency, report_violations, ArchiveService, BlobStore, Violation, ZipArchiveService,
};
use crate::error::{ClearanceError, Result};
use crate::issues::{filter_issues, propagate, IssueLevel, IssueTracker, Severity};
use crate::record::{archive_path_for, ComplianceRecord};
use crate::rules::{RuleCatalog, RuleKind};
use crate::stages::{
    ClassificationEngine, CurationEngine, DedupConfig, DedupEngine, DeclaredLicenses, MergeConfig,
    MergeEngine, MergeInput, ResolutionEngine, ResolverConfig, SelectionEngine, StageStats,
};

/// A single-record stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Curate,
    Dedup,
    Resolve,
    Select,
    Classify,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Curate => "curate",
            Stage::Dedup => "dedup",
            Stage::Resolve => "resolve",
            Stage::Select => "select",
            Stage::Classify => "classify",
        }
    }

    /// Kind of rule the stage reads, if any.
    pub fn rule_kind(&self) -> Option<RuleKind> {
        match self {
            Stage::Curate => Some(RuleKind::Curation),
            Stage::Dedup => None,
            Stage::Resolve => Some(RuleKind::Resolver),
            Stage::Select => Some(RuleKind::Selector),
            Stage::Classify => Some(RuleKind::Classification),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Stage {
    type Err = ClearanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "curate" | "curation" => Ok(Stage::Curate),
            "dedup" | "deduplicate" => Ok(Stage::Dedup),
            "resolve" | "resolution" => Ok(Stage::Resolve),
            "select" | "selection" => Ok(Stage::Select),
            "classify" | "classification" => Ok(Stage::Classify),
            other => Err(ClearanceError::Config(format!("unknown stage '{}'", other))),
        }
    }
}

/// Configuration for every stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Lowest severity kept in the output record.
    pub issue_level: IssueLevel,
    pub dedup: DedupConfig,
    pub resolver: ResolverConfig,
    pub merge: MergeConfig,
    /// Directory of rule files for the stages that use rules.
    pub rules_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue_level(mut self, level: IssueLevel) -> Self {
        self.issue_level = level;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_rules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rules_dir = Some(dir.into());
        self
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: StageStats,
    /// Findings reported during the run, before level filtering.
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    /// Record written by the run.
    pub output: PathBuf,
    /// Archive written next to the record.
    pub archive: PathBuf,
}

/// Runs stages against record files.
///
/// # Example
///
/// ```no_run
/// use clearance::{Pipeline, PipelineConfig, Stage};
///
/// let config = PipelineConfig::new().with_rules_dir("rules/curation");
/// let report = Pipeline::new(config)
///     .run(Stage::Curate, "in/project.json", "out/project.json")
///     .unwrap();
/// println!("{} packages changed", report.stats.packages_changed);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    archive: Box<dyn ArchiveService>,
}

impl Pipeline {
    /// Create a pipeline that uses zip archives.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            archive: Box::new(ZipArchiveService::new()),
        }
    }

    /// Replace the archive implementation.
    pub fn with_archive_service(mut self, service: impl ArchiveService + 'static) -> Self {
        self.archive = Box::new(service);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one stage from `input` to `output`.
    ///
    /// The input record and archive are never modified. Nothing is written
    /// when the stage fails or leaves record and archive inconsistent.
    pub fn run(
        &self,
        stage: Stage,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<StageReport> {
        let input = input.as_ref();
        let started_at = Utc::now();
        tracing::info!(%stage, input = %input.display(), "Starting stage");

        let mut record = ComplianceRecord::load(input)?;
        let work = scratch_dir()?;
        self.archive
            .unpack(&record.archive_location(input), work.path())?;
        let store = BlobStore::new(work.path());

        let mut tracker = IssueTracker::new();
        let catalog = match stage.rule_kind() {
            Some(kind) => self.catalog(kind, &mut tracker)?,
            None => RuleCatalog::new(),
        };

        let stats = match stage {
            Stage::Curate => CurationEngine::new(&catalog, &store).run(&mut record, &mut tracker)?,
            Stage::Dedup => DedupEngine::new(self.config.dedup.clone(), &store).run(&mut record)?,
            Stage::Resolve => {
                let mut engine =
                    ResolutionEngine::new(self.config.resolver.clone(), &catalog, &store);
                if let Some(source) = &self.config.resolver.declared_source {
                    engine = engine.with_declared(DeclaredLicenses::load(source)?);
                }
                engine.run(&mut record, &mut tracker)?
            }
            Stage::Select => SelectionEngine::new(&catalog).run(&mut record, &mut tracker)?,
            Stage::Classify => {
                ClassificationEngine::new(&catalog).run(&mut record, &mut tracker)?
            }
        };

        self.finish(stage.label(), started_at, record, &store, tracker, stats, output.as_ref())
    }

    /// Merge several records into `output`.
    pub fn merge<P: AsRef<Path>>(&self, inputs: &[P], output: impl AsRef<Path>) -> Result<StageReport> {
        let started_at = Utc::now();
        tracing::info!(inputs = inputs.len(), "Starting merge");

        let mut loaded = Vec::with_capacity(inputs.len());
        for input in inputs {
            let input = input.as_ref();
            let record = ComplianceRecord::load(input)?;
            let archive = record.archive_location(input);
            let key = fs::read(&archive).map_err(|e| ClearanceError::io(&archive, e))?;
            let work = scratch_dir()?;
            self.archive.unpack(&archive, work.path())?;
            loaded.push((record, work, key));
        }

        let stores: Vec<BlobStore> = loaded
            .iter()
            .map(|(_, work, _)| BlobStore::new(work.path()))
            .collect();
        let merge_inputs: Vec<MergeInput<'_>> = loaded
            .iter()
            .zip(&stores)
            .map(|((record, _, key), store)| MergeInput::new(record, store, key))
            .collect();

        let target_dir = scratch_dir()?;
        let target = BlobStore::new(target_dir.path());
        let mut tracker = IssueTracker::new();
        let (record, stats) =
            MergeEngine::new(self.config.merge.clone()).run(&merge_inputs, &target, &mut tracker)?;

        self.finish("merge", started_at, record, &target, tracker, stats, output.as_ref())
    }

    /// Check a record against its archive without changing either.
    pub fn validate(&self, input: impl AsRef<Path>) -> Result<Vec<Violation>> {
        let input = input.as_ref();
        let record = ComplianceRecord::load(input)?;
        let work = scratch_dir()?;
        self.archive
            .unpack(&record.archive_location(input), work.path())?;
        check_consistency(&record, &BlobStore::new(work.path()))
    }

    fn catalog(&self, kind: RuleKind, tracker: &mut IssueTracker) -> Result<RuleCatalog> {
        match &self.config.rules_dir {
            Some(dir) => {
                let catalog = RuleCatalog::load(dir, kind, tracker)?;
                tracing::info!(rules = catalog.len(), %kind, dir = %dir.display(), "Loaded rules");
                Ok(catalog)
            }
            None => {
                tracing::warn!(%kind, "No rules directory configured");
                Ok(RuleCatalog::new())
            }
        }
    }

    /// Attach issues, validate, then pack and save.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        stage: &str,
        started_at: DateTime<Utc>,
        mut record: ComplianceRecord,
        store: &BlobStore,
        mut tracker: IssueTracker,
        stats: StageStats,
        output: &Path,
    ) -> Result<StageReport> {
        let violations = check_consistency(&record, store)?;
        if !violations.is_empty() {
            report_violations(&violations, &mut tracker);
            return Err(ClearanceError::Inconsistent { violations });
        }

        let info = tracker.count(Severity::Info);
        let warnings = tracker.count(Severity::Warning);
        let errors = tracker.count(Severity::Error);
        tracker.attach(&mut record);
        filter_issues(&mut record, self.config.issue_level);
        propagate(&mut record);

        let archive = archive_path_for(output);
        self.archive.pack(store.root(), &archive)?;
        record.project.archive_path = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        record.save(output)?;

        tracing::info!(
            stage,
            output = %output.display(),
            packages = record.project.packages.len(),
            "Stage complete"
        );
        Ok(StageReport {
            stage: stage.to_string(),
            started_at,
            finished_at: Utc::now(),
            stats,
            info,
            warnings,
            errors,
            output: output.to_path_buf(),
            archive,
        })
    }
}

fn scratch_dir() -> Result<TempDir> {
    TempDir::new().map_err(|e| ClearanceError::io(std::env::temp_dir(), e))
}
