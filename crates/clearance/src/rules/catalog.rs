//! Loading rule files and matching rules to packages.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ClearanceError, Result};
use crate::issues::{Finding, IssueSink, IssueTarget};
use crate::record::Identifier;

use super::{Rule, RuleIdentifier, RuleKind, RuleOrigin, RulePayload};

const SOURCE: &str = "RuleCatalog";

#[derive(Deserialize)]
struct RawRule<T> {
    id: RuleIdentifier,
    #[serde(flatten)]
    body: T,
}

/// Validated rules of one kind.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from rules built in code.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load every `*.yml`/`*.yaml` file of a directory, in file name order.
    ///
    /// Unreadable files are fatal. A file that is not a YAML list of rules,
    /// and every rule failing validation, is reported as a project warning
    /// and skipped.
    pub fn load(dir: impl AsRef<Path>, kind: RuleKind, sink: &mut dyn IssueSink) -> Result<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();

        for file in rule_files(dir)? {
            let text = fs::read_to_string(&file).map_err(|e| ClearanceError::io(&file, e))?;
            let items = match serde_yaml::from_str::<serde_yaml::Value>(&text) {
                Ok(serde_yaml::Value::Sequence(items)) => items,
                Ok(serde_yaml::Value::Null) => Vec::new(),
                Ok(_) => {
                    sink.report(
                        Finding::warning(
                            IssueTarget::Project,
                            format!("{} is not a list of {} rules", file.display(), kind),
                        )
                        .with_source(SOURCE),
                    );
                    continue;
                }
                Err(e) => {
                    sink.report(
                        Finding::warning(
                            IssueTarget::Project,
                            format!("cannot parse {}: {}", file.display(), e),
                        )
                        .with_source(SOURCE),
                    );
                    continue;
                }
            };

            for (index, value) in items.into_iter().enumerate() {
                let origin = RuleOrigin::new(&file, index);
                match parse_rule(kind, value, origin.clone()) {
                    Ok(rule) => catalog.rules.push(rule),
                    Err(e) => sink.report(
                        Finding::warning(
                            IssueTarget::Project,
                            format!("{} rule {} ignored: {}", kind, origin, e),
                        )
                        .with_source(SOURCE),
                    ),
                }
            }
        }

        tracing::info!(
            kind = %kind,
            rules = catalog.rules.len(),
            dir = %dir.display(),
            "Loaded rule catalog"
        );
        Ok(catalog)
    }

    /// Add an already validated rule.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule matching a package.
    pub fn matching(&self, id: &Identifier) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.matches(id)).collect()
    }

    /// The single rule matching a package.
    ///
    /// More than one match is an error on the package; no rule is returned
    /// so the caller leaves the package untouched.
    pub fn find(&self, id: &Identifier, sink: &mut dyn IssueSink) -> Option<&Rule> {
        let matches = self.matching(id);
        match matches.as_slice() {
            [] => None,
            [rule] => {
                tracing::debug!(package = %id, origin = %rule.origin, "Rule matched");
                Some(*rule)
            }
            several => {
                let origins: Vec<String> = several.iter().map(|r| r.origin.to_string()).collect();
                sink.report(
                    Finding::error(
                        IssueTarget::Package(id.clone()),
                        format!(
                            "{} {} rules match this package ({}); none applied",
                            several.len(),
                            several[0].kind(),
                            origins.join(", ")
                        ),
                    )
                    .with_source(SOURCE),
                );
                None
            }
        }
    }
}

fn rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ClearanceError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ClearanceError::io(dir, e))?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_rule(kind: RuleKind, value: serde_yaml::Value, origin: RuleOrigin) -> Result<Rule> {
    let (id, payload) = match kind {
        RuleKind::Curation => {
            let raw = raw(value, &origin)?;
            (raw.id, RulePayload::Curation(raw.body))
        }
        RuleKind::Resolver => {
            let raw = raw(value, &origin)?;
            (raw.id, RulePayload::Resolver(raw.body))
        }
        RuleKind::Selector => {
            let raw = raw(value, &origin)?;
            (raw.id, RulePayload::Selector(raw.body))
        }
        RuleKind::Classification => {
            let raw = raw(value, &origin)?;
            (raw.id, RulePayload::Classification(raw.body))
        }
    };
    Rule::build(id, payload, origin)
}

fn raw<T: DeserializeOwned>(value: serde_yaml::Value, origin: &RuleOrigin) -> Result<RawRule<T>> {
    serde_yaml::from_value(value).map_err(|source| ClearanceError::Yaml {
        path: origin.file.clone(),
        source,
    })
}
