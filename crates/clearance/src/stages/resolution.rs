//! Resolving files that carry several licenses into one OR compound.
//!
//! After file scopes are rewritten, the license facts of every directory
//! scope and of the default scope are rebuilt from the files they enclose,
//! so the aggregated scopes never disagree with the files below them.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive::BlobStore;
use crate::error::{ClearanceError, Result};
use crate::issues::{Finding, IssueList, IssueSink, IssueTarget};
use crate::license::LicenseExpression;
use crate::record::{
    scope, ComplianceRecord, FileLicensing, Identifier, LicenseFact, Package, DECLARED_PATH,
};
use crate::rules::{Resolution, ResolverRule, RuleCatalog, RuleIdentifier};

use super::declared::{DeclaredLicenses, DeclaredSource};
use super::StageStats;

const SOURCE: &str = "Resolution";

/// Resolution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Also resolve files whose license set is a subset (of two or more) of
    /// a resolution's licenses.
    pub any_subset: bool,
    /// Declared-license document for auto-generated resolutions.
    pub declared_source: Option<DeclaredSource>,
    /// Directory to write rule templates for unresolved packages to.
    pub template_dir: Option<PathBuf>,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_any_subset(mut self, enabled: bool) -> Self {
        self.any_subset = enabled;
        self
    }

    pub fn with_declared_source(mut self, source: DeclaredSource) -> Self {
        self.declared_source = Some(source);
        self
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }
}

#[derive(Serialize)]
struct TemplateRule {
    id: RuleIdentifier,
    resolutions: Vec<Resolution>,
}

/// The resolution engine.
pub struct ResolutionEngine<'a> {
    config: ResolverConfig,
    catalog: &'a RuleCatalog,
    store: &'a BlobStore,
    declared: Option<DeclaredLicenses>,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(config: ResolverConfig, catalog: &'a RuleCatalog, store: &'a BlobStore) -> Self {
        Self {
            config,
            catalog,
            store,
            declared: None,
        }
    }

    /// Use an already loaded declared-license document.
    pub fn with_declared(mut self, declared: DeclaredLicenses) -> Self {
        self.declared = Some(declared);
        self
    }

    /// Resolve every package, delete orphaned blobs and write templates.
    pub fn run(&self, record: &mut ComplianceRecord, sink: &mut dyn IssueSink) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let mut released = Vec::new();
        let mut templates = Vec::new();

        for package in &mut record.project.packages {
            let rule = if self.catalog.matching(&package.id).len() > 1 {
                self.catalog.find(&package.id, sink);
                stats.packages_skipped += 1;
                continue;
            } else if let Some(rule) = self.catalog.find(&package.id, sink) {
                rule.as_resolver().map(|r| (r.clone(), true))
            } else if needs_auto_resolution(package) {
                self.auto_rule(package, sink).map(|r| (r, false))
            } else {
                None
            };

            match rule {
                Some((rule, from_catalog)) => {
                    let changed = resolve_package(
                        package,
                        &rule,
                        self.config.any_subset,
                        from_catalog,
                        &mut released,
                        sink,
                    );
                    stats.changed(changed);
                }
                None if self.config.template_dir.is_some() => {
                    if let Some(template) = template_for(package) {
                        templates.push(template);
                    }
                }
                None => {}
            }
        }

        stats.blobs_deleted = self.store.collect_garbage(record, released)?.len();

        if let Some(dir) = &self.config.template_dir {
            write_templates(dir, &templates)?;
        }

        tracing::info!(
            packages = stats.packages_changed,
            facts = stats.facts_changed,
            templates = templates.len(),
            "Resolution finished"
        );
        Ok(stats)
    }

    /// Build a single-scope rule from the package's declared license.
    ///
    /// The declared-license document wins over the record's own
    /// `declaredLicense`. Expressions containing AND are left alone.
    fn auto_rule(&self, package: &Package, sink: &mut dyn IssueSink) -> Option<ResolverRule> {
        let parsed = match self.declared.as_ref().and_then(|d| d.get(&package.id)) {
            Some(entry) => entry.mapped_expression(),
            None => LicenseExpression::parse(package.declared_license.as_deref()?),
        };
        let target = || IssueTarget::Package(package.id.clone());

        let expression = match parsed {
            Ok(expression) => expression,
            Err(e) => {
                sink.report(
                    Finding::warning(target(), format!("declared license is unusable: {}", e))
                        .with_source(SOURCE),
                );
                return None;
            }
        };
        if expression.contains_and() {
            sink.report(
                Finding::warning(
                    target(),
                    format!(
                        "declared license '{}' contains AND and is not resolved automatically",
                        expression
                    ),
                )
                .with_source(SOURCE),
            );
            return None;
        }
        let alternatives = expression.alternatives()?;

        let mut rule = ResolverRule::new()
            .with_resolution(Resolution::new(alternatives, expression.to_string()));
        if let Err(e) = rule.validate() {
            sink.report(
                Finding::warning(target(), format!("generated resolution is invalid: {}", e))
                    .with_source(SOURCE),
            );
            return None;
        }

        sink.report(
            Finding::info(
                target(),
                format!("resolution '{}' generated from the declared license", expression),
            )
            .with_source(SOURCE),
        );
        Some(rule)
    }
}

/// Several distinct default licenses, or a declared marker, call for a rule.
fn needs_auto_resolution(package: &Package) -> bool {
    package.default_license_values().len() > 1
        || package.default_licensings.iter().any(LicenseFact::is_declared)
}

/// Apply a resolver rule to one package. Returns the number of changed facts.
pub fn resolve_package(
    package: &mut Package,
    rule: &ResolverRule,
    any_subset: bool,
    report_dead: bool,
    released: &mut Vec<String>,
    sink: &mut dyn IssueSink,
) -> usize {
    let mut used = vec![false; rule.resolutions.len()];
    let mut resolved = 0;
    let mut changed = 0;

    for file in &mut package.file_licensings {
        let set = file.license_values();
        let chosen = rule
            .resolutions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.accepts(&set, any_subset))
            .filter_map(|(i, r)| {
                r.scopes
                    .iter()
                    .filter(|s| scope::contains(s, &file.scope))
                    .map(|s| s.len())
                    .max()
                    .map(|depth| (i, depth))
            })
            .max_by_key(|&(i, depth)| (depth, Reverse(i)));
        let Some((index, _)) = chosen else {
            continue;
        };

        let result = &rule.resolutions[index].result;
        used[index] = true;
        released.extend(file.licenses.iter().filter_map(|f| f.blob()).map(str::to_string));
        changed += file.licenses.len();
        file.licenses = vec![LicenseFact::new(result.clone(), file.scope.clone())];
        resolved += 1;
        tracing::debug!(package = %package.id, file = %file.scope, %result, "Resolved file");
    }

    if report_dead {
        for (resolution, _) in rule.resolutions.iter().zip(&used).filter(|(_, u)| !**u) {
            sink.report(
                Finding::warning(
                    IssueTarget::Package(package.id.clone()),
                    format!(
                        "resolution to '{}' matched no file (dead rule)",
                        resolution.result
                    ),
                )
                .with_source(SOURCE),
            );
        }
    }

    if resolved > 0 {
        changed += regenerate(package, released);
    }
    changed += resolve_declared(package, rule, any_subset);
    changed
}

/// Rebuild directory and default license facts from the file scopes.
///
/// An aggregated scope gets one fact per distinct license of the files it
/// encloses, in file order, pointing at the first file carrying it. Scopes
/// that enclose no file keep their facts. Declared default facts are left
/// for [`resolve_declared`].
fn regenerate(package: &mut Package, released: &mut Vec<String>) -> usize {
    let files = &package.file_licensings;
    let mut changed = 0;

    for dir in &mut package.dir_licensings {
        if let Some(facts) = aggregate(files, &dir.scope) {
            changed += replace(&mut dir.licenses, facts, released);
        }
    }

    if let Some(facts) = aggregate(files, "") {
        let (declared, derived): (Vec<_>, Vec<_>) = std::mem::take(&mut package.default_licensings)
            .into_iter()
            .partition(LicenseFact::is_declared);
        let mut rebuilt = derived;
        changed += replace(&mut rebuilt, facts, released);
        package.default_licensings = declared;
        package.default_licensings.extend(rebuilt);
    }
    changed
}

/// Distinct license facts of the files inside `dir`, or `None` if it
/// encloses no file scope.
fn aggregate(files: &[FileLicensing], dir: &str) -> Option<Vec<LicenseFact>> {
    let mut enclosed = false;
    let mut seen = HashSet::new();
    let mut facts = Vec::new();

    for file in files.iter().filter(|f| scope::contains(dir, &f.scope)) {
        enclosed = true;
        for fact in &file.licenses {
            if seen.insert(fact.license.clone()) {
                facts.push(LicenseFact {
                    license: fact.license.clone(),
                    path: file.scope.clone(),
                    license_text_in_archive: fact.license_text_in_archive.clone(),
                    original_licenses: None,
                    has_issues: false,
                    issues: IssueList::new(),
                });
            }
        }
    }
    enclosed.then_some(facts)
}

/// Swap in rebuilt facts unless they say the same thing as the old ones.
/// Returns the number of replaced facts.
fn replace(facts: &mut Vec<LicenseFact>, rebuilt: Vec<LicenseFact>, released: &mut Vec<String>) -> usize {
    let key = |f: &LicenseFact| {
        (
            f.license.clone(),
            f.path.clone(),
            f.license_text_in_archive.clone(),
        )
    };
    if facts.iter().map(key).eq(rebuilt.iter().map(key)) {
        return 0;
    }
    released.extend(facts.iter().filter_map(|f| f.blob()).map(str::to_string));
    let changed = facts.len().max(1);
    *facts = rebuilt;
    changed
}

/// Replace declared default facts by the result of a root-scope resolution.
fn resolve_declared(package: &mut Package, rule: &ResolverRule, any_subset: bool) -> usize {
    let declared: BTreeSet<String> = package
        .default_licensings
        .iter()
        .filter(|f| f.is_declared())
        .filter_map(|f| f.license.clone())
        .collect();
    if declared.len() < 2 {
        return 0;
    }
    let Some(resolution) = rule
        .resolutions
        .iter()
        .find(|r| r.scopes.iter().any(String::is_empty) && r.accepts(&declared, any_subset))
    else {
        return 0;
    };

    let Some(first) = package.default_licensings.iter().position(|f| f.is_declared()) else {
        return 0;
    };
    let text = package.default_licensings[first].license_text_in_archive.clone();
    let before = package.default_licensings.len();
    package.default_licensings.retain(|f| !f.is_declared());
    let removed = before - package.default_licensings.len();

    let mut fact = LicenseFact::new(resolution.result.clone(), DECLARED_PATH);
    fact.license_text_in_archive = text;
    package
        .default_licensings
        .insert(first.min(package.default_licensings.len()), fact);
    removed
}

/// Template resolutions for files that still carry several licenses.
fn template_for(package: &Package) -> Option<(Identifier, Vec<Resolution>)> {
    let mut groups: BTreeMap<BTreeSet<String>, Vec<String>> = BTreeMap::new();
    for file in &package.file_licensings {
        let set = file.license_values();
        if set.len() >= 2 {
            groups.entry(set).or_default().push(file.scope.clone());
        }
    }
    if groups.is_empty() {
        return None;
    }

    let resolutions = groups
        .into_iter()
        .map(|(set, scopes)| {
            let result = set.iter().cloned().collect::<Vec<_>>().join(" OR ");
            Resolution::new(set, result).with_scopes(scopes)
        })
        .collect();
    Some((package.id.clone(), resolutions))
}

/// Write one rule file per package, named after the package.
fn write_templates(dir: &Path, templates: &[(Identifier, Vec<Resolution>)]) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ClearanceError::io(dir, e))?;
    for (id, resolutions) in templates {
        let path = dir.join(format!("{}.yml", id.file_stem()));
        let rules = vec![TemplateRule {
            id: RuleIdentifier::exact(id),
            resolutions: resolutions.clone(),
        }];
        let yaml = serde_yaml::to_string(&rules).map_err(|source| ClearanceError::Yaml {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, yaml).map_err(|e| ClearanceError::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::{IssueTracker, Severity};
    use crate::record::{DirLicensing, FileLicensing, FOUND_IN_FILE_SCOPE};
    use crate::rules::{Rule, RulePayload};
    use crate::stages::DeclaredEntry;
    use tempfile::TempDir;

    fn left_pad() -> Identifier {
        Identifier::new("NPM", "", "left-pad", "1.0.0")
    }

    fn package() -> Package {
        let mut pkg = Package::new(left_pad());
        let mut file = FileLicensing::new("lib/a.js");
        file.licenses
            .push(LicenseFact::new("MIT", "lib/a.js").with_text("npm/left-pad/a-mit"));
        file.licenses.push(LicenseFact::new("Apache-2.0", "lib/a.js"));
        pkg.file_licensings.push(file);

        let mut dir = DirLicensing::new("lib");
        dir.licenses.push(LicenseFact::new("MIT", "lib/a.js"));
        dir.licenses.push(LicenseFact::new("Apache-2.0", "lib/a.js"));
        dir.licenses.push(LicenseFact::new("ISC", "lib/LICENSE"));
        pkg.dir_licensings.push(dir);

        pkg.default_licensings.push(LicenseFact::new("MIT", "lib/a.js"));
        pkg.default_licensings.push(LicenseFact::new("Apache-2.0", "lib/a.js"));
        pkg
    }

    fn rule() -> ResolverRule {
        let mut rule = ResolverRule::new()
            .with_resolution(Resolution::new(["MIT", "Apache-2.0"], "MIT OR Apache-2.0"));
        rule.validate().expect("valid rule");
        rule
    }

    fn values(facts: &[LicenseFact]) -> Vec<&str> {
        facts.iter().filter_map(|f| f.license.as_deref()).collect()
    }

    #[test]
    fn test_file_resolved_and_scopes_regenerated() {
        let mut pkg = package();
        let mut released = Vec::new();
        let mut tracker = IssueTracker::new();

        resolve_package(&mut pkg, &rule(), false, true, &mut released, &mut tracker);

        let file = &pkg.file_licensings[0];
        assert_eq!(values(&file.licenses), vec!["MIT OR Apache-2.0"]);
        assert_eq!(file.licenses[0].path, "lib/a.js");
        assert_eq!(values(&pkg.dir_licensings[0].licenses), vec!["MIT OR Apache-2.0"]);
        assert_eq!(pkg.dir_licensings[0].licenses[0].path, "lib/a.js");
        assert_eq!(values(&pkg.default_licensings), vec!["MIT OR Apache-2.0"]);
        assert_eq!(released, vec!["npm/left-pad/a-mit".to_string()]);
        assert_eq!(tracker.count(Severity::Warning), 0);
    }

    #[test]
    fn test_aggregated_scopes_rebuilt_whatever_their_origin_paths() {
        let mut pkg = Package::new(left_pad());
        let mut resolved = FileLicensing::new("lib/a.js");
        resolved.licenses.push(LicenseFact::new("MIT", "lib/a.js"));
        resolved.licenses.push(LicenseFact::new("Apache-2.0", "lib/a.js"));
        pkg.file_licensings.push(resolved);
        let mut nested = FileLicensing::new("lib/util/b.js");
        nested.licenses.push(LicenseFact::new("ISC", "lib/util/b.js"));
        pkg.file_licensings.push(nested);

        let mut lib = DirLicensing::new("lib");
        lib.licenses
            .push(LicenseFact::new("MIT", "lib").with_text("npm/left-pad/lib-mit"));
        lib.licenses.push(LicenseFact::new("Apache-2.0", "lib/LICENSE"));
        pkg.dir_licensings.push(lib);
        let mut docs = DirLicensing::new("docs");
        docs.licenses.push(LicenseFact::new("CC-BY-4.0", "docs/LICENSE"));
        pkg.dir_licensings.push(docs);

        pkg.default_licensings.push(LicenseFact::new("MIT", "LICENSE"));
        pkg.default_licensings.push(LicenseFact::new("Apache-2.0", "NOTICE"));
        pkg.default_licensings
            .push(LicenseFact::new("MIT", DECLARED_PATH).with_text(FOUND_IN_FILE_SCOPE));

        let mut released = Vec::new();
        let mut tracker = IssueTracker::new();
        resolve_package(&mut pkg, &rule(), false, true, &mut released, &mut tracker);

        assert_eq!(values(&pkg.file_licensings[0].licenses), vec!["MIT OR Apache-2.0"]);
        assert_eq!(
            values(&pkg.dir_licensings[0].licenses),
            vec!["MIT OR Apache-2.0", "ISC"]
        );
        let paths: Vec<&str> = pkg.dir_licensings[0]
            .licenses
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(paths, vec!["lib/a.js", "lib/util/b.js"]);
        assert_eq!(values(&pkg.dir_licensings[1].licenses), vec!["CC-BY-4.0"]);
        assert_eq!(
            values(&pkg.default_licensings),
            vec!["MIT", "MIT OR Apache-2.0", "ISC"]
        );
        assert!(pkg.default_licensings[0].is_declared());
        assert_eq!(released, vec!["npm/left-pad/lib-mit".to_string()]);
    }

    #[test]
    fn test_scope_restricts_resolution_and_dead_rule_warns() {
        let mut pkg = package();
        let mut rule = ResolverRule::new().with_resolution(
            Resolution::new(["MIT", "Apache-2.0"], "MIT OR Apache-2.0").with_scopes(["src"]),
        );
        rule.validate().expect("valid rule");

        let mut released = Vec::new();
        let mut tracker = IssueTracker::new();
        let changed = resolve_package(&mut pkg, &rule, false, true, &mut released, &mut tracker);

        assert_eq!(changed, 0);
        assert_eq!(pkg.file_licensings[0].licenses.len(), 2);
        assert_eq!(tracker.count(Severity::Warning), 1);
        assert!(tracker.findings()[0].message.contains("dead rule"));
    }

    #[test]
    fn test_declared_facts_resolved_by_root_resolution() {
        let mut pkg = Package::new(left_pad());
        pkg.default_licensings
            .push(LicenseFact::new("MIT", DECLARED_PATH).with_text(FOUND_IN_FILE_SCOPE));
        pkg.default_licensings
            .push(LicenseFact::new("Apache-2.0", DECLARED_PATH).with_text(FOUND_IN_FILE_SCOPE));

        let mut released = Vec::new();
        let mut tracker = IssueTracker::new();
        resolve_package(&mut pkg, &rule(), false, false, &mut released, &mut tracker);

        assert_eq!(values(&pkg.default_licensings), vec!["MIT OR Apache-2.0"]);
        assert!(pkg.default_licensings[0].is_declared());
        assert_eq!(
            pkg.default_licensings[0].license_text_in_archive.as_deref(),
            Some(FOUND_IN_FILE_SCOPE)
        );
    }

    #[test]
    fn test_auto_rule_from_declared_document() {
        let dir = TempDir::new().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let catalog = RuleCatalog::new();
        let declared = DeclaredLicenses::new().with_entry(
            &left_pad(),
            DeclaredEntry::new("MIT OR Apache").with_mapping("Apache", "Apache-2.0"),
        );

        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(package());
        let mut tracker = IssueTracker::new();
        ResolutionEngine::new(ResolverConfig::default(), &catalog, &store)
            .with_declared(declared)
            .run(&mut record, &mut tracker)
            .expect("resolution failed");

        let pkg = &record.project.packages[0];
        assert_eq!(values(&pkg.file_licensings[0].licenses), vec!["MIT OR Apache-2.0"]);
        assert_eq!(tracker.count(Severity::Info), 1);
    }

    #[test]
    fn test_and_expression_is_not_auto_resolved() {
        let dir = TempDir::new().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let catalog = RuleCatalog::new();
        let mut pkg = package();
        pkg.declared_license = Some("MIT AND Apache-2.0".to_string());
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(pkg);

        let mut tracker = IssueTracker::new();
        ResolutionEngine::new(ResolverConfig::default(), &catalog, &store)
            .run(&mut record, &mut tracker)
            .expect("resolution failed");

        assert_eq!(record.project.packages[0].file_licensings[0].licenses.len(), 2);
        assert_eq!(tracker.count(Severity::Warning), 1);
    }

    #[test]
    fn test_templates_written_for_unresolved_packages() {
        let dir = TempDir::new().expect("tempdir");
        let store = BlobStore::new(dir.path().join("work"));
        let templates = dir.path().join("templates");
        let catalog = RuleCatalog::new();

        let mut pkg = package();
        pkg.default_licensings.truncate(1);
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(pkg);

        let mut tracker = IssueTracker::new();
        ResolutionEngine::new(
            ResolverConfig::new().with_template_dir(&templates),
            &catalog,
            &store,
        )
        .run(&mut record, &mut tracker)
        .expect("resolution failed");

        let path = templates.join("NPM_left-pad_1.0.0.yml");
        let mut sink = IssueTracker::new();
        let loaded = RuleCatalog::load(&templates, crate::rules::RuleKind::Resolver, &mut sink)
            .expect("load failed");
        assert!(path.is_file());
        assert_eq!(loaded.len(), 1);
        assert!(loaded.rules()[0].matches(&left_pad()));
    }

    #[test]
    fn test_catalog_rule_applies_through_engine() {
        let dir = TempDir::new().expect("tempdir");
        let store = BlobStore::new(dir.path());
        store.write("npm/left-pad/a-mit", b"MIT").expect("write");
        let catalog = RuleCatalog::from_rules(vec![Rule::new(
            RuleIdentifier::exact(&left_pad()),
            RulePayload::Resolver(rule()),
        )
        .expect("valid rule")]);

        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(package());
        let mut tracker = IssueTracker::new();
        let stats = ResolutionEngine::new(ResolverConfig::default(), &catalog, &store)
            .run(&mut record, &mut tracker)
            .expect("resolution failed");

        assert_eq!(stats.packages_changed, 1);
        assert_eq!(stats.blobs_deleted, 1);
        assert!(!store.contains("npm/left-pad/a-mit"));
    }
}
