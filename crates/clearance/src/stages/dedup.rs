//! Removing facts already implied by an enclosing scope.
//!
//! The collapse steps run in a fixed order, each one seeing the lists the
//! previous steps emptied:
//!
//! 1. file licenses into the nearest directory or the default scope
//! 2. file copyrights, likewise
//! 3. directory licenses into the nearest parent directory
//! 4. directory copyrights, likewise
//! 5. top-most directory licenses into the default scope
//! 6. top-most directory copyrights, likewise
//!
//! Every step decides on a snapshot of the package before clearing anything.

use std::collections::BTreeSet;

use crate::archive::BlobStore;
use crate::error::Result;
use crate::record::{
    scope, ComplianceRecord, CopyrightFact, DirLicensing, LicenseFact, Package, NOASSERTION,
};

use super::StageStats;

/// Deduplication options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupConfig {
    /// Compare fact lists as distinct value sets instead of multisets.
    pub compare_distinct: bool,
    /// Also drop emptied file scopes that still reference their own content.
    pub purge_empty_scopes: bool,
    /// Flatten all remaining copyrights into `unifiedCopyrights`.
    pub unify_copyrights: bool,
}

impl DedupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compare_distinct(mut self, enabled: bool) -> Self {
        self.compare_distinct = enabled;
        self
    }

    pub fn with_purge_empty_scopes(mut self, enabled: bool) -> Self {
        self.purge_empty_scopes = enabled;
        self
    }

    pub fn with_unify_copyrights(mut self, enabled: bool) -> Self {
        self.unify_copyrights = enabled;
        self
    }
}

/// The deduplication engine.
pub struct DedupEngine<'a> {
    config: DedupConfig,
    store: &'a BlobStore,
}

impl<'a> DedupEngine<'a> {
    pub fn new(config: DedupConfig, store: &'a BlobStore) -> Self {
        Self { config, store }
    }

    /// Deduplicate every eligible package, then delete orphaned blobs.
    ///
    /// Reuse-compliant packages and packages with error issues are skipped
    /// whole.
    pub fn run(&self, record: &mut ComplianceRecord) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let mut released = Vec::new();

        for package in &mut record.project.packages {
            if package.reuse_compliant || package.has_errors() {
                tracing::debug!(package = %package.id, "Skipping deduplication");
                stats.packages_skipped += 1;
                continue;
            }
            let changed = dedup_package(package, &self.config, &mut released);
            stats.changed(changed);
        }

        stats.blobs_deleted = self.store.collect_garbage(record, released)?.len();
        tracing::info!(
            packages = stats.packages_changed,
            facts = stats.facts_changed,
            blobs = stats.blobs_deleted,
            "Deduplication finished"
        );
        Ok(stats)
    }
}

/// Deduplicate one package in place.
///
/// Blob paths of removed facts and removed file scopes are pushed to
/// `released`; whether they are still referenced elsewhere is decided later
/// from a full reference scan. Returns the number of facts removed.
pub fn dedup_package(package: &mut Package, config: &DedupConfig, released: &mut Vec<String>) -> usize {
    let distinct = config.compare_distinct;
    let mut removed = 0;

    // 1. file licenses
    let collapse: Vec<usize> = package
        .file_licensings
        .iter()
        .enumerate()
        .filter(|(_, file)| {
            let ancestor = nearest_dir(package, &file.scope, |d| !d.licenses.is_empty())
                .map(|d| &package.dir_licensings[d].licenses)
                .unwrap_or(&package.default_licensings);
            licenses_implied(&file.licenses, ancestor, distinct)
        })
        .map(|(i, _)| i)
        .collect();
    for i in collapse {
        removed += clear_licenses(&mut package.file_licensings[i].licenses, released);
    }

    // 2. file copyrights
    let collapse: Vec<usize> = package
        .file_licensings
        .iter()
        .enumerate()
        .filter(|(_, file)| {
            let ancestor = nearest_dir(package, &file.scope, |d| !d.copyrights.is_empty())
                .map(|d| &package.dir_licensings[d].copyrights)
                .unwrap_or(&package.default_copyrights);
            copyrights_implied(&file.copyrights, ancestor, distinct)
        })
        .map(|(i, _)| i)
        .collect();
    for i in collapse {
        removed += std::mem::take(&mut package.file_licensings[i].copyrights).len();
    }

    // 3. directory licenses into parent directories
    let collapse: Vec<usize> = (0..package.dir_licensings.len())
        .filter(|&i| {
            let dir = &package.dir_licensings[i];
            nearest_dir(package, &dir.scope, |d| !d.licenses.is_empty()).is_some_and(|p| {
                licenses_implied(&dir.licenses, &package.dir_licensings[p].licenses, distinct)
            })
        })
        .collect();
    for i in collapse {
        removed += clear_licenses(&mut package.dir_licensings[i].licenses, released);
    }

    // 4. directory copyrights into parent directories
    let collapse: Vec<usize> = (0..package.dir_licensings.len())
        .filter(|&i| {
            let dir = &package.dir_licensings[i];
            nearest_dir(package, &dir.scope, |d| !d.copyrights.is_empty()).is_some_and(|p| {
                copyrights_implied(&dir.copyrights, &package.dir_licensings[p].copyrights, distinct)
            })
        })
        .collect();
    for i in collapse {
        removed += std::mem::take(&mut package.dir_licensings[i].copyrights).len();
    }

    // 5. top-most directory licenses into the default scope
    let collapse: Vec<usize> = (0..package.dir_licensings.len())
        .filter(|&i| {
            let dir = &package.dir_licensings[i];
            nearest_dir(package, &dir.scope, |d| !d.licenses.is_empty()).is_none()
                && licenses_implied(&dir.licenses, &package.default_licensings, distinct)
        })
        .collect();
    for i in collapse {
        removed += clear_licenses(&mut package.dir_licensings[i].licenses, released);
    }

    // 6. top-most directory copyrights into the default scope
    let collapse: Vec<usize> = (0..package.dir_licensings.len())
        .filter(|&i| {
            let dir = &package.dir_licensings[i];
            nearest_dir(package, &dir.scope, |d| !d.copyrights.is_empty()).is_none()
                && copyrights_implied(&dir.copyrights, &package.default_copyrights, distinct)
        })
        .collect();
    for i in collapse {
        removed += std::mem::take(&mut package.dir_licensings[i].copyrights).len();
    }

    released.extend(package.prune_empty_scopes(config.purge_empty_scopes));

    if config.unify_copyrights {
        unify_copyrights(package);
        released.extend(package.prune_empty_scopes(config.purge_empty_scopes));
    }

    removed
}

/// Index of the closest enclosing directory scope satisfying `relevant`.
fn nearest_dir<F>(package: &Package, path: &str, relevant: F) -> Option<usize>
where
    F: Fn(&DirLicensing) -> bool,
{
    let candidates: Vec<usize> = package
        .dir_licensings
        .iter()
        .enumerate()
        .filter(|(_, d)| relevant(d))
        .map(|(i, _)| i)
        .collect();
    scope::best_match(
        path,
        candidates
            .iter()
            .map(|&i| package.dir_licensings[i].scope.as_str()),
    )
    .map(|pos| candidates[pos])
}

fn licenses_implied(child: &[LicenseFact], ancestor: &[LicenseFact], distinct: bool) -> bool {
    if child.is_empty() || child.iter().any(|f| f.license.as_deref() == Some(NOASSERTION)) {
        return false;
    }
    same_values(
        child.iter().map(|f| f.license.as_deref()),
        ancestor.iter().map(|f| f.license.as_deref()),
        distinct,
    )
}

fn copyrights_implied(child: &[CopyrightFact], ancestor: &[CopyrightFact], distinct: bool) -> bool {
    if child.is_empty() {
        return false;
    }
    same_values(
        child.iter().map(|c| c.copyright.as_deref()),
        ancestor.iter().map(|c| c.copyright.as_deref()),
        distinct,
    )
}

/// Order-independent comparison as multisets, or as sets when `distinct`.
fn same_values<'v>(
    left: impl Iterator<Item = Option<&'v str>>,
    right: impl Iterator<Item = Option<&'v str>>,
    distinct: bool,
) -> bool {
    let mut left: Vec<Option<&str>> = left.collect();
    let mut right: Vec<Option<&str>> = right.collect();
    left.sort();
    right.sort();
    if distinct {
        left.dedup();
        right.dedup();
    }
    left == right
}

fn clear_licenses(facts: &mut Vec<LicenseFact>, released: &mut Vec<String>) -> usize {
    let removed = std::mem::take(facts);
    released.extend(removed.iter().filter_map(|f| f.blob()).map(str::to_string));
    removed.len()
}

/// Move every copyright into the sorted, distinct package-level list.
fn unify_copyrights(package: &mut Package) {
    let mut unified: BTreeSet<String> = package
        .unified_copyrights
        .take()
        .unwrap_or_default()
        .into_iter()
        .collect();

    let default = std::mem::take(&mut package.default_copyrights);
    let dirs = package
        .dir_licensings
        .iter_mut()
        .flat_map(|d| std::mem::take(&mut d.copyrights));
    let files = package
        .file_licensings
        .iter_mut()
        .flat_map(|f| std::mem::take(&mut f.copyrights));
    unified.extend(default.into_iter().chain(dirs).chain(files).filter_map(|c| c.copyright));

    package.unified_copyrights = Some(unified.into_iter().collect());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileLicensing, Identifier};

    fn file(scope: &str, licenses: &[&str]) -> FileLicensing {
        let mut file = FileLicensing::new(scope);
        for l in licenses {
            file.licenses.push(LicenseFact::new(*l, scope));
        }
        file
    }

    fn dir(scope: &str, licenses: &[&str]) -> DirLicensing {
        let mut dir = DirLicensing::new(scope);
        for l in licenses {
            dir.licenses.push(LicenseFact::new(*l, format!("{}/LICENSE", scope)));
        }
        dir
    }

    fn package() -> Package {
        let mut pkg = Package::new(Identifier::new("NPM", "", "left-pad", "1.0.0"));
        pkg.default_licensings.push(LicenseFact::new("MIT", "LICENSE"));
        pkg
    }

    #[test]
    fn test_file_collapses_into_default() {
        let mut pkg = package();
        pkg.file_licensings.push(file("index.js", &["MIT"]));
        pkg.file_licensings.push(file("other.js", &["Apache-2.0"]));

        let mut released = Vec::new();
        let removed = dedup_package(&mut pkg, &DedupConfig::default(), &mut released);

        assert_eq!(removed, 1);
        assert_eq!(pkg.file_licensings.len(), 1);
        assert_eq!(pkg.file_licensings[0].scope, "other.js");
    }

    #[test]
    fn test_file_compares_against_longest_licensed_dir() {
        let mut pkg = package();
        pkg.dir_licensings.push(dir("lib", &["Apache-2.0"]));
        pkg.dir_licensings.push(dir("lib/vendor", &["BSD-3-Clause"]));
        pkg.file_licensings.push(file("lib/vendor/x.js", &["Apache-2.0"]));
        pkg.file_licensings.push(file("lib/vendor/y.js", &["BSD-3-Clause"]));

        let mut released = Vec::new();
        dedup_package(&mut pkg, &DedupConfig::default(), &mut released);

        let scopes: Vec<_> = pkg.file_licensings.iter().map(|f| f.scope.as_str()).collect();
        assert_eq!(scopes, vec!["lib/vendor/x.js"]);
    }

    #[test]
    fn test_noassertion_never_collapses() {
        let mut pkg = Package::new(Identifier::new("NPM", "", "x", "1"));
        pkg.default_licensings.push(LicenseFact::new(NOASSERTION, "LICENSE"));
        pkg.file_licensings.push(file("a.js", &[NOASSERTION]));

        let mut released = Vec::new();
        assert_eq!(dedup_package(&mut pkg, &DedupConfig::default(), &mut released), 0);
        assert_eq!(pkg.file_licensings.len(), 1);
    }

    #[test]
    fn test_multiset_versus_distinct_comparison() {
        let mut pkg = package();
        pkg.file_licensings.push(file("a.js", &["MIT", "MIT"]));
        let mut strict = pkg.clone();

        let mut released = Vec::new();
        dedup_package(&mut strict, &DedupConfig::default(), &mut released);
        assert_eq!(strict.file_licensings.len(), 1);

        dedup_package(
            &mut pkg,
            &DedupConfig::new().with_compare_distinct(true),
            &mut released,
        );
        assert!(pkg.file_licensings.is_empty());
    }

    #[test]
    fn test_dir_chain_collapses_on_snapshot() {
        let mut pkg = package();
        pkg.dir_licensings.push(dir("lib", &["MIT"]));
        pkg.dir_licensings.push(dir("lib/a", &["MIT"]));
        pkg.dir_licensings.push(dir("lib/a/b", &["MIT"]));

        let mut released = Vec::new();
        dedup_package(&mut pkg, &DedupConfig::default(), &mut released);
        assert!(pkg.dir_licensings.is_empty());
    }

    #[test]
    fn test_nested_dir_is_not_compared_with_default() {
        let mut pkg = package();
        pkg.dir_licensings.push(dir("lib", &["Apache-2.0"]));
        pkg.dir_licensings.push(dir("lib/mit", &["MIT"]));

        let mut released = Vec::new();
        dedup_package(&mut pkg, &DedupConfig::default(), &mut released);
        assert_eq!(pkg.dir_licensings.len(), 2);
    }

    #[test]
    fn test_released_blobs_include_removed_texts() {
        let mut pkg = package();
        let mut f = FileLicensing::new("a.js");
        f.licenses
            .push(LicenseFact::new("MIT", "a.js").with_text("npm/left-pad/a.js.license"));
        f.file_content_in_archive = Some("npm/left-pad/a.js".to_string());
        pkg.file_licensings.push(f);

        let mut released = Vec::new();
        dedup_package(
            &mut pkg,
            &DedupConfig::new().with_purge_empty_scopes(true),
            &mut released,
        );
        assert_eq!(
            released,
            vec![
                "npm/left-pad/a.js.license".to_string(),
                "npm/left-pad/a.js".to_string()
            ]
        );
        assert!(pkg.file_licensings.is_empty());
    }

    #[test]
    fn test_unify_copyrights_sorts_and_prunes() {
        let mut pkg = package();
        pkg.default_copyrights
            .push(CopyrightFact::new("Copyright B", "LICENSE"));
        let mut f = FileLicensing::new("a.js");
        f.copyrights.push(CopyrightFact::new("Copyright A", "a.js"));
        f.copyrights.push(CopyrightFact::new("Copyright B", "a.js"));
        f.licenses.push(LicenseFact::new("Apache-2.0", "a.js"));
        pkg.file_licensings.push(f);
        pkg.file_licensings.push({
            let mut only = FileLicensing::new("b.js");
            only.copyrights.push(CopyrightFact::new("Copyright C", "b.js"));
            only
        });

        let mut released = Vec::new();
        dedup_package(
            &mut pkg,
            &DedupConfig::new().with_unify_copyrights(true),
            &mut released,
        );

        assert_eq!(
            pkg.unified_copyrights,
            Some(vec![
                "Copyright A".to_string(),
                "Copyright B".to_string(),
                "Copyright C".to_string()
            ])
        );
        assert!(pkg.default_copyrights.is_empty());
        assert_eq!(pkg.file_licensings.len(), 1);
        assert_eq!(pkg.file_licensings[0].scope, "a.js");
    }

    #[test]
    fn test_engine_skips_reuse_and_errored_packages() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let mut record = ComplianceRecord::new("demo", "demo.zip");

        let mut reuse = package();
        reuse.reuse_compliant = true;
        reuse.file_licensings.push(file("a.js", &["MIT"]));
        record.project.packages.push(reuse);

        let mut normal = package();
        normal.id = Identifier::new("NPM", "", "other", "1.0.0");
        normal.file_licensings.push(file("a.js", &["MIT"]));
        record.project.packages.push(normal);

        let stats = DedupEngine::new(DedupConfig::default(), &store)
            .run(&mut record)
            .expect("dedup failed");

        assert_eq!(stats.packages_skipped, 1);
        assert_eq!(stats.packages_changed, 1);
        assert_eq!(record.project.packages[0].file_licensings.len(), 1);
        assert!(record.project.packages[1].file_licensings.is_empty());
    }

    #[test]
    fn test_collapsed_text_outside_archive_is_not_deleted() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let victim = dir.path().join("victim.txt");
        std::fs::write(&victim, b"outside").expect("write victim");
        let store = BlobStore::new(dir.path().join("work"));

        let mut pkg = package();
        let mut escaping = FileLicensing::new("index.js");
        escaping
            .licenses
            .push(LicenseFact::new("MIT", "index.js").with_text("../victim.txt"));
        pkg.file_licensings.push(escaping);
        let mut record = ComplianceRecord::new("demo", "demo.zip");
        record.project.packages.push(pkg);

        let stats = DedupEngine::new(DedupConfig::default(), &store)
            .run(&mut record)
            .expect("dedup failed");

        assert!(record.project.packages[0].file_licensings.is_empty());
        assert_eq!(stats.blobs_deleted, 0);
        assert!(victim.is_file());
    }
}
