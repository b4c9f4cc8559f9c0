//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use clearance::archive::{ArchiveService, BlobStore, ZipArchiveService};
use clearance::record::{CopyrightFact, DirLicensing, FileLicensing, LicenseFact};
use clearance::{ComplianceRecord, Identifier, Package};

/// A scratch directory holding records, archives and rule files.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Save `record` as `<name>.json` with an archive `<name>.zip` holding
    /// the given blobs.
    pub fn write_record(
        &self,
        name: &str,
        record: &mut ComplianceRecord,
        blobs: &[(&str, &str)],
    ) -> PathBuf {
        let content = self.path(&format!("{}-content", name));
        fs::create_dir_all(&content).expect("Failed to create content dir");
        let store = BlobStore::new(&content);
        for (path, text) in blobs {
            store.write(path, text.as_bytes()).expect("Failed to write blob");
        }

        let archive = format!("{}.zip", name);
        ZipArchiveService::new()
            .pack(&content, &self.path(&archive))
            .expect("Failed to pack archive");

        record.project.archive_path = archive;
        let record_path = self.path(&format!("{}.json", name));
        record.save(&record_path).expect("Failed to save record");
        record_path
    }

    /// Write a rule file below `dir` and return the directory.
    pub fn write_rules(&self, dir: &str, file: &str, yaml: &str) -> PathBuf {
        let rules = self.path(dir);
        fs::create_dir_all(&rules).expect("Failed to create rules dir");
        fs::write(rules.join(file), yaml).expect("Failed to write rule file");
        rules
    }

    /// Files inside the archive a record refers to.
    pub fn archive_files(&self, record_path: &Path) -> BTreeSet<String> {
        let record = ComplianceRecord::load(record_path).expect("Failed to load record");
        let unpacked = TempDir::new().expect("Failed to create temp dir");
        ZipArchiveService::new()
            .unpack(&record.archive_location(record_path), unpacked.path())
            .expect("Failed to unpack archive");
        BlobStore::new(unpacked.path()).files().expect("Failed to list files")
    }
}

pub fn left_pad_id() -> Identifier {
    Identifier::new("NPM", "", "left-pad", "1.0.0")
}

/// License values of a fact list, in order.
pub fn values(facts: &[LicenseFact]) -> Vec<&str> {
    facts.iter().filter_map(|f| f.license.as_deref()).collect()
}

/// A package whose file `lib/a.js` carries both MIT and Apache-2.0, with
/// matching directory and default scopes.
pub fn dual_licensed_package() -> Package {
    let mut pkg = Package::new(left_pad_id());

    let mut file = FileLicensing::new("lib/a.js");
    file.file_content_in_archive = Some("NPM/left-pad/1.0.0/lib/a.js".to_string());
    file.licenses.push(
        LicenseFact::new("MIT", "lib/a.js").with_text("NPM/left-pad/1.0.0/MIT.txt"),
    );
    file.licenses.push(
        LicenseFact::new("Apache-2.0", "lib/a.js").with_text("NPM/left-pad/1.0.0/APACHE.txt"),
    );
    file.copyrights
        .push(CopyrightFact::new("Copyright 2020 Jane Doe", "lib/a.js"));
    pkg.file_licensings.push(file);

    let mut dir = DirLicensing::new("lib");
    dir.licenses.push(LicenseFact::new("MIT", "lib/a.js"));
    dir.licenses.push(LicenseFact::new("Apache-2.0", "lib/a.js"));
    pkg.dir_licensings.push(dir);

    pkg.default_licensings.push(
        LicenseFact::new("MIT", "lib/a.js").with_text("NPM/left-pad/1.0.0/MIT.txt"),
    );
    pkg.default_licensings.push(
        LicenseFact::new("Apache-2.0", "lib/a.js").with_text("NPM/left-pad/1.0.0/APACHE.txt"),
    );
    pkg.default_copyrights
        .push(CopyrightFact::new("Copyright 2020 Jane Doe", "lib/a.js"));
    pkg
}

/// Blobs referenced by [`dual_licensed_package`].
pub const DUAL_LICENSED_BLOBS: &[(&str, &str)] = &[
    ("NPM/left-pad/1.0.0/lib/a.js", "module.exports = pad;"),
    ("NPM/left-pad/1.0.0/MIT.txt", "MIT License"),
    ("NPM/left-pad/1.0.0/APACHE.txt", "Apache License 2.0"),
];

pub fn record_with(packages: Vec<Package>) -> ComplianceRecord {
    let mut record = ComplianceRecord::new("demo", "");
    record.project.packages = packages;
    record
}
