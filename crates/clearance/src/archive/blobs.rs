//! The working archive directory as a blob store, and reference counting.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ClearanceError, Result};
use crate::record::ComplianceRecord;

/// How often each archive path is referenced across a whole record.
///
/// Always computed from a full scan; never updated incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCounts {
    counts: HashMap<String, usize>,
}

impl ReferenceCounts {
    /// Count every blob reference of every package and scope.
    pub fn scan(record: &ComplianceRecord) -> Self {
        let mut counts = HashMap::new();
        for path in record.blob_references() {
            *counts.entry(path.to_string()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, path: &str) -> usize {
        self.counts.get(path).copied().unwrap_or(0)
    }

    pub fn is_live(&self, path: &str) -> bool {
        self.count(path) > 0
    }

    /// Referenced paths in sorted order.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.counts.keys().map(String::as_str).collect()
    }
}

/// Blobs of an unpacked archive, addressed by slash-separated relative path.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a blob.
    ///
    /// Paths come from the record, so anything that could leave the store
    /// (`..`, a root or a drive prefix) is rejected.
    pub fn path_of(&self, relative: &str) -> Result<PathBuf> {
        if !is_plain_relative(relative) {
            return Err(ClearanceError::UnsafePath(relative.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.path_of(relative).is_ok_and(|path| path.is_file())
    }

    /// Every file in the store.
    pub fn files(&self) -> Result<BTreeSet<String>> {
        list_files(&self.root)
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.path_of(relative)?;
        fs::read(&path).map_err(|e| ClearanceError::io(&path, e))
    }

    /// Write a blob, creating parent directories.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ClearanceError::io(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| ClearanceError::io(&path, e))
    }

    /// Copy an external file into the store.
    pub fn copy_in(&self, source: &Path, relative: &str) -> Result<()> {
        let bytes = fs::read(source).map_err(|e| ClearanceError::io(source, e))?;
        self.write(relative, &bytes)
    }

    /// Delete a blob and any directories left empty by it.
    ///
    /// Returns `false` when the blob did not exist.
    pub fn remove(&self, relative: &str) -> Result<bool> {
        let path = self.path_of(relative)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| ClearanceError::io(&path, e))?;

        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            let empty = fs::read_dir(current)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty {
                break;
            }
            fs::remove_dir(current).map_err(|e| ClearanceError::io(current, e))?;
            dir = current.parent();
        }
        Ok(true)
    }

    /// Delete every candidate blob no longer referenced by the record.
    ///
    /// Counts are taken from the record as it is now, so the caller must
    /// finish all fact removals first. Returns the deleted paths, sorted.
    pub fn collect_garbage<I>(&self, record: &ComplianceRecord, candidates: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = String>,
    {
        let counts = ReferenceCounts::scan(record);
        let candidates: BTreeSet<String> = candidates.into_iter().collect();

        let mut deleted = Vec::new();
        for path in candidates {
            if counts.is_live(&path) {
                continue;
            }
            if !is_plain_relative(&path) {
                tracing::warn!(blob = %path, "Refusing to delete blob outside the archive");
                continue;
            }
            if self.remove(&path)? {
                tracing::debug!(blob = %path, "Deleted unreferenced blob");
                deleted.push(path);
            }
        }
        Ok(deleted)
    }
}

/// Whether `relative` names a location strictly inside its base directory.
fn is_plain_relative(relative: &str) -> bool {
    let path = Path::new(relative);
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Relative paths of every file below `root`, slash-separated and sorted.
pub(crate) fn list_files(root: &Path) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ClearanceError::io(root, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.insert(parts.join("/"));
        }
    }
    Ok(files)
}
