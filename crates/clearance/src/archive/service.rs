//! Packing and unpacking the content archive.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{ClearanceError, Result};

use super::blobs::list_files;

/// Expands an archive into a directory and compresses a directory back.
pub trait ArchiveService {
    /// Extract every entry of `archive` below `target`.
    fn unpack(&self, archive: &Path, target: &Path) -> Result<()>;

    /// Write every file below `source` into a new archive at `archive`.
    fn pack(&self, source: &Path, archive: &Path) -> Result<()>;
}

/// Zip implementation with deterministic output: entries are sorted and
/// carry a fixed timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveService;

impl ZipArchiveService {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveService for ZipArchiveService {
    fn unpack(&self, archive: &Path, target: &Path) -> Result<()> {
        let file = File::open(archive).map_err(|e| ClearanceError::io(archive, e))?;
        let mut zip = ZipArchive::new(file)?;
        fs::create_dir_all(target).map_err(|e| ClearanceError::io(target, e))?;
        zip.extract(target)?;

        tracing::debug!(
            archive = %archive.display(),
            entries = zip.len(),
            "Unpacked archive"
        );
        Ok(())
    }

    fn pack(&self, source: &Path, archive: &Path) -> Result<()> {
        if let Some(parent) = archive.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ClearanceError::io(parent, e))?;
            }
        }

        let file = File::create(archive).map_err(|e| ClearanceError::io(archive, e))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let files = list_files(source)?;
        for relative in &files {
            writer.start_file(relative.as_str(), options)?;
            let path = source.join(relative);
            let mut input = File::open(&path).map_err(|e| ClearanceError::io(&path, e))?;
            io::copy(&mut input, &mut writer).map_err(|e| ClearanceError::io(&path, e))?;
        }
        writer.finish()?;

        tracing::debug!(
            archive = %archive.display(),
            entries = files.len(),
            "Packed archive"
        );
        Ok(())
    }
}
