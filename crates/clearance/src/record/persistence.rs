//! Persistence for compliance records - load/save JSON files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ClearanceError, Result};

use super::model::ComplianceRecord;

impl ComplianceRecord {
    /// Save the record to a JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use clearance::ComplianceRecord;
    /// # fn example(record: &ComplianceRecord) -> clearance::Result<()> {
    /// record.save("out/project.json")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| ClearanceError::io(parent, e))?;
            }
        }

        let file = File::create(path).map_err(|e| ClearanceError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| ClearanceError::io(path, e))?;

        Ok(())
    }

    /// Load a record from a JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use clearance::ComplianceRecord;
    /// let record = ComplianceRecord::load("project.json").unwrap();
    /// println!("Packages: {}", record.project.packages.len());
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| ClearanceError::io(path, e))?;
        let reader = BufReader::new(file);
        let record: ComplianceRecord = serde_json::from_reader(reader)?;

        Ok(record)
    }

    /// Location of the archive this record refers to.
    ///
    /// The archive path is stored relative to the record file.
    pub fn archive_location(&self, record_path: impl AsRef<Path>) -> PathBuf {
        let parent = record_path.as_ref().parent().unwrap_or(Path::new("."));
        parent.join(&self.project.archive_path)
    }
}

/// Archive path that accompanies an output record.
///
/// # Example
///
/// ```
/// use clearance::record::archive_path_for;
///
/// let path = archive_path_for("out/project.json");
/// assert_eq!(path.to_string_lossy(), "out/project.zip");
/// ```
pub fn archive_path_for(record_path: impl AsRef<Path>) -> PathBuf {
    record_path.as_ref().with_extension("zip")
}
