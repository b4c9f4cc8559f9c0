//! The content archive: packing, blob lifecycle and consistency checks.
//!
//! A stage unpacks the archive into a scratch directory, treats it as a
//! [`BlobStore`] while it edits the record, deletes blobs whose
//! [`ReferenceCounts`] drop to zero, and packs the directory again once
//! [`check_consistency`] is satisfied.

mod blobs;
mod consistency;
mod service;

pub use blobs::{BlobStore, ReferenceCounts};
pub use consistency::{check_consistency, report_violations, Violation};
pub use service::{ArchiveService, ZipArchiveService};
