//! Stage engines.
//!
//! Each engine mutates a record in place, reports findings to the
//! [`IssueSink`](crate::issues::IssueSink) it is given, and deletes blobs
//! from the working [`BlobStore`](crate::archive::BlobStore) once nothing
//! references them any more.

mod classification;
mod curation;
mod declared;
mod dedup;
mod merge;
mod resolution;
mod selection;

use serde::Serialize;

pub use classification::ClassificationEngine;
pub use curation::CurationEngine;
pub use declared::{DeclaredEntry, DeclaredLicenses, DeclaredSource};
pub use dedup::{DedupConfig, DedupEngine};
pub use merge::{CollisionPolicy, MergeConfig, MergeEngine, MergeInput};
pub use resolution::{ResolutionEngine, ResolverConfig};
pub use selection::SelectionEngine;

/// Counters every engine reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    /// Packages the engine changed.
    pub packages_changed: usize,
    /// Packages left alone by policy or because of an ambiguous rule.
    pub packages_skipped: usize,
    /// License or copyright facts added, removed or rewritten.
    pub facts_changed: usize,
    /// Archive blobs deleted after the stage.
    pub blobs_deleted: usize,
}

impl StageStats {
    pub(crate) fn changed(&mut self, facts: usize) {
        if facts > 0 {
            self.packages_changed += 1;
            self.facts_changed += facts;
        }
    }
}
