//! Batch exchange between markdown directories and the repository.
//!
//! # Responsibility
//! - Export, import, merge and restore note collections.
//! - Report per-item progress through an injected observer.
//!
//! # Invariants
//! - Batch runs never bypass the codec or the repository.
//! - Each item commits independently; a run is not all-or-nothing.

pub mod error;
pub mod exporter;
pub mod importer;
pub mod merge;
pub mod progress;
pub mod restore;

pub use error::{ExchangeError, ExchangeResult};
pub use exporter::{
    ExportCriteria, ExportMetadata, ExportStats, Exporter, IncrementalMetadata,
    DEFAULT_EXPORT_BATCH_SIZE,
};
pub use importer::{BrokenLinks, ImportStats, Importer, DEFAULT_IMPORT_BATCH_SIZE};
pub use merge::{MergeStats, MergeStrategy};
pub use progress::{ItemOutcome, NoProgress, ProgressEvent, ProgressObserver, Stage};
pub use restore::{read_export_metadata, RestoreOutcome, RestoreReport};

use error::io_error;
use std::path::{Path, PathBuf};

pub const EXPORT_METADATA_FILE: &str = "_export_metadata.json";
pub const EXPORT_SUMMARY_FILE: &str = "_export_summary.txt";
pub const INCREMENTAL_METADATA_FILE: &str = "_incremental_metadata.json";

/// Lists `*.md` note files of `dir` sorted by file name.
///
/// Names starting with `_` are reserved for run artifacts and skipped.
pub fn markdown_files(dir: &Path) -> ExchangeResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let reserved = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('_'));
        if !reserved {
            files.push(path);
        }
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(files)
}
