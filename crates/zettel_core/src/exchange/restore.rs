//! Restore a repository from an export directory.

use crate::exchange::error::{io_error, ExchangeError, ExchangeResult};
use crate::exchange::exporter::ExportMetadata;
use crate::exchange::importer::{BrokenLinks, ImportStats, Importer};
use crate::exchange::progress::{ItemOutcome, ProgressExt, Stage};
use crate::exchange::EXPORT_METADATA_FILE;
use crate::repo::{NoteListQuery, NoteRepository, RepoError};
use log::{info, warn};
use std::path::Path;

/// Result of a restore run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Caller declined the destructive clear step; nothing was changed.
    Cancelled,
    Completed(RestoreReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Metadata of the export run, when the directory carries one.
    pub metadata: Option<ExportMetadata>,
    /// Notes deleted before importing.
    pub cleared: u64,
    pub import: ImportStats,
    pub broken_links: BrokenLinks,
}

impl RestoreReport {
    /// A restore succeeds when no file failed to import.
    pub fn success(&self) -> bool {
        self.import.failed == 0
    }
}

impl<'a, R: NoteRepository + ?Sized> Importer<'a, R> {
    /// Imports an export directory, optionally clearing the store first.
    ///
    /// `confirm_clear` receives the number of stored notes and must return
    /// `true` before anything is deleted. It is only consulted when
    /// `clear_existing` is set.
    pub fn restore_from_export(
        &mut self,
        export_dir: &Path,
        clear_existing: bool,
        batch_size: usize,
        confirm_clear: impl FnOnce(u64) -> bool,
    ) -> ExchangeResult<RestoreOutcome> {
        if !export_dir.is_dir() {
            return Err(ExchangeError::MissingDirectory(export_dir.to_path_buf()));
        }
        let metadata = read_export_metadata(export_dir)?;
        if let Some(metadata) = metadata.as_ref() {
            info!(
                "event=restore_start module=exchange status=ok export_date={} notes={}",
                metadata.export_date, metadata.statistics.total_notes
            );
        }

        let mut cleared = 0;
        if clear_existing {
            let existing = self.repo.count_notes()?;
            if !confirm_clear(existing) {
                info!("event=restore module=exchange status=cancelled");
                return Ok(RestoreOutcome::Cancelled);
            }
            cleared = self.clear_all()?;
        }

        let import = self.import_directory(export_dir, !clear_existing, batch_size)?;
        let broken_links = self.validate_links()?;
        let report = RestoreReport {
            metadata,
            cleared,
            import,
            broken_links,
        };

        if report.success() {
            info!(
                "event=restore module=exchange status=ok dir={} cleared={}",
                export_dir.display(),
                report.cleared
            );
        } else {
            warn!(
                "event=restore module=exchange status=error dir={} failed={}",
                export_dir.display(),
                report.import.failed
            );
        }
        Ok(RestoreOutcome::Completed(report))
    }

    fn clear_all(&mut self) -> ExchangeResult<u64> {
        let notes = self.repo.list(&NoteListQuery::default())?;
        let mut deleted = 0;
        self.progress.started(Stage::Clear, notes.len());
        for note in &notes {
            let outcome = match self.repo.delete(&note.id) {
                Ok(()) => {
                    deleted += 1;
                    ItemOutcome::Deleted
                }
                Err(RepoError::NotFound(_)) => ItemOutcome::Skipped,
                Err(err) => return Err(err.into()),
            };
            self.progress.item(Stage::Clear, &note.id, outcome);
        }
        self.progress.finished(Stage::Clear);
        info!("event=store_clear module=exchange status=ok deleted={deleted}");
        Ok(deleted)
    }
}

/// Reads `_export_metadata.json` from an export directory, if present.
pub fn read_export_metadata(export_dir: &Path) -> ExchangeResult<Option<ExportMetadata>> {
    let path = export_dir.join(EXPORT_METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(io_error(&path))?;
    Ok(Some(serde_json::from_str(&text)?))
}
