//! Repository -> markdown directory export.
//!
//! # Responsibility
//! - Write one `<id>.md` file per note through the markdown codec.
//! - Record run counters and store statistics next to the exported files.
//!
//! # Invariants
//! - A single note failure is counted and never aborts the run.
//! - Run artifacts start with `_` so imports skip them.

use crate::codec;
use crate::exchange::error::{io_error, ExchangeError, ExchangeResult};
use crate::exchange::progress::{ItemOutcome, NoProgress, ProgressExt, ProgressObserver, Stage};
use crate::exchange::{EXPORT_METADATA_FILE, EXPORT_SUMMARY_FILE, INCREMENTAL_METADATA_FILE};
use crate::model::kind::NoteKind;
use crate::model::note::{Note, NoteId};
use crate::model::timestamp;
use crate::repo::{NoteListQuery, NoteRepository, RepositoryStatistics, SearchQuery};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 100;

/// Counters of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub total_notes: u64,
    pub exported: u64,
    pub failed: u64,
    pub warnings: Vec<String>,
}

/// Content of `_export_metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_date: String,
    pub statistics: ExportStats,
    pub database_stats: RepositoryStatistics,
}

/// Content of `_incremental_metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalMetadata {
    pub export_date: String,
    pub since_date: String,
    pub notes_exported: u64,
    pub failed: u64,
    pub note_ids: Vec<NoteId>,
}

/// Selects the notes of a criteria export. Exactly one criterion applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportCriteria {
    Tag(String),
    Kind(NoteKind),
    Search(String),
}

/// Exports notes from a repository into markdown files.
pub struct Exporter<'a, R: NoteRepository + ?Sized> {
    repo: &'a R,
    progress: Box<dyn ProgressObserver + 'a>,
}

impl<'a, R: NoteRepository + ?Sized> Exporter<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, observer: impl ProgressObserver + 'a) -> Self {
        self.progress = Box::new(observer);
        self
    }

    /// Renders one note as markdown text.
    pub fn export_note(&self, note: &Note) -> ExchangeResult<String> {
        codec::encode(note).map_err(|message| ExchangeError::Encode {
            id: note.id.clone(),
            message,
        })
    }

    /// Exports one stored note. Returns `false` when the id is unknown.
    pub fn export_single_note(&mut self, id: &str, export_dir: &Path) -> ExchangeResult<bool> {
        let Some(note) = self.repo.read(id)? else {
            error!("event=note_export module=exchange status=error id={id} reason=not_found");
            return Ok(false);
        };
        ensure_dir(export_dir)?;
        self.write_note(&note, export_dir)?;
        info!("event=note_export module=exchange status=ok id={id}");
        Ok(true)
    }

    /// Exports every stored note, reading the repository page by page.
    pub fn export_all(&mut self, export_dir: &Path, batch_size: usize) -> ExchangeResult<ExportStats> {
        if batch_size == 0 {
            return Err(ExchangeError::InvalidBatchSize);
        }
        ensure_dir(export_dir)?;
        let page_size = u32::try_from(batch_size).unwrap_or(u32::MAX);

        let database_stats = self.repo.get_statistics()?;
        let mut stats = ExportStats {
            total_notes: database_stats.total_notes,
            ..ExportStats::default()
        };
        self.progress
            .started(Stage::Export, usize::try_from(stats.total_notes).unwrap_or(usize::MAX));

        let mut offset: u32 = 0;
        while u64::from(offset) < stats.total_notes {
            let page = self.repo.list(&NoteListQuery::page(page_size, offset))?;
            if page.is_empty() {
                break;
            }
            for note in &page {
                self.export_counted(note, export_dir, &mut stats);
            }
            offset = offset.saturating_add(page_size);
        }

        self.progress.finished(Stage::Export);
        write_json(
            &export_dir.join(EXPORT_METADATA_FILE),
            &ExportMetadata {
                export_date: timestamp::format_iso(timestamp::now()),
                statistics: stats.clone(),
                database_stats,
            },
        )?;

        info!(
            "event=export_all module=exchange status=ok dir={} total={} exported={} failed={}",
            export_dir.display(),
            stats.total_notes,
            stats.exported,
            stats.failed
        );
        Ok(stats)
    }

    /// Exports the notes selected by one criterion, without batching.
    pub fn export_by_criteria(
        &mut self,
        export_dir: &Path,
        criteria: &ExportCriteria,
    ) -> ExchangeResult<ExportStats> {
        ensure_dir(export_dir)?;
        let notes = match criteria {
            ExportCriteria::Tag(tag) => self.repo.find_by_tag(tag)?,
            ExportCriteria::Kind(kind) => self.repo.list(&NoteListQuery {
                kind: Some(*kind),
                ..NoteListQuery::default()
            })?,
            ExportCriteria::Search(text) => self.repo.search(&SearchQuery::new(text.as_str()))?,
        };

        let mut stats = ExportStats {
            total_notes: notes.len() as u64,
            ..ExportStats::default()
        };
        self.progress.started(Stage::Export, notes.len());
        for note in &notes {
            self.export_counted(note, export_dir, &mut stats);
        }
        self.progress.finished(Stage::Export);

        info!(
            "event=export_criteria module=exchange status=ok criteria={:?} exported={} failed={}",
            criteria, stats.exported, stats.failed
        );
        Ok(stats)
    }

    /// Full export into `<base>/<prefix>_YYYYMMDD_HHMMSS/` plus a text summary.
    pub fn create_timestamped_export(
        &mut self,
        base_dir: &Path,
        prefix: &str,
    ) -> ExchangeResult<(PathBuf, ExportStats)> {
        let now = Utc::now();
        let export_dir = base_dir.join(format!("{prefix}_{}", now.format("%Y%m%d_%H%M%S")));
        let stats = self.export_all(&export_dir, DEFAULT_EXPORT_BATCH_SIZE)?;

        let summary_path = export_dir.join(EXPORT_SUMMARY_FILE);
        std::fs::write(&summary_path, render_summary(now, &stats))
            .map_err(io_error(&summary_path))?;
        Ok((export_dir, stats))
    }

    /// Exports notes updated at or after `since` into `<base>/incremental_<ts>/`.
    pub fn create_incremental_export(
        &mut self,
        base_dir: &Path,
        since: DateTime<Utc>,
    ) -> ExchangeResult<(PathBuf, IncrementalMetadata)> {
        let now = Utc::now();
        let export_dir = base_dir.join(format!("incremental_{}", now.format("%Y%m%d_%H%M%S")));
        ensure_dir(&export_dir)?;

        let notes = self
            .repo
            .list(&NoteListQuery::default())?
            .into_iter()
            .filter(|note| note.updated_at >= since)
            .collect::<Vec<_>>();

        let mut stats = ExportStats {
            total_notes: notes.len() as u64,
            ..ExportStats::default()
        };
        self.progress.started(Stage::Export, notes.len());
        for note in &notes {
            self.export_counted(note, &export_dir, &mut stats);
        }
        self.progress.finished(Stage::Export);

        let metadata = IncrementalMetadata {
            export_date: timestamp::format_iso(now),
            since_date: timestamp::format_iso(since),
            notes_exported: stats.exported,
            failed: stats.failed,
            note_ids: notes.iter().map(|note| note.id.clone()).collect(),
        };
        write_json(&export_dir.join(INCREMENTAL_METADATA_FILE), &metadata)?;

        info!(
            "event=export_incremental module=exchange status=ok since={} exported={} failed={}",
            metadata.since_date, metadata.notes_exported, metadata.failed
        );
        Ok((export_dir, metadata))
    }

    fn export_counted(&mut self, note: &Note, export_dir: &Path, stats: &mut ExportStats) {
        match self.write_note(note, export_dir) {
            Ok(()) => {
                stats.exported += 1;
                self.progress
                    .item(Stage::Export, &note.id, ItemOutcome::Exported);
            }
            Err(err) => {
                error!(
                    "event=note_export module=exchange status=error id={} error={}",
                    note.id, err
                );
                stats.failed += 1;
                stats
                    .warnings
                    .push(format!("Failed to export {}: {err}", note.id));
                self.progress.item(Stage::Export, &note.id, ItemOutcome::Failed);
            }
        }
    }

    fn write_note(&self, note: &Note, export_dir: &Path) -> ExchangeResult<()> {
        let text = self.export_note(note)?;
        let path = export_dir.join(format!("{}.md", note.id));
        std::fs::write(&path, text).map_err(io_error(&path))
    }
}

fn ensure_dir(dir: &Path) -> ExchangeResult<()> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ExchangeResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).map_err(io_error(path))
}

fn render_summary(exported_at: DateTime<Utc>, stats: &ExportStats) -> String {
    let mut summary = String::from("Zettelkasten Export Summary\n");
    summary.push_str("==========================\n\n");
    summary.push_str(&format!(
        "Export Date: {}\n",
        exported_at.format("%Y-%m-%d %H:%M:%S")
    ));
    summary.push_str(&format!("Total Notes: {}\n", stats.total_notes));
    summary.push_str(&format!("Successfully Exported: {}\n", stats.exported));
    summary.push_str(&format!("Failed: {}\n", stats.failed));
    if !stats.warnings.is_empty() {
        summary.push_str("\nWarnings:\n");
        for warning in &stats.warnings {
            summary.push_str(&format!("  - {warning}\n"));
        }
    }
    summary
}
