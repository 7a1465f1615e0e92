//! Markdown directory -> repository import.
//!
//! # Responsibility
//! - Decode note files and create, update or skip them in the repository.
//! - Report stored links whose target no longer exists.
//!
//! # Invariants
//! - Files whose name starts with `_` are never imported.
//! - A bad file is counted as failed with a warning; the run continues.
//! - A file without a header id is a failure, never a file-stem fallback.

use crate::codec::{self, DecodeError, DecodeOptions, Decoded};
use crate::exchange::error::{ExchangeError, ExchangeResult};
use crate::exchange::markdown_files;
use crate::exchange::progress::{ItemOutcome, NoProgress, ProgressExt, ProgressObserver, Stage};
use crate::model::note::{Note, NoteId};
use crate::repo::{NoteListQuery, NoteRepository};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 50;

/// Counters of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_files: u64,
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub warnings: Vec<String>,
}

impl ImportStats {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Imported => self.imported += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Exported | ItemOutcome::Deleted | ItemOutcome::Checked => {}
        }
    }
}

/// Note id -> dangling target ids of its stored links.
pub type BrokenLinks = BTreeMap<NoteId, Vec<NoteId>>;

/// Imports markdown files into a repository.
pub struct Importer<'a, R: NoteRepository + ?Sized> {
    pub(crate) repo: &'a mut R,
    pub(crate) progress: Box<dyn ProgressObserver + 'a>,
}

impl<'a, R: NoteRepository + ?Sized> Importer<'a, R> {
    pub fn new(repo: &'a mut R) -> Self {
        Self {
            repo,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, observer: impl ProgressObserver + 'a) -> Self {
        self.progress = Box::new(observer);
        self
    }

    /// Decodes one file in import mode.
    ///
    /// `Err` carries the warning recorded for the failed file.
    pub fn parse_file(&self, path: &Path) -> Result<Decoded, String> {
        codec::decode_file(path, &DecodeOptions::require_id()).map_err(|err| match err {
            DecodeError::MissingId => format!("No ID in {}, skipping", path.display()),
            other => format!("Failed to parse {}: {other}", path.display()),
        })
    }

    /// Imports one file, folding its outcome and warnings into `stats`.
    pub fn import_file(
        &mut self,
        path: &Path,
        update_existing: bool,
        stats: &mut ImportStats,
    ) -> ItemOutcome {
        let outcome = match self.parse_file(path) {
            Ok(decoded) => {
                stats.warnings.extend(decoded.warnings);
                self.store(decoded.note, update_existing)
                    .unwrap_or_else(|err| {
                        error!(
                            "event=file_import module=exchange status=error path={} error={}",
                            path.display(),
                            err
                        );
                        stats
                            .warnings
                            .push(format!("Failed to import {}: {err}", path.display()));
                        ItemOutcome::Failed
                    })
            }
            Err(warning) => {
                warn!(
                    "event=file_import module=exchange status=error path={} reason=parse",
                    path.display()
                );
                stats.warnings.push(warning);
                ItemOutcome::Failed
            }
        };

        stats.record(outcome);
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.progress.item(Stage::Import, &label, outcome);
        outcome
    }

    /// Imports every note file of `dir`, in file-name order.
    pub fn import_directory(
        &mut self,
        dir: &Path,
        update_existing: bool,
        batch_size: usize,
    ) -> ExchangeResult<ImportStats> {
        if batch_size == 0 {
            return Err(ExchangeError::InvalidBatchSize);
        }
        if !dir.is_dir() {
            return Err(ExchangeError::MissingDirectory(dir.to_path_buf()));
        }

        let files = markdown_files(dir)?;
        let mut stats = ImportStats {
            total_files: files.len() as u64,
            ..ImportStats::default()
        };
        self.progress.started(Stage::Import, files.len());
        for (index, batch) in files.chunks(batch_size).enumerate() {
            for path in batch {
                self.import_file(path, update_existing, &mut stats);
            }
            info!(
                "event=import_batch module=exchange status=ok batch={} files={}",
                index,
                batch.len()
            );
        }
        self.progress.finished(Stage::Import);

        info!(
            "event=import_directory module=exchange status=ok dir={} total={} imported={} updated={} skipped={} failed={}",
            dir.display(),
            stats.total_files,
            stats.imported,
            stats.updated,
            stats.skipped,
            stats.failed
        );
        Ok(stats)
    }

    /// Finds stored links whose target is not a stored note.
    pub fn validate_links(&mut self) -> ExchangeResult<BrokenLinks> {
        let notes = self.repo.list(&NoteListQuery::default())?;
        let known: BTreeSet<&str> = notes.iter().map(|note| note.id.as_str()).collect();

        let mut broken = BrokenLinks::new();
        self.progress.started(Stage::ValidateLinks, notes.len());
        for note in &notes {
            let dangling = note
                .links
                .iter()
                .filter(|link| !known.contains(link.target_id.as_str()))
                .map(|link| link.target_id.clone())
                .collect::<Vec<_>>();
            let outcome = if dangling.is_empty() {
                ItemOutcome::Checked
            } else {
                broken.insert(note.id.clone(), dangling);
                ItemOutcome::Failed
            };
            self.progress.item(Stage::ValidateLinks, &note.id, outcome);
        }
        self.progress.finished(Stage::ValidateLinks);

        if broken.is_empty() {
            info!("event=validate_links module=exchange status=ok broken_notes=0");
        } else {
            warn!(
                "event=validate_links module=exchange status=warn broken_notes={}",
                broken.len()
            );
        }
        Ok(broken)
    }

    /// Creates the note, or updates/skips it when the id is already stored.
    pub(crate) fn store(
        &mut self,
        note: Note,
        update_existing: bool,
    ) -> ExchangeResult<ItemOutcome> {
        if self.repo.read(&note.id)?.is_none() {
            self.repo.create(&note)?;
            info!("event=note_import module=exchange status=ok id={}", note.id);
            return Ok(ItemOutcome::Imported);
        }
        if update_existing {
            self.repo.update(&note)?;
            info!("event=note_import module=exchange status=updated id={}", note.id);
            Ok(ItemOutcome::Updated)
        } else {
            info!("event=note_import module=exchange status=skipped id={}", note.id);
            Ok(ItemOutcome::Skipped)
        }
    }
}
