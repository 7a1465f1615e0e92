//! Multi-directory merge with conflict resolution.
//!
//! # Responsibility
//! - Group note versions from several export directories by id.
//! - Pick one version per id and create-or-update it in the repository.
//!
//! # Invariants
//! - Candidates are visited in directory-list order, then file-name order.
//! - A strategy replaces the current pick only on a strictly better
//!   candidate, so ties resolve to the earliest-visited version.

use crate::exchange::error::ExchangeResult;
use crate::exchange::importer::Importer;
use crate::exchange::markdown_files;
use crate::exchange::progress::{ItemOutcome, ProgressExt, Stage};
use crate::model::note::{Note, NoteId};
use crate::repo::NoteRepository;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Rule for choosing among conflicting versions of one note id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Latest `updated_at` wins.
    #[default]
    Newest,
    /// Earliest `updated_at` wins.
    Oldest,
    /// Longest content wins.
    Largest,
    /// First visited version wins.
    First,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Largest => "largest",
            Self::First => "first",
        }
    }

    /// Returns the index of the selected version. `versions` must not be empty.
    pub fn select(self, versions: &[Note]) -> usize {
        let mut best = 0;
        for (index, candidate) in versions.iter().enumerate().skip(1) {
            let current = &versions[best];
            let better = match self {
                Self::Newest => candidate.updated_at > current.updated_at,
                Self::Oldest => candidate.updated_at < current.updated_at,
                Self::Largest => {
                    candidate.content.chars().count() > current.content.chars().count()
                }
                Self::First => false,
            };
            if better {
                best = index;
            }
        }
        best
    }
}

impl Display for MergeStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "largest" => Ok(Self::Largest),
            "first" => Ok(Self::First),
            other => Err(format!(
                "unsupported merge strategy `{other}`; expected newest|oldest|largest|first"
            )),
        }
    }
}

/// Counters of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_files: u64,
    pub unique_notes: u64,
    pub conflicts: u64,
    pub imported: u64,
    pub failed: u64,
    /// Skipped directories and unparsable files.
    pub warnings: Vec<String>,
}

/// Note versions grouped by id, in first-seen order.
#[derive(Debug, Default)]
struct VersionTable {
    order: Vec<NoteId>,
    versions: BTreeMap<NoteId, Vec<Note>>,
}

impl VersionTable {
    fn push(&mut self, note: Note) {
        let entry = self.versions.entry(note.id.clone()).or_default();
        if entry.is_empty() {
            self.order.push(note.id.clone());
        }
        entry.push(note);
    }

    fn resolve(mut self, strategy: MergeStrategy) -> (Vec<Note>, u64) {
        let mut selected = Vec::with_capacity(self.order.len());
        let mut conflicts = 0;
        for id in &self.order {
            let Some(mut versions) = self.versions.remove(id) else {
                continue;
            };
            if versions.len() > 1 {
                conflicts += 1;
            }
            let index = strategy.select(&versions);
            selected.push(versions.swap_remove(index));
        }
        (selected, conflicts)
    }
}

impl<'a, R: NoteRepository + ?Sized> Importer<'a, R> {
    /// Merges the notes of several export directories into the repository.
    pub fn merge(
        &mut self,
        dirs: &[PathBuf],
        strategy: MergeStrategy,
    ) -> ExchangeResult<MergeStats> {
        let mut stats = MergeStats::default();
        let mut table = VersionTable::default();

        for dir in dirs {
            self.collect_versions(dir, &mut table, &mut stats)?;
        }
        stats.unique_notes = table.order.len() as u64;

        let (selected, conflicts) = table.resolve(strategy);
        stats.conflicts = conflicts;
        info!(
            "event=merge_resolve module=exchange status=ok strategy={} unique={} conflicts={}",
            strategy, stats.unique_notes, stats.conflicts
        );

        self.progress.started(Stage::Merge, selected.len());
        for note in selected {
            let id = note.id.clone();
            let outcome = match self.store(note, true) {
                Ok(outcome) => {
                    stats.imported += 1;
                    outcome
                }
                Err(err) => {
                    error!("event=merge_store module=exchange status=error id={id} error={err}");
                    stats.failed += 1;
                    stats.warnings.push(format!("Failed to import {id}: {err}"));
                    ItemOutcome::Failed
                }
            };
            self.progress.item(Stage::Merge, &id, outcome);
        }
        self.progress.finished(Stage::Merge);

        info!(
            "event=merge module=exchange status=ok files={} imported={} failed={}",
            stats.total_files, stats.imported, stats.failed
        );
        Ok(stats)
    }

    fn collect_versions(
        &mut self,
        dir: &Path,
        table: &mut VersionTable,
        stats: &mut MergeStats,
    ) -> ExchangeResult<()> {
        if !dir.is_dir() {
            warn!(
                "event=merge_scan module=exchange status=skipped dir={}",
                dir.display()
            );
            stats
                .warnings
                .push(format!("Skipping non-existent directory: {}", dir.display()));
            return Ok(());
        }

        let files = markdown_files(dir)?;
        stats.total_files += files.len() as u64;
        for path in &files {
            match self.parse_file(path) {
                Ok(decoded) => {
                    stats.warnings.extend(decoded.warnings);
                    table.push(decoded.note);
                }
                Err(warning) => stats.warnings.push(warning),
            }
        }
        Ok(())
    }
}
