//! One-shot migration of a markdown note directory into the repository.
//!
//! # Responsibility
//! - Decode every note file leniently and create it in the store.
//! - Stamp migration bookkeeping metadata and keep a per-run report.
//! - Optionally snapshot the source directory and database beforehand.
//!
//! # Invariants
//! - `migrated_from` / `migration_date` are stored but never exported.
//! - One failed file never stops the run.

use crate::codec::{self, DecodeOptions};
use crate::exchange::error::io_error;
use crate::exchange::progress::{ItemOutcome, NoProgress, ProgressExt, ProgressObserver, Stage};
use crate::exchange::{markdown_files, ExchangeError, ExchangeResult};
use crate::migration::verifier::verify_migration;
use crate::model::note::NoteId;
use crate::model::timestamp;
use crate::repo::{NoteRepository, StoreMaintenance};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedNote {
    pub id: NoteId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

/// Statistics and findings of one migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub total_files: u64,
    pub successful: u64,
    pub failed: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<FileError>,
    pub notes_migrated: Vec<MigratedNote>,
    /// Issues reported by the verification pass, when it ran.
    pub verification_issues: Option<Vec<String>>,
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self {
            started_at: timestamp::now(),
            total_files: 0,
            successful: 0,
            failed: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            notes_migrated: Vec::new(),
            verification_issues: None,
        }
    }
}

impl MigrationReport {
    /// Percentage of files migrated, `0.0` for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_files as f64 * 100.0
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Run is successful when no file failed to migrate.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn to_json(&self) -> Value {
        json!({
            "migration_date": timestamp::format_iso(self.started_at),
            "duration_seconds": self.duration_seconds(),
            "statistics": {
                "total_files": self.total_files,
                "successful": self.successful,
                "failed": self.failed,
                "success_rate": self.success_rate(),
            },
            "notes_migrated": self.notes_migrated,
            "warnings": self.warnings,
            "errors": self.errors,
            "verification_issues": self.verification_issues,
        })
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> ExchangeResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, text).map_err(io_error(path))
    }

    fn add_error(&mut self, file: &Path, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(FileError {
            file: file.display().to_string(),
            error: message.into(),
        });
    }
}

/// Migrates a markdown note directory into a repository.
pub struct Migrator<'a, R: NoteRepository + StoreMaintenance + ?Sized> {
    source_dir: PathBuf,
    backup_dir: Option<PathBuf>,
    repo: &'a mut R,
    progress: Box<dyn ProgressObserver + 'a>,
}

impl<'a, R: NoteRepository + StoreMaintenance + ?Sized> Migrator<'a, R> {
    pub fn new(source_dir: impl Into<PathBuf>, repo: &'a mut R) -> Self {
        Self {
            source_dir: source_dir.into(),
            backup_dir: None,
            repo,
            progress: Box::new(NoProgress),
        }
    }

    /// Enables a pre-migration snapshot under `backup_dir`.
    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(backup_dir.into());
        self
    }

    pub fn with_progress(mut self, observer: impl ProgressObserver + 'a) -> Self {
        self.progress = Box::new(observer);
        self
    }

    /// Copies the source files and the current database into a timestamped
    /// backup location. Returns the notes snapshot directory.
    pub fn create_backup(&self, backup_dir: &Path) -> ExchangeResult<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let snapshot = backup_dir.join(format!("notes_backup_{stamp}"));
        std::fs::create_dir_all(&snapshot).map_err(io_error(&snapshot))?;

        for entry in std::fs::read_dir(&self.source_dir).map_err(io_error(&self.source_dir))? {
            let path = entry.map_err(io_error(&self.source_dir))?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name() {
                let target = snapshot.join(name);
                std::fs::copy(&path, &target).map_err(io_error(&target))?;
            }
        }

        self.repo
            .backup(&backup_dir.join(format!("database_backup_{stamp}.db")))?;
        info!(
            "event=migration_backup module=migration status=ok path={}",
            snapshot.display()
        );
        Ok(snapshot)
    }

    /// Migrates one file. Returns `true` when the note was created.
    pub fn migrate_file(&mut self, path: &Path, report: &mut MigrationReport) -> bool {
        let decoded = match codec::decode_file(path, &DecodeOptions::default()) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(
                    "event=file_migrate module=migration status=error path={} error={}",
                    path.display(),
                    err
                );
                report.add_error(path, format!("Failed to parse note: {err}"));
                return false;
            }
        };
        report.warnings.extend(decoded.warnings);

        let mut note = decoded.note;
        note.metadata.insert(
            "migrated_from".to_string(),
            Value::String(path.display().to_string()),
        );
        note.metadata.insert(
            "migration_date".to_string(),
            Value::String(timestamp::format_iso(timestamp::now())),
        );

        match self.repo.create(&note) {
            Ok(stored) => {
                report.successful += 1;
                report.notes_migrated.push(MigratedNote {
                    id: stored.id,
                    title: stored.title,
                });
                true
            }
            Err(err) => {
                error!(
                    "event=file_migrate module=migration status=error path={} error={}",
                    path.display(),
                    err
                );
                report.add_error(path, err.to_string());
                false
            }
        }
    }

    /// Runs backup (when configured), migration, optional verification and
    /// store optimization.
    pub fn run(&mut self, verify: bool) -> ExchangeResult<MigrationReport> {
        if !self.source_dir.is_dir() {
            return Err(ExchangeError::MissingDirectory(self.source_dir.clone()));
        }
        let mut report = MigrationReport::default();

        if let Some(backup_dir) = self.backup_dir.clone() {
            self.create_backup(&backup_dir)?;
        }

        let files = markdown_files(&self.source_dir)?;
        report.total_files = files.len() as u64;
        self.progress.started(Stage::Migrate, files.len());
        for path in &files {
            let outcome = if self.migrate_file(path, &mut report) {
                ItemOutcome::Imported
            } else {
                ItemOutcome::Failed
            };
            let label = path.display().to_string();
            self.progress.item(Stage::Migrate, &label, outcome);
        }
        self.progress.finished(Stage::Migrate);

        if verify {
            let verification =
                verify_migration(&self.source_dir, &*self.repo, self.progress.as_mut())?;
            if !verification.is_clean() {
                warn!(
                    "event=migration_verify module=migration status=warn issues={}",
                    verification.issues.len()
                );
                report.warnings.push(format!(
                    "Verification found {} issues",
                    verification.issues.len()
                ));
            }
            report.verification_issues = Some(verification.issues);
        }

        self.repo.optimize()?;
        info!(
            "event=migration module=migration status={} total={} successful={} failed={}",
            if report.is_success() { "ok" } else { "error" },
            report.total_files,
            report.successful,
            report.failed
        );
        Ok(report)
    }
}
