//! Cross-check a repository against the markdown corpus it came from.
//!
//! # Invariants
//! - Data mismatches are returned as issue strings, never as errors.
//! - Only directory-level I/O failures abort verification.

use crate::codec::{self, DecodeOptions};
use crate::exchange::progress::{ItemOutcome, ProgressExt, ProgressObserver, Stage};
use crate::exchange::{markdown_files, ExchangeResult};
use crate::model::note::Note;
use crate::repo::NoteRepository;
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::Path;

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub issues: Vec<String>,
}

impl Verification {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compares every note file in `source_dir` with its stored counterpart.
pub fn verify_migration<R: NoteRepository + ?Sized>(
    source_dir: &Path,
    repo: &R,
    progress: &mut dyn ProgressObserver,
) -> ExchangeResult<Verification> {
    let files = markdown_files(source_dir)?;
    let mut issues = Vec::new();

    let stored = repo.count_notes()?;
    if files.len() as u64 != stored {
        issues.push(format!(
            "Count mismatch: {} files vs {} in database",
            files.len(),
            stored
        ));
    }

    progress.started(Stage::Verify, files.len());
    for path in &files {
        let label = path.display().to_string();
        let file_note = match codec::decode_file(path, &DecodeOptions::default()) {
            Ok(decoded) => decoded.note,
            Err(err) => {
                warn!("event=verify_parse module=migration status=error path={label} error={err}");
                issues.push(format!("Could not parse {label} for verification"));
                progress.item(Stage::Verify, &label, ItemOutcome::Failed);
                continue;
            }
        };

        let before = issues.len();
        match repo.read(&file_note.id)? {
            Some(db_note) => compare(&file_note, &db_note, &mut issues),
            None => issues.push(format!("Note {} not found in database", file_note.id)),
        }
        let outcome = if issues.len() == before {
            ItemOutcome::Checked
        } else {
            ItemOutcome::Failed
        };
        progress.item(Stage::Verify, &label, outcome);
    }
    progress.finished(Stage::Verify);

    info!(
        "event=verify_migration module=migration status={} files={} issues={}",
        if issues.is_empty() { "ok" } else { "warn" },
        files.len(),
        issues.len()
    );
    Ok(Verification { issues })
}

fn compare(file_note: &Note, db_note: &Note, issues: &mut Vec<String>) {
    let id = &file_note.id;
    if file_note.title != db_note.title {
        issues.push(format!("Title mismatch for {id}"));
    }
    if file_note.content != db_note.content {
        issues.push(format!("Content mismatch for {id}"));
    }
    if file_note.kind != db_note.kind {
        issues.push(format!("Type mismatch for {id}"));
    }
    let file_tags: BTreeSet<&str> = file_note.tag_names().into_iter().collect();
    let db_tags: BTreeSet<&str> = db_note.tag_names().into_iter().collect();
    if file_tags != db_tags {
        issues.push(format!("Tags mismatch for {id}"));
    }
}
