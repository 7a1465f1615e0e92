//! Note store schema history.
//!
//! # Responsibility
//! - `v1` creates `notes`, `tags` and the `note_tags` join table.
//! - `v2` adds typed `links` between notes, cascading on note deletion.
//! - Bring any older store file forward to the newest schema on open.
//!
//! # Invariants
//! - Steps are listed in ascending `version` order and never edited once
//!   released; schema changes append a new step.
//! - `PRAGMA user_version` records the newest applied step.
//! - All pending steps commit in one transaction, so a store is never left
//!   between two versions.
//! - A store newer than this build is refused instead of downgraded.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_HISTORY: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "notes_and_tags",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "links",
        sql: include_str!("0002_links.sql"),
    },
];

/// Schema version written by this build.
pub fn latest_version() -> u32 {
    SCHEMA_HISTORY.last().map_or(0, |step| step.version)
}

/// Upgrades the store behind `conn` to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored = current_user_version(conn)?;
    let latest = latest_version();
    if stored > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_HISTORY
        .iter()
        .filter(|step| step.version > stored)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=schema_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={stored} to_version={latest} steps={}",
        pending.len()
    );
    Ok(())
}

/// Schema version recorded in the store file.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
