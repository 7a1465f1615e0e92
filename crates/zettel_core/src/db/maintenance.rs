//! Engine-level maintenance primitives.
//!
//! These delegate to SQLite itself (online backup API, `VACUUM`, `ANALYZE`,
//! `PRAGMA integrity_check`); nothing here inspects application rows.

use super::{bootstrap_connection, DbResult};
use log::{error, info};
use rusqlite::{Connection, DatabaseName};
use std::path::Path;

/// Copies the live main database to `target` using the online backup API.
pub fn backup_to(conn: &Connection, target: &Path) -> DbResult<()> {
    conn.backup(DatabaseName::Main, target, None)?;
    info!(
        "event=db_backup module=db status=ok target={}",
        target.display()
    );
    Ok(())
}

/// Replaces the live main database with the content of `source`, then
/// re-applies pragmas and pending migrations.
pub fn restore_from(conn: &mut Connection, source: &Path) -> DbResult<()> {
    conn.restore(
        DatabaseName::Main,
        source,
        None::<fn(rusqlite::backup::Progress)>,
    )?;
    bootstrap_connection(conn)?;
    info!(
        "event=db_restore module=db status=ok source={}",
        source.display()
    );
    Ok(())
}

/// Reclaims free pages and refreshes query planner statistics.
pub fn optimize(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("VACUUM; ANALYZE;")?;
    info!("event=db_optimize module=db status=ok");
    Ok(())
}

/// Runs `PRAGMA integrity_check`; `true` only when SQLite reports `ok`.
pub fn integrity_ok(conn: &Connection) -> DbResult<bool> {
    let result: String = conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;
    let ok = result == "ok";
    if ok {
        info!("event=db_integrity module=db status=ok");
    } else {
        error!("event=db_integrity module=db status=error result={result}");
    }
    Ok(ok)
}
