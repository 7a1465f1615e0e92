//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes with their tag sets and outgoing links.
//! - Answer list/search/graph/aggregate queries in domain vocabulary.
//!
//! # Invariants
//! - `create` fails with `AlreadyExists`, `update`/`delete` with `NotFound`.
//! - `update` replaces the tag set and the outgoing link set wholesale.
//! - A link is written only when its target id exists at write time.
//! - Listings are ordered by `updated_at DESC, id ASC`.
//! - Tags are deduplicated store-wide by exact name.

use crate::db::{self, maintenance};
use crate::model::kind::{Enumerated, LinkKind, NoteKind};
use crate::model::link::Link;
use crate::model::note::{Metadata, Note, Tag};
use crate::model::timestamp;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{
    LinkDirection, NoteListQuery, RepositoryStatistics, SearchQuery, TagUsage,
};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    note_type,
    created_at,
    updated_at,
    metadata
FROM notes";

const ORDER_BY_RECENT: &str = " ORDER BY updated_at DESC, id ASC";

/// Repository interface for note CRUD and query operations.
pub trait NoteRepository {
    /// Persists a new note and returns the stored version.
    fn create(&mut self, note: &Note) -> RepoResult<Note>;
    /// Loads one note; `None` when absent.
    fn read(&self, id: &str) -> RepoResult<Option<Note>>;
    /// Fully replaces an existing note and returns the stored version.
    /// `updated_at` is stamped with the current time; `created_at` is kept.
    fn update(&mut self, note: &Note) -> RepoResult<Note>;
    fn delete(&mut self, id: &str) -> RepoResult<()>;
    fn list(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    fn search(&self, query: &SearchQuery) -> RepoResult<Vec<Note>>;
    fn find_by_tag(&self, name: &str) -> RepoResult<Vec<Note>>;
    /// Distinct neighbor notes of `id` in the given direction.
    fn find_linked_notes(&self, id: &str, direction: LinkDirection) -> RepoResult<Vec<Note>>;
    /// Tag usage counts, most used first.
    fn get_tags(&self) -> RepoResult<Vec<TagUsage>>;
    fn get_statistics(&self) -> RepoResult<RepositoryStatistics>;
    fn count_notes(&self) -> RepoResult<u64>;
}

/// Engine maintenance surface, delegated to the storage engine.
pub trait StoreMaintenance {
    fn backup(&self, path: &Path) -> RepoResult<()>;
    fn restore(&mut self, path: &Path) -> RepoResult<()>;
    /// Reclaims space and refreshes query statistics.
    fn optimize(&self) -> RepoResult<()>;
    fn verify_integrity(&self) -> RepoResult<bool>;
}

/// SQLite-backed note repository owning its connection.
pub struct SqliteNoteRepository {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteNoteRepository {
    /// Opens (or creates) a database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = db::open_db(path)?;
        info!(
            "event=repo_open module=repo status=ok path={}",
            path.display()
        );
        Ok(Self {
            conn,
            db_path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self {
            conn: db::open_db_in_memory()?,
            db_path: None,
        })
    }

    /// Wraps a migrated connection after checking the required tables.
    pub fn from_connection(conn: Connection) -> RepoResult<Self> {
        for table in ["notes", "tags", "note_tags", "links"] {
            if !table_exists(&conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self {
            conn,
            db_path: None,
        })
    }

    /// Raw connection for maintenance tooling and diagnostics.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn query_notes(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(&self.conn, row)?);
        }
        Ok(notes)
    }

    fn count(&self, sql: &str) -> RepoResult<u64> {
        let value: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(u64::try_from(value).unwrap_or_default())
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn create(&mut self, note: &Note) -> RepoResult<Note> {
        note.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if note_exists_in_tx(&tx, &note.id)? {
            return Err(RepoError::AlreadyExists(note.id.clone()));
        }

        tx.execute(
            "INSERT INTO notes (
                id,
                title,
                content,
                note_type,
                created_at,
                updated_at,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                note.kind.as_str(),
                timestamp::to_millis(note.created_at),
                timestamp::to_millis(note.updated_at),
                encode_metadata(&note.metadata)?,
            ],
        )?;
        replace_tags_in_tx(&tx, &note.id, &note.tags)?;
        let written = replace_links_in_tx(&tx, &note.id, &note.links)?;
        tx.commit()?;

        info!(
            "event=note_create module=repo status=ok id={} tags={} links_written={} links_dropped={}",
            note.id,
            note.tags.len(),
            written,
            note.links.len() - written
        );
        self.read(&note.id)?
            .ok_or_else(|| RepoError::InvalidData(format!("created note `{}` not readable", note.id)))
    }

    fn read(&self, id: &str) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(&self.conn, row)?));
        }
        Ok(None)
    }

    fn update(&mut self, note: &Note) -> RepoResult<Note> {
        note.validate()?;
        let updated_at = timestamp::now();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                note_type = ?4,
                updated_at = ?5,
                metadata = ?6
             WHERE id = ?1;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                note.kind.as_str(),
                timestamp::to_millis(updated_at),
                encode_metadata(&note.metadata)?,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(note.id.clone()));
        }

        replace_tags_in_tx(&tx, &note.id, &note.tags)?;
        prune_unused_tags_in_tx(&tx)?;
        let written = replace_links_in_tx(&tx, &note.id, &note.links)?;
        tx.commit()?;

        info!(
            "event=note_update module=repo status=ok id={} tags={} links_written={} links_dropped={}",
            note.id,
            note.tags.len(),
            written,
            note.links.len() - written
        );
        self.read(&note.id)?
            .ok_or_else(|| RepoError::InvalidData(format!("updated note `{}` not readable", note.id)))
    }

    fn delete(&mut self, id: &str) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        prune_unused_tags_in_tx(&tx)?;
        tx.commit()?;
        info!("event=note_delete module=repo status=ok id={id}");
        Ok(())
    }

    fn list(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" AND note_type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM note_tags nt
                    INNER JOIN tags t ON t.id = nt.tag_id
                    WHERE nt.note_id = notes.id
                      AND t.name = ?
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }

        sql.push_str(ORDER_BY_RECENT);
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);
        self.query_notes(&sql, bind_values)
    }

    fn search(&self, query: &SearchQuery) -> RepoResult<Vec<Note>> {
        if !query.has_fields() || query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(&query.text));
        let mut conditions = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if query.search_title {
            conditions.push("title LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(pattern.clone()));
        }
        if query.search_content {
            conditions.push("content LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(pattern.clone()));
        }
        if query.search_tags {
            conditions.push(
                "EXISTS (
                    SELECT 1
                    FROM note_tags nt
                    INNER JOIN tags t ON t.id = nt.tag_id
                    WHERE nt.note_id = notes.id
                      AND t.name LIKE ? ESCAPE '\\'
                )",
            );
            bind_values.push(Value::Text(pattern));
        }

        let mut sql = format!("{NOTE_SELECT_SQL} WHERE ({})", conditions.join(" OR "));
        sql.push_str(ORDER_BY_RECENT);
        push_pagination(&mut sql, &mut bind_values, query.limit, 0);
        self.query_notes(&sql, bind_values)
    }

    fn find_by_tag(&self, name: &str) -> RepoResult<Vec<Note>> {
        self.list(&NoteListQuery {
            tag: Some(name.to_string()),
            ..NoteListQuery::default()
        })
    }

    fn find_linked_notes(&self, id: &str, direction: LinkDirection) -> RepoResult<Vec<Note>> {
        let mut conditions = Vec::new();
        if direction.includes_outgoing() {
            conditions.push("id IN (SELECT target_id FROM links WHERE source_id = ?1)");
        }
        if direction.includes_incoming() {
            conditions.push("id IN (SELECT source_id FROM links WHERE target_id = ?1)");
        }

        let sql = format!(
            "{NOTE_SELECT_SQL} WHERE {}{ORDER_BY_RECENT}",
            conditions.join(" OR ")
        );
        self.query_notes(&sql, vec![Value::Text(id.to_string())])
    }

    fn get_tags(&self) -> RepoResult<Vec<TagUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name AS name, COUNT(nt.note_id) AS usage
             FROM tags t
             INNER JOIN note_tags nt ON nt.tag_id = t.id
             GROUP BY t.id
             ORDER BY usage DESC, t.name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            let count: i64 = row.get("usage")?;
            tags.push(TagUsage {
                name: row.get("name")?,
                count: u64::try_from(count).unwrap_or_default(),
            });
        }
        Ok(tags)
    }

    fn get_statistics(&self) -> RepoResult<RepositoryStatistics> {
        let mut stats = RepositoryStatistics {
            total_notes: self.count("SELECT COUNT(*) FROM notes;")?,
            total_tags: self.count("SELECT COUNT(DISTINCT tag_id) FROM note_tags;")?,
            total_links: self.count("SELECT COUNT(*) FROM links;")?,
            storage_type: "sqlite".to_string(),
            ..RepositoryStatistics::default()
        };

        let mut stmt = self.conn.prepare(
            "SELECT note_type, COUNT(*) FROM notes GROUP BY note_type ORDER BY note_type;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            stats
                .notes_by_type
                .insert(kind, u64::try_from(count).unwrap_or_default());
        }
        Ok(stats)
    }

    fn count_notes(&self) -> RepoResult<u64> {
        self.count("SELECT COUNT(*) FROM notes;")
    }
}

impl StoreMaintenance for SqliteNoteRepository {
    fn backup(&self, path: &Path) -> RepoResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        maintenance::backup_to(&self.conn, path)?;
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> RepoResult<()> {
        if !path.exists() {
            return Err(RepoError::BackupMissing(path.to_path_buf()));
        }
        maintenance::restore_from(&mut self.conn, path)?;
        Ok(())
    }

    fn optimize(&self) -> RepoResult<()> {
        maintenance::optimize(&self.conn)?;
        Ok(())
    }

    fn verify_integrity(&self) -> RepoResult<bool> {
        Ok(maintenance::integrity_ok(&self.conn)?)
    }
}

fn push_pagination(sql: &mut String, bind_values: &mut Vec<Value>, limit: Option<u32>, offset: u32) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

/// Escapes `LIKE` wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn encode_metadata(metadata: &Metadata) -> RepoResult<String> {
    serde_json::to_string(metadata)
        .map_err(|err| RepoError::InvalidData(format!("metadata is not serializable: {err}")))
}

fn replace_tags_in_tx(tx: &Transaction<'_>, note_id: &str, tags: &BTreeSet<Tag>) -> RepoResult<()> {
    tx.execute("DELETE FROM note_tags WHERE note_id = ?1;", [note_id])?;
    for tag in tags {
        tx.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
            [tag.name.as_str()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id)
             SELECT ?1, id
             FROM tags
             WHERE name = ?2;",
            params![note_id, tag.name.as_str()],
        )?;
    }
    Ok(())
}

/// Drops tags no note carries any more.
fn prune_unused_tags_in_tx(tx: &Transaction<'_>) -> RepoResult<usize> {
    let pruned = tx.execute(
        "DELETE FROM tags
         WHERE NOT EXISTS (
             SELECT 1 FROM note_tags nt WHERE nt.tag_id = tags.id
         );",
        [],
    )?;
    if pruned > 0 {
        debug!("event=tag_prune module=repo status=ok pruned={pruned}");
    }
    Ok(pruned)
}

/// Replaces outgoing links, returning how many were written.
fn replace_links_in_tx(tx: &Transaction<'_>, note_id: &str, links: &[Link]) -> RepoResult<usize> {
    tx.execute("DELETE FROM links WHERE source_id = ?1;", [note_id])?;
    let mut written = 0;
    for link in links {
        if !note_exists_in_tx(tx, &link.target_id)? {
            debug!(
                "event=link_drop module=repo status=skipped source_id={} target_id={}",
                note_id, link.target_id
            );
            continue;
        }
        tx.execute(
            "INSERT INTO links (
                source_id,
                target_id,
                link_type,
                description,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                note_id,
                link.target_id.as_str(),
                link.kind.as_str(),
                link.description.as_deref(),
                timestamp::to_millis(link.created_at),
            ],
        )?;
        written += 1;
    }
    Ok(written)
}

fn note_exists_in_tx(tx: &Transaction<'_>, id: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_note_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Note> {
    let id: String = row.get("id")?;

    let kind_text: String = row.get("note_type")?;
    let kind = NoteKind::parse(&kind_text).known().ok_or_else(|| {
        RepoError::InvalidData(format!("invalid note type `{kind_text}` in notes.note_type"))
    })?;

    let metadata_text: String = row.get("metadata")?;
    let metadata: Metadata = serde_json::from_str(&metadata_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid metadata for note `{id}`: {err}"))
    })?;

    Ok(Note {
        title: row.get("title")?,
        content: row.get("content")?,
        kind,
        tags: load_tags(conn, &id)?,
        links: load_links(conn, &id)?,
        created_at: parse_millis(row.get("created_at")?, "notes.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "notes.updated_at")?,
        metadata,
        id,
    })
}

fn parse_millis(value: i64, column: &str) -> RepoResult<chrono::DateTime<chrono::Utc>> {
    timestamp::from_millis(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

fn load_tags(conn: &Connection, note_id: &str) -> RepoResult<BTreeSet<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id = ?1;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut tags = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        tags.insert(Tag { name });
    }
    Ok(tags)
}

fn load_links(conn: &Connection, note_id: &str) -> RepoResult<Vec<Link>> {
    let mut stmt = conn.prepare(
        "SELECT target_id, link_type, description, created_at
         FROM links
         WHERE source_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get("link_type")?;
        let kind = LinkKind::parse(&kind_text).known().ok_or_else(|| {
            RepoError::InvalidData(format!("invalid link type `{kind_text}` in links.link_type"))
        })?;
        links.push(Link {
            source_id: note_id.to_string(),
            target_id: row.get("target_id")?,
            kind,
            description: row.get("description")?,
            created_at: parse_millis(row.get("created_at")?, "links.created_at")?,
        });
    }
    Ok(links)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_protects_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
