use chrono::{Duration, TimeZone, Utc};
use rusqlite::params;
use std::collections::BTreeSet;
use zettel_core::{
    LinkDirection, LinkKind, Note, NoteKind, NoteListQuery, NoteRepository,
    NoteValidationError, RepoError, SearchQuery, SqliteNoteRepository, StoreMaintenance,
};

fn repo() -> SqliteNoteRepository {
    SqliteNoteRepository::open_in_memory().unwrap()
}

fn note_at(id: &str, title: &str, content: &str, minute: i64) -> Note {
    let mut note = Note::with_id(id, title, content);
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute);
    note.created_at = at;
    note.updated_at = at;
    note
}

fn ids(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.id.as_str()).collect()
}

#[test]
fn create_then_read_returns_equal_note() {
    let mut repo = repo();
    repo.create(&note_at("target", "Target", "t", 0)).unwrap();

    let mut note = note_at("n1", "First", "Body text", 1);
    note.kind = NoteKind::Literature;
    note.add_tag("rust");
    note.add_tag("notes");
    note.add_link("target", LinkKind::Extends, Some("builds on"));
    note.metadata
        .insert("source".to_string(), serde_json::json!({"page": 12}));

    let created = repo.create(&note).unwrap();
    let read = repo.read("n1").unwrap().unwrap();
    assert_eq!(created, read);
    assert_eq!(read, note);
}

#[test]
fn read_missing_note_is_none() {
    assert!(repo().read("nope").unwrap().is_none());
}

#[test]
fn create_duplicate_id_fails_with_already_exists() {
    let mut repo = repo();
    repo.create(&Note::with_id("n1", "A", "a")).unwrap();
    let err = repo.create(&Note::with_id("n1", "B", "b")).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(id) if id == "n1"));
}

#[test]
fn create_rejects_invalid_notes() {
    let mut repo = repo();
    let err = repo.create(&Note::with_id("n1", "  ", "a")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(NoteValidationError::EmptyTitle(_))
    ));
    let err = repo.create(&Note::with_id("a/b", "t", "a")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(NoteValidationError::InvalidId(_))
    ));
}

#[test]
fn update_replaces_tag_set_wholesale() {
    let mut repo = repo();
    let mut note = Note::with_id("n1", "Title", "Body");
    note.add_tag("a");
    note.add_tag("b");
    repo.create(&note).unwrap();

    note.remove_tag("a");
    note.remove_tag("b");
    note.add_tag("c");
    note.title = "Renamed".to_string();
    repo.update(&note).unwrap();

    let read = repo.read("n1").unwrap().unwrap();
    assert_eq!(read.tag_names(), vec!["c"]);
    assert_eq!(read.title, "Renamed");
}

#[test]
fn update_missing_note_fails_with_not_found() {
    let err = repo()
        .update(&Note::with_id("ghost", "t", "c"))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "ghost"));
}

#[test]
fn update_keeps_created_at_and_stamps_current_time() {
    let mut repo = repo();
    let mut note = note_at("n1", "t", "c", 0);
    note.updated_at = Utc.timestamp_opt(1, 0).unwrap();
    repo.create(&note).unwrap();

    let original_created = note.created_at;
    note.created_at = note.created_at + Duration::days(10);
    let before = Utc::now() - Duration::seconds(1);
    let stored = repo.update(&note).unwrap();
    let after = Utc::now() + Duration::seconds(1);

    assert_eq!(stored.created_at, original_created);
    assert!(stored.updated_at > before && stored.updated_at < after);
    assert_eq!(repo.read("n1").unwrap().unwrap().updated_at, stored.updated_at);
}

#[test]
fn delete_then_read_is_absent_and_second_delete_fails() {
    let mut repo = repo();
    repo.create(&Note::with_id("n1", "t", "c")).unwrap();

    repo.delete("n1").unwrap();
    assert!(repo.read("n1").unwrap().is_none());
    let err = repo.delete("n1").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn delete_cascades_links_in_both_directions() {
    let mut repo = repo();
    repo.create(&Note::with_id("a", "A", "a")).unwrap();
    let mut b = Note::with_id("b", "B", "b");
    b.add_link("a", LinkKind::Reference, None);
    repo.create(&b).unwrap();
    let mut a = repo.read("a").unwrap().unwrap();
    a.add_link("b", LinkKind::Supports, None);
    repo.update(&a).unwrap();
    assert_eq!(repo.get_statistics().unwrap().total_links, 2);

    repo.delete("a").unwrap();
    assert_eq!(repo.get_statistics().unwrap().total_links, 0);
    assert!(repo.read("b").unwrap().unwrap().links.is_empty());
}

#[test]
fn link_to_missing_target_is_dropped_until_target_exists() {
    let mut repo = repo();
    let mut a = Note::with_id("a", "A", "body");
    a.add_link("b", LinkKind::Extends, None);

    let stored = repo.create(&a).unwrap();
    assert!(stored.links.is_empty());
    assert!(repo.read("a").unwrap().unwrap().links.is_empty());

    repo.create(&Note::with_id("b", "B", "body")).unwrap();
    repo.update(&a).unwrap();
    let links = repo.read("a").unwrap().unwrap().links;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target_id, "b");
    assert_eq!(links[0].kind, LinkKind::Extends);
}

#[test]
fn update_replaces_outgoing_links() {
    let mut repo = repo();
    for id in ["b", "c"] {
        repo.create(&Note::with_id(id, id, "x")).unwrap();
    }
    let mut a = Note::with_id("a", "A", "x");
    a.add_link("b", LinkKind::Reference, None);
    repo.create(&a).unwrap();

    a.remove_link("b", None);
    a.add_link("c", LinkKind::Questions, Some("why?"));
    repo.update(&a).unwrap();

    let links = repo.read("a").unwrap().unwrap().links;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target_id, "c");
    assert_eq!(links[0].description.as_deref(), Some("why?"));
}

#[test]
fn find_linked_notes_follows_direction() {
    let mut repo = repo();
    for id in ["x", "y"] {
        repo.create(&Note::with_id(id, id, "")).unwrap();
    }
    let mut p = Note::with_id("p", "P", "");
    p.add_link("x", LinkKind::Reference, None);
    p.add_link("x", LinkKind::Supports, None);
    repo.create(&p).unwrap();
    let mut q = Note::with_id("q", "Q", "");
    q.add_link("x", LinkKind::Reference, None);
    repo.create(&q).unwrap();
    let mut x = repo.read("x").unwrap().unwrap();
    x.add_link("y", LinkKind::Refines, None);
    repo.update(&x).unwrap();

    let incoming: BTreeSet<String> = repo
        .find_linked_notes("x", LinkDirection::Incoming)
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(incoming, BTreeSet::from(["p".to_string(), "q".to_string()]));

    let outgoing = repo.find_linked_notes("x", LinkDirection::Outgoing).unwrap();
    assert_eq!(ids(&outgoing), vec!["y"]);

    let both = repo.find_linked_notes("x", LinkDirection::Both).unwrap();
    assert_eq!(both.len(), 3);
}

#[test]
fn list_orders_by_updated_desc_and_paginates() {
    let mut repo = repo();
    repo.create(&note_at("old", "Old", "", 0)).unwrap();
    repo.create(&note_at("new", "New", "", 20)).unwrap();
    repo.create(&note_at("mid-b", "Mid", "", 10)).unwrap();
    repo.create(&note_at("mid-a", "Mid", "", 10)).unwrap();

    let all = repo.list(&NoteListQuery::default()).unwrap();
    assert_eq!(ids(&all), vec!["new", "mid-a", "mid-b", "old"]);

    let page = repo.list(&NoteListQuery::page(2, 1)).unwrap();
    assert_eq!(ids(&page), vec!["mid-a", "mid-b"]);

    let tail = repo
        .list(&NoteListQuery {
            offset: 3,
            ..NoteListQuery::default()
        })
        .unwrap();
    assert_eq!(ids(&tail), vec!["old"]);
}

#[test]
fn list_filters_by_kind_and_tag() {
    let mut repo = repo();
    let mut hub = note_at("hub", "Hub", "", 0);
    hub.kind = NoteKind::Hub;
    hub.add_tag("index");
    repo.create(&hub).unwrap();
    let mut plain = note_at("plain", "Plain", "", 1);
    plain.add_tag("index");
    repo.create(&plain).unwrap();

    let hubs = repo
        .list(&NoteListQuery {
            kind: Some(NoteKind::Hub),
            ..NoteListQuery::default()
        })
        .unwrap();
    assert_eq!(ids(&hubs), vec!["hub"]);

    let tagged = repo.find_by_tag("index").unwrap();
    assert_eq!(ids(&tagged), vec!["plain", "hub"]);

    let both = repo
        .list(&NoteListQuery {
            kind: Some(NoteKind::Permanent),
            tag: Some("index".to_string()),
            ..NoteListQuery::default()
        })
        .unwrap();
    assert_eq!(ids(&both), vec!["plain"]);
    assert!(repo.find_by_tag("Index").unwrap().is_empty());
}

#[test]
fn search_is_case_insensitive_over_enabled_fields() {
    let mut repo = repo();
    repo.create(&note_at("t", "Rust Ownership", "borrowing", 0))
        .unwrap();
    repo.create(&note_at("c", "Other", "all about RUST", 1))
        .unwrap();
    let mut tagged = note_at("g", "Tagged", "nothing", 2);
    tagged.add_tag("rustacean");
    repo.create(&tagged).unwrap();

    let all = repo.search(&SearchQuery::new("rust")).unwrap();
    assert_eq!(ids(&all), vec!["g", "c", "t"]);

    let titles_only = repo
        .search(&SearchQuery {
            search_content: false,
            search_tags: false,
            ..SearchQuery::new("rust")
        })
        .unwrap();
    assert_eq!(ids(&titles_only), vec!["t"]);

    let nothing_enabled = repo
        .search(&SearchQuery {
            search_title: false,
            search_content: false,
            search_tags: false,
            ..SearchQuery::new("rust")
        })
        .unwrap();
    assert!(nothing_enabled.is_empty());

    let limited = repo
        .search(&SearchQuery {
            limit: Some(1),
            ..SearchQuery::new("rust")
        })
        .unwrap();
    assert_eq!(ids(&limited), vec!["g"]);
}

#[test]
fn search_treats_wildcards_literally() {
    let mut repo = repo();
    repo.create(&Note::with_id("p", "100% done", "")).unwrap();
    repo.create(&Note::with_id("q", "100 done", "")).unwrap();

    let hits = repo.search(&SearchQuery::new("0%")).unwrap();
    assert_eq!(ids(&hits), vec!["p"]);
}

#[test]
fn tags_are_shared_by_name_and_counted() {
    let mut repo = repo();
    for (id, tags) in [("a", vec!["x", "y"]), ("b", vec!["x"]), ("c", vec!["x", "z"])] {
        let mut note = Note::with_id(id, id, "");
        for tag in tags {
            note.add_tag(tag);
        }
        repo.create(&note).unwrap();
    }

    let tags = repo.get_tags().unwrap();
    assert_eq!(tags[0].name, "x");
    assert_eq!(tags[0].count, 3);
    assert_eq!(tags.len(), 3);

    let stored_rows: i64 = repo
        .connection()
        .query_row("SELECT COUNT(*) FROM tags WHERE name = 'x';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(stored_rows, 1);
}

#[test]
fn tags_without_notes_are_pruned_on_update_and_delete() {
    let mut repo = repo();
    let mut a = Note::with_id("a", "A", "");
    a.add_tag("shared");
    a.add_tag("only-a");
    repo.create(&a).unwrap();
    let mut b = Note::with_id("b", "B", "");
    b.add_tag("shared");
    b.add_tag("only-b");
    repo.create(&b).unwrap();

    let stored_tags = |repo: &SqliteNoteRepository| -> Vec<String> {
        let mut stmt = repo
            .connection()
            .prepare("SELECT name FROM tags ORDER BY name;")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|row| row.unwrap())
            .collect();
        names
    };

    a.remove_tag("only-a");
    repo.update(&a).unwrap();
    assert_eq!(stored_tags(&repo), vec!["only-b", "shared"]);

    repo.delete("b").unwrap();
    assert_eq!(stored_tags(&repo), vec!["shared"]);
    assert_eq!(repo.get_statistics().unwrap().total_tags, 1);
}

#[test]
fn statistics_count_notes_tags_links_and_kinds() {
    let mut repo = repo();
    let mut a = Note::with_id("a", "A", "");
    a.kind = NoteKind::Fleeting;
    a.add_tag("one");
    repo.create(&a).unwrap();
    let mut b = Note::with_id("b", "B", "");
    b.add_tag("one");
    b.add_tag("two");
    b.add_link("a", LinkKind::Reference, None);
    repo.create(&b).unwrap();

    let stats = repo.get_statistics().unwrap();
    assert_eq!(stats.total_notes, 2);
    assert_eq!(stats.total_tags, 2);
    assert_eq!(stats.total_links, 1);
    assert_eq!(stats.storage_type, "sqlite");
    assert_eq!(stats.notes_by_type.get("fleeting"), Some(&1));
    assert_eq!(stats.notes_by_type.get("permanent"), Some(&1));
    assert_eq!(repo.count_notes().unwrap(), 2);
}

#[test]
fn corrupted_rows_surface_as_invalid_data() {
    let mut repo = repo();
    repo.create(&Note::with_id("n1", "t", "c")).unwrap();
    repo.connection()
        .execute(
            "UPDATE notes SET note_type = ?1 WHERE id = 'n1';",
            params!["draft"],
        )
        .unwrap();

    let err = repo.read("n1").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("draft")));
}

#[test]
fn backup_restore_and_maintenance_delegate_to_engine() {
    let dir = tempfile::tempdir().unwrap();
    let backup_path = dir.path().join("backups/store.db");

    let mut repo = SqliteNoteRepository::open(dir.path().join("live.db")).unwrap();
    repo.create(&Note::with_id("keep", "Keep", "")).unwrap();
    repo.backup(&backup_path).unwrap();
    repo.create(&Note::with_id("later", "Later", "")).unwrap();

    repo.restore(&backup_path).unwrap();
    assert!(repo.read("keep").unwrap().is_some());
    assert!(repo.read("later").unwrap().is_none());

    repo.optimize().unwrap();
    assert!(repo.verify_integrity().unwrap());

    let err = repo.restore(&dir.path().join("missing.db")).unwrap_err();
    assert!(matches!(err, RepoError::BackupMissing(_)));
}
