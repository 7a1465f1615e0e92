use chrono::{TimeZone, Utc};
use zettel_core::codec::{decode, encode, DecodeError, DecodeOptions, Origin};
use zettel_core::{KindPolicy, Link, LinkKind, Note, NoteKind};

fn sample_note() -> Note {
    let mut note = Note::with_id("20240301T090000000000001", "Atomic notes", "One idea per note.");
    note.kind = NoteKind::Structure;
    note.add_tag("method");
    note.add_tag("zettelkasten");
    note.add_link("20240101T000000000000001", LinkKind::Extends, Some("older idea"));
    note.add_link("20240101T000000000000002", LinkKind::ContradictedBy, None);
    note.metadata
        .insert("source".to_string(), serde_json::json!("Ahrens"));
    note.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    note.updated_at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap();
    note
}

#[test]
fn decode_of_encode_preserves_identity_fields_and_links() {
    let note = sample_note();
    let text = encode(&note).unwrap();
    let decoded = decode(&text, &Origin::named("sample"), &DecodeOptions::default()).unwrap();

    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    let back = decoded.note;
    assert_eq!(back.id, note.id);
    assert_eq!(back.title, note.title);
    assert_eq!(back.content, note.content);
    assert_eq!(back.kind, note.kind);
    assert_eq!(back.tags, note.tags);
    assert_eq!(back.created_at, note.created_at);
    assert_eq!(back.updated_at, note.updated_at);
    assert_eq!(back.metadata, note.metadata);
    assert_eq!(back.links.len(), note.links.len());
    for (left, right) in back.links.iter().zip(&note.links) {
        assert!(left.same_edge(right), "{left:?} != {right:?}");
    }
}

#[test]
fn encode_is_stable_across_a_decode_cycle() {
    let first = encode(&sample_note()).unwrap();
    let decoded = decode(&first, &Origin::named("x"), &DecodeOptions::default()).unwrap();
    let second = encode(&decoded.note).unwrap();
    assert_eq!(first, second);
}

#[test]
fn existing_links_heading_is_not_appended_twice() {
    let mut note = sample_note();
    note.content = "Body\n\n## Links\n- reference [[manual]]".to_string();
    let text = encode(&note).unwrap();
    assert_eq!(text.matches("## Links").count(), 1);
    assert!(!text.contains("[[20240101T000000000000001]]"));
}

#[test]
fn migration_bookkeeping_keys_are_not_encoded() {
    let mut note = sample_note();
    note.metadata
        .insert("migrated_from".to_string(), serde_json::json!("/old/a.md"));
    note.metadata
        .insert("migration_date".to_string(), serde_json::json!("2024-01-01"));
    let text = encode(&note).unwrap();
    assert!(!text.contains("migrated_from"));
    assert!(!text.contains("migration_date"));
    assert!(text.contains("source: Ahrens"));
}

#[test]
fn decode_derives_missing_fields_with_warnings() {
    let text = "---\ntype: draft\ntags:\n  - a\n  - ' b '\n  - a\n---\n# Derived Title\n\nBody\n";
    let modified = Utc.with_ymd_and_hms(2023, 5, 6, 7, 8, 9).unwrap();
    let origin = Origin {
        label: "notes/fallback.md".to_string(),
        id_hint: Some("fallback".to_string()),
        modified_at: Some(modified),
    };

    let decoded = decode(text, &origin, &DecodeOptions::default()).unwrap();
    let note = decoded.note;
    assert_eq!(note.id, "fallback");
    assert_eq!(note.title, "Derived Title");
    assert_eq!(note.kind, NoteKind::Permanent);
    assert_eq!(note.tag_names(), vec!["a", "b"]);
    assert_eq!(note.created_at, modified);
    assert_eq!(note.updated_at, modified);
    assert_eq!(decoded.warnings.len(), 3);
    assert!(decoded.warnings.iter().any(|w| w.contains("No ID")));
    assert!(decoded.warnings.iter().any(|w| w.contains("draft")));
}

#[test]
fn decode_synthesizes_title_without_heading() {
    let text = "---\nid: n9\n---\nplain body\n";
    let decoded = decode(text, &Origin::named("n9.md"), &DecodeOptions::require_id()).unwrap();
    assert_eq!(decoded.note.title, "Untitled Note n9");
    assert_eq!(decoded.note.content, "plain body");
    assert_eq!(decoded.warnings.len(), 1);
}

#[test]
fn require_id_rejects_missing_id() {
    let text = "---\ntitle: Orphan\n---\nbody\n";
    let origin = Origin {
        id_hint: Some("orphan".to_string()),
        ..Origin::named("orphan.md")
    };
    let err = decode(text, &origin, &DecodeOptions::require_id()).unwrap_err();
    assert!(matches!(err, DecodeError::MissingId));
    assert!(err.to_string().contains("No ID"));
}

#[test]
fn strict_kind_policy_rejects_unknown_note_type() {
    let text = "---\nid: n1\ntitle: T\ntype: draft\n---\n";
    let options = DecodeOptions {
        kind_policy: KindPolicy::Strict,
        ..DecodeOptions::default()
    };
    let err = decode(text, &Origin::named("n1.md"), &options).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidKind { value, .. } if value == "draft"));
}

#[test]
fn malformed_header_is_a_decode_error() {
    let text = "---\nid: [unclosed\n---\nbody\n";
    let err = decode(text, &Origin::named("bad.md"), &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, DecodeError::Header(_)));
}

#[test]
fn decoded_content_excludes_links_section() {
    let text = "---\nid: a\ntitle: A\n---\nIntro\n\n## Links\n- supports [[b]] because\n- mystery [[c]]\n";
    let decoded = decode(text, &Origin::named("a.md"), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.note.content, "Intro");
    let kinds = decoded
        .note
        .links
        .iter()
        .map(|link| (link.target_id.as_str(), link.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![("b", LinkKind::Supports), ("c", LinkKind::Reference)]
    );
}

fn round_trip(note: &Note) -> Note {
    let text = encode(note).unwrap();
    decode(&text, &Origin::named("round-trip"), &DecodeOptions::default())
        .unwrap()
        .note
}

#[test]
fn multi_line_link_description_stays_on_one_bullet() {
    let mut note = Note::with_id("n1", "Title", "Body");
    note.add_link(
        "n2",
        LinkKind::Extends,
        Some("line one\n- reference [[evil]] x"),
    );
    assert_eq!(
        note.links[0].description.as_deref(),
        Some("line one - reference [[evil]] x")
    );

    let back = round_trip(&note);
    assert_eq!(back.links.len(), 1);
    assert!(back.links[0].same_edge(&note.links[0]), "{:?}", back.links);
}

#[test]
fn raw_link_description_is_flattened_when_rendered() {
    let mut note = Note::with_id("n1", "Title", "Body");
    let mut link = Link::new("n1", "n2", LinkKind::Refines);
    link.description = Some("first\r\n\t- supports [[n3]]".to_string());
    note.links.push(link);

    let back = round_trip(&note);
    let links = back
        .links
        .iter()
        .map(|link| (link.target_id.as_str(), link.description.as_deref()))
        .collect::<Vec<_>>();
    assert_eq!(links, vec![("n2", Some("first - supports [[n3]]"))]);
}

#[test]
fn tag_names_with_commas_survive_encoding() {
    let mut note = Note::with_id("n1", "Title", "Body");
    note.add_tag("a,b");
    note.add_tag("c");

    let text = encode(&note).unwrap();
    assert!(!text.contains("tags: a,b, c"), "{text}");
    let back = round_trip(&note);
    assert_eq!(back.tags, note.tags);
    assert_eq!(back.tag_names(), vec!["a,b", "c"]);
}

#[test]
fn heading_that_only_starts_with_links_is_kept_as_content() {
    let mut note = Note::with_id("n1", "Title", "para\n\n## Linksheet\nrow");
    note.add_link("n2", LinkKind::Reference, None);

    let text = encode(&note).unwrap();
    assert!(text.contains("\n## Links\n- reference [[n2]]"), "{text}");
    let back = round_trip(&note);
    assert_eq!(back.content, "para\n\n## Linksheet\nrow");
    assert_eq!(back.links.len(), 1);
}

#[test]
fn links_heading_with_trailing_text_still_opens_section() {
    let text = "---\nid: n1\ntitle: T\n---\nBody\n\n## Links (outgoing)\n- supports [[n2]]\n";
    let decoded = decode(text, &Origin::named("n1"), &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.note.content, "Body");
    assert_eq!(decoded.note.links.len(), 1);
    assert_eq!(decoded.note.links[0].kind, LinkKind::Supports);
}
