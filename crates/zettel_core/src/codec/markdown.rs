//! Note <-> markdown encoding.
//!
//! # Responsibility
//! - Produce the `<id>.md` representation used by export runs.
//! - Rebuild notes from hand-edited or exported files.
//!
//! # Invariants
//! - Header keys `id,title,type,tags,created,updated` are reserved.
//! - Migration bookkeeping keys are never written back out.
//! - Decode substitutions (id, title, kind, timestamps) always add a warning.

use crate::codec::frontmatter::{self, scalar_to_string};
use crate::codec::links::{extract_links, has_links_heading, render_section, strip_section};
use crate::model::kind::{Enumerated, KindPolicy, NoteKind};
use crate::model::note::{Metadata, Note, NoteId, Tag};
use crate::model::timestamp;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const RESERVED_KEYS: [&str; 6] = ["id", "title", "type", "tags", "created", "updated"];
pub const MIGRATION_KEYS: [&str; 2] = ["migrated_from", "migration_date"];

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Failure to turn text into a note.
#[derive(Debug)]
pub enum DecodeError {
    /// Header has no usable `id` and no fallback was allowed.
    MissingId,
    /// Header block is malformed.
    Header(String),
    /// Enumerated value rejected by a strict policy.
    InvalidKind { field: &'static str, value: String },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "No ID in header"),
            Self::Header(message) => write!(f, "{message}"),
            Self::InvalidKind { field, value } => write!(f, "invalid {field} `{value}`"),
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where decoded text came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    /// Human-readable label used in warnings (usually the path).
    pub label: String,
    /// Id fallback, usually the file stem.
    pub id_hint: Option<NoteId>,
    /// Fallback timestamp, usually the file modification time.
    pub modified_at: Option<DateTime<Utc>>,
}

impl Origin {
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Builds an origin from a file path, reading its modification time.
    pub fn from_path(path: &Path) -> Self {
        let modified_at = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(|time| timestamp::truncate_to_millis(DateTime::<Utc>::from(time)));
        Self {
            label: path.display().to_string(),
            id_hint: path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string),
            modified_at,
        }
    }
}

/// Decode behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Use `Origin::id_hint` when the header has no id.
    pub allow_id_fallback: bool,
    /// Use `Origin::modified_at` for missing timestamps instead of "now".
    pub allow_time_fallback: bool,
    pub kind_policy: KindPolicy,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            allow_id_fallback: true,
            allow_time_fallback: true,
            kind_policy: KindPolicy::SubstituteDefault,
        }
    }
}

impl DecodeOptions {
    /// Import-mode options: a header id is mandatory and timestamps never
    /// come from the file system.
    pub fn require_id() -> Self {
        Self {
            allow_id_fallback: false,
            allow_time_fallback: false,
            kind_policy: KindPolicy::SubstituteDefault,
        }
    }
}

/// Decoded note plus validation warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub note: Note,
    pub warnings: Vec<String>,
}

/// Encodes `note` as header block plus markdown body.
///
/// A `## Links` section is appended for outgoing links unless the content
/// already contains such a heading.
pub fn encode(note: &Note) -> Result<String, String> {
    let mut entries: Vec<(String, Value)> = vec![
        ("id".to_string(), Value::String(note.id.clone())),
        ("title".to_string(), Value::String(note.title.clone())),
        (
            "type".to_string(),
            Value::String(note.kind.as_str().to_string()),
        ),
        ("tags".to_string(), encode_tags(note)),
        (
            "created".to_string(),
            Value::String(timestamp::format_iso(note.created_at)),
        ),
        (
            "updated".to_string(),
            Value::String(timestamp::format_iso(note.updated_at)),
        ),
    ];
    for (key, value) in &note.metadata {
        if RESERVED_KEYS.contains(&key.as_str()) || MIGRATION_KEYS.contains(&key.as_str()) {
            continue;
        }
        entries.push((key.clone(), value.clone()));
    }

    let header = frontmatter::emit(&entries)?;
    let body = encode_body(note);
    if body.is_empty() {
        Ok(header)
    } else {
        Ok(format!("{header}\n{body}\n"))
    }
}

fn encode_body(note: &Note) -> String {
    let mut body = note.content.trim().to_string();
    if has_links_heading(&note.content) {
        return body;
    }
    if let Some(section) = render_section(&note.links) {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&section);
    }
    body
}

/// Decodes one note from `text`.
pub fn decode(text: &str, origin: &Origin, options: &DecodeOptions) -> DecodeResult<Decoded> {
    let document = frontmatter::split(text).map_err(DecodeError::Header)?;
    let header = document.header;
    let body = document.body;
    let mut warnings = Vec::new();

    let id = match header.get("id").and_then(non_blank_scalar) {
        Some(id) => id,
        None => match origin.id_hint.as_ref().filter(|_| options.allow_id_fallback) {
            Some(hint) => {
                warnings.push(format!(
                    "No ID in header for {}, using filename: {hint}",
                    origin.label
                ));
                hint.clone()
            }
            None => return Err(DecodeError::MissingId),
        },
    };

    let title = match header.get("title").and_then(non_blank_scalar) {
        Some(title) => title,
        None => match first_heading(body) {
            Some(heading) => {
                warnings.push(format!(
                    "No title in header for {}, using first heading: {heading}",
                    origin.label
                ));
                heading
            }
            None => {
                let synthesized = format!("Untitled Note {id}");
                warnings.push(format!(
                    "No title found for {}, using: {synthesized}",
                    origin.label
                ));
                synthesized
            }
        },
    };

    let kind = match header.get("type").and_then(non_blank_scalar) {
        None => NoteKind::default(),
        Some(raw) => match options.kind_policy.resolve(NoteKind::parse(&raw)) {
            Ok(resolved) => {
                if let Some(warning) = resolved.warning {
                    warnings.push(format!("{warning} ({})", origin.label));
                }
                resolved.value
            }
            Err(value) => {
                return Err(DecodeError::InvalidKind {
                    field: NoteKind::LABEL,
                    value,
                })
            }
        },
    };

    let tags = decode_tags(header.get("tags"));

    let fallback_time = origin
        .modified_at
        .filter(|_| options.allow_time_fallback)
        .unwrap_or_else(timestamp::now);
    let created_at = decode_timestamp(&header, "created", origin, &mut warnings)
        .unwrap_or(fallback_time);
    let updated_at = decode_timestamp(&header, "updated", origin, &mut warnings).unwrap_or(
        if options.allow_time_fallback && origin.modified_at.is_some() {
            fallback_time
        } else {
            created_at
        },
    );

    let metadata: Metadata = header
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let links = extract_links(&id, body, options.kind_policy);
    let content = strip_section(body).trim().to_string();

    Ok(Decoded {
        note: Note {
            id,
            title,
            content,
            kind,
            tags,
            links,
            created_at,
            updated_at,
            metadata,
        },
        warnings,
    })
}

/// Reads and decodes one file.
pub fn decode_file(path: &Path, options: &DecodeOptions) -> DecodeResult<Decoded> {
    let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&text, &Origin::from_path(path), options)
}

fn non_blank_scalar(value: &Value) -> Option<String> {
    scalar_to_string(value).filter(|text| !text.trim().is_empty())
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|heading| heading.trim().to_string())
        .filter(|heading| !heading.is_empty())
}

/// Comma string `a, b` by default; a YAML list once a name holds a comma,
/// since the comma form would split it.
fn encode_tags(note: &Note) -> Value {
    let names = note.tag_names();
    if names.iter().any(|name| name.contains(',')) {
        Value::Array(
            names
                .into_iter()
                .map(|name| Value::String(name.to_string()))
                .collect(),
        )
    } else {
        Value::String(names.join(", "))
    }
}

fn decode_tags(value: Option<&Value>) -> BTreeSet<Tag> {
    match value {
        Some(Value::String(text)) => text.split(',').filter_map(Tag::new).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Array(_) | Value::Object(_) => Some(item.to_string()),
                other => scalar_to_string(other),
            })
            .filter_map(Tag::new)
            .collect(),
        Some(other) => scalar_to_string(other)
            .and_then(Tag::new)
            .into_iter()
            .collect(),
        None => BTreeSet::new(),
    }
}

fn decode_timestamp(
    header: &std::collections::BTreeMap<String, Value>,
    key: &str,
    origin: &Origin,
    warnings: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let value = header.get(key)?;
    if value.is_null() {
        return None;
    }
    let parsed = scalar_to_string(value).and_then(|text| timestamp::parse_iso(&text));
    if parsed.is_none() {
        warnings.push(format!(
            "Invalid {key} timestamp '{}' in {}, using fallback",
            scalar_to_string(value).unwrap_or_else(|| value.to_string()),
            origin.label
        ));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, DecodeError, DecodeOptions, Origin};
    use crate::model::kind::{LinkKind, NoteKind};
    use crate::model::note::{tag_set, Note};
    use crate::model::timestamp;
    use serde_json::json;

    fn sample_note() -> Note {
        let mut note = Note::with_id("n1", "First Note", "Body text\n");
        note.kind = NoteKind::Literature;
        note.tags = tag_set(["test", "import"]);
        note.created_at = timestamp::from_millis(1_704_067_200_000).unwrap();
        note.updated_at = timestamp::from_millis(1_704_110_400_000).unwrap();
        note.add_link("n2", LinkKind::Extends, Some("builds on n2"));
        note.add_link("n3", LinkKind::Reference, None);
        note.updated_at = timestamp::from_millis(1_704_110_400_000).unwrap();
        note.metadata.insert("author".to_string(), json!("Ada"));
        note.metadata
            .insert("migrated_from".to_string(), json!("/old/n1.md"));
        note
    }

    #[test]
    fn encode_writes_header_body_and_links_section() {
        let text = encode(&sample_note()).unwrap();
        assert_eq!(
            text,
            "---\nid: n1\ntitle: First Note\ntype: literature\ntags: import, test\n\
             created: 2024-01-01T00:00:00.000Z\nupdated: 2024-01-01T12:00:00.000Z\n\
             author: Ada\n---\n\nBody text\n\n## Links\n- extends [[n2]] builds on n2\n\
             - reference [[n3]]\n"
        );
    }

    #[test]
    fn encode_does_not_append_links_when_content_has_heading() {
        let mut note = sample_note();
        note.content = "Body\n\n## Links\n- related [[x]]".to_string();
        let text = encode(&note).unwrap();
        assert_eq!(text.matches("## Links").count(), 1);
        assert!(!text.contains("[[n2]]"));
    }

    #[test]
    fn decode_roundtrips_encoded_note() {
        let original = sample_note();
        let text = encode(&original).unwrap();
        let decoded = decode(&text, &Origin::named("n1.md"), &DecodeOptions::default()).unwrap();
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

        let note = decoded.note;
        assert_eq!(note.id, original.id);
        assert_eq!(note.title, original.title);
        assert_eq!(note.content, "Body text");
        assert_eq!(note.kind, original.kind);
        assert_eq!(note.tags, original.tags);
        assert_eq!(note.created_at, original.created_at);
        assert_eq!(note.updated_at, original.updated_at);
        assert_eq!(note.links.len(), 2);
        for (left, right) in note.links.iter().zip(&original.links) {
            assert!(left.same_edge(right));
        }
        assert_eq!(note.metadata.get("author"), Some(&json!("Ada")));
        assert!(!note.metadata.contains_key("migrated_from"));

        assert_eq!(encode(&note).unwrap(), text);
    }

    #[test]
    fn decode_without_id_uses_hint_only_when_allowed() {
        let text = "---\ntitle: T\n---\nbody";
        let origin = Origin {
            label: "dir/stem.md".to_string(),
            id_hint: Some("stem".to_string()),
            modified_at: None,
        };
        let decoded = decode(text, &origin, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.note.id, "stem");
        assert!(decoded.warnings[0].contains("No ID"));

        let err = decode(text, &origin, &DecodeOptions::require_id()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingId));
        assert!(err.to_string().contains("No ID"));
    }

    #[test]
    fn decode_derives_title_from_heading_or_synthesizes() {
        let from_heading = decode(
            "---\nid: a\n---\n# Heading Title\ntext",
            &Origin::named("a.md"),
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(from_heading.note.title, "Heading Title");
        assert_eq!(from_heading.warnings.len(), 1);

        let synthesized = decode(
            "---\nid: b\n---\nplain",
            &Origin::named("b.md"),
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(synthesized.note.title, "Untitled Note b");
        assert_eq!(synthesized.warnings.len(), 1);
    }

    #[test]
    fn decode_substitutes_unknown_kind_with_warning() {
        let decoded = decode(
            "---\nid: a\ntitle: A\ntype: draft\n---\n",
            &Origin::named("a.md"),
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(decoded.note.kind, NoteKind::Permanent);
        assert!(decoded.warnings[0].contains("draft"));
    }

    #[test]
    fn decode_accepts_numeric_id_and_tag_lists() {
        let decoded = decode(
            "---\nid: 20240101\ntitle: A\ntags:\n  - one\n  - 2\n  - ' one '\n---\n",
            &Origin::named("x.md"),
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(decoded.note.id, "20240101");
        assert_eq!(decoded.note.tag_names(), vec!["2", "one"]);
    }

    #[test]
    fn decode_falls_back_on_bad_timestamps() {
        let modified = timestamp::from_millis(1_600_000_000_000).unwrap();
        let origin = Origin {
            label: "a.md".to_string(),
            id_hint: None,
            modified_at: Some(modified),
        };
        let decoded = decode(
            "---\nid: a\ntitle: A\ncreated: someday\n---\n",
            &origin,
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(decoded.note.created_at, modified);
        assert_eq!(decoded.note.updated_at, modified);
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[test]
    fn decode_defaults_updated_to_created_in_import_mode() {
        let decoded = decode(
            "---\nid: a\ntitle: A\ncreated: 2024-01-01T00:00:00\n---\n",
            &Origin::named("a.md"),
            &DecodeOptions::require_id(),
        )
        .unwrap();
        assert_eq!(decoded.note.updated_at, decoded.note.created_at);
    }

    #[test]
    fn decode_reports_malformed_header() {
        let err = decode(
            "---\nid: [broken\n---\n",
            &Origin::named("bad.md"),
            &DecodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Header(_)));
    }
}
