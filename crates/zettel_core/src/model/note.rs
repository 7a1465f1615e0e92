//! Note and tag value types.
//!
//! # Responsibility
//! - Define the canonical record persisted by the repository.
//! - Provide lifecycle helpers for tags and outgoing links.
//!
//! # Invariants
//! - `id` is immutable after creation and safe to use as a file stem.
//! - Tag names are unique per note (enforced by `BTreeSet<Tag>`).
//! - `content` never includes the generated links section.
//! - Timestamps carry millisecond precision.

use crate::model::kind::{LinkKind, NoteKind};
use crate::model::link::{normalize_description, Link};
use crate::model::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Stable note identifier, also used as `<id>.md` file stem.
pub type NoteId = String;

/// Arbitrary JSON-compatible note metadata.
pub type Metadata = BTreeMap<String, Value>;

static LAST_GENERATED_NANOS: AtomicI64 = AtomicI64::new(0);

/// Generates a timestamp id: `YYYYMMDDTHHMMSS` plus 9 sub-second digits.
///
/// Ids are strictly increasing within one process, even when the clock
/// does not advance between calls.
pub fn generate_id() -> NoteId {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let previous = LAST_GENERATED_NANOS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    let nanos = if now > previous { now } else { previous + 1 };
    let moment = DateTime::from_timestamp_nanos(nanos);
    format!(
        "{}{:09}",
        moment.format("%Y%m%dT%H%M%S"),
        moment.timestamp_subsec_nanos()
    )
}

/// Tag attached to notes, shared by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    /// Builds a tag from raw input. Returns `None` for blank names.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                name: trimmed.to_string(),
            })
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builds a tag set from raw names, dropping blanks and duplicates.
pub fn tag_set<I, S>(names: I) -> BTreeSet<Tag>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().filter_map(Tag::new).collect()
}

/// Write-time validation failures for notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyId,
    /// Id cannot be used as a file name.
    InvalidId(String),
    EmptyTitle(NoteId),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "note id cannot be empty"),
            Self::InvalidId(id) => write!(f, "note id `{id}` contains path separators"),
            Self::EmptyTitle(id) => write!(f, "note `{id}` has an empty title"),
        }
    }
}

impl Error for NoteValidationError {}

/// A Zettelkasten note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Free text body, without the generated links section.
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub tags: BTreeSet<Tag>,
    /// Outgoing links in authored order.
    pub links: Vec<Link>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Note {
    /// Creates a permanent note with a generated id.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(generate_id(), title, content)
    }

    /// Creates a permanent note with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: impl Into<NoteId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = timestamp::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            kind: NoteKind::default(),
            tags: BTreeSet::new(),
            links: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        }
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.trim().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            return Err(NoteValidationError::InvalidId(self.id.clone()));
        }
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::EmptyTitle(self.id.clone()));
        }
        Ok(())
    }

    /// Adds a tag; duplicates and blank names are ignored.
    pub fn add_tag(&mut self, name: &str) {
        if let Some(tag) = Tag::new(name) {
            if self.tags.insert(tag) {
                self.touch();
            }
        }
    }

    pub fn remove_tag(&mut self, name: &str) {
        if self.tags.remove(&Tag {
            name: name.trim().to_string(),
        }) {
            self.touch();
        }
    }

    /// Adds an outgoing link unless one with the same target and kind exists.
    pub fn add_link(&mut self, target_id: &str, kind: LinkKind, description: Option<&str>) {
        let exists = self
            .links
            .iter()
            .any(|link| link.target_id == target_id && link.kind == kind);
        if exists {
            return;
        }

        let mut link = Link::new(self.id.clone(), target_id, kind);
        link.description = normalize_description(description.map(str::to_string));
        self.links.push(link);
        self.touch();
    }

    /// Removes links to `target_id`, optionally only those of one kind.
    pub fn remove_link(&mut self, target_id: &str, kind: Option<LinkKind>) {
        let before = self.links.len();
        self.links.retain(|link| {
            !(link.target_id == target_id && kind.map_or(true, |wanted| link.kind == wanted))
        });
        if self.links.len() != before {
            self.touch();
        }
    }

    pub fn linked_note_ids(&self) -> BTreeSet<NoteId> {
        self.links
            .iter()
            .map(|link| link.target_id.clone())
            .collect()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    fn touch(&mut self) {
        self.updated_at = timestamp::now();
    }
}
