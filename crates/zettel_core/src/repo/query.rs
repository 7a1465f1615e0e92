//! Query options and aggregate read models.

use crate::model::kind::NoteKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for `list`. Filters combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    pub kind: Option<NoteKind>,
    /// Exact tag name.
    pub tag: Option<String>,
    /// `None` returns every matching row.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl NoteListQuery {
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
            ..Self::default()
        }
    }
}

/// Case-insensitive substring search over the enabled fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub search_title: bool,
    pub search_content: bool,
    pub search_tags: bool,
    pub limit: Option<u32>,
}

impl SearchQuery {
    /// Searches title, content and tags without a result limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            search_title: true,
            search_content: true,
            search_tags: true,
            limit: None,
        }
    }

    pub fn has_fields(&self) -> bool {
        self.search_title || self.search_content || self.search_tags
    }
}

/// Which link endpoints `find_linked_notes` follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkDirection {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl LinkDirection {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}

/// Tag name with the number of notes carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub name: String,
    pub count: u64,
}

/// Store-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatistics {
    pub total_notes: u64,
    /// Distinct tags attached to at least one note.
    pub total_tags: u64,
    pub total_links: u64,
    pub notes_by_type: BTreeMap<String, u64>,
    pub storage_type: String,
}
