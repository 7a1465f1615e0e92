//! Directed, typed link between two notes.
//!
//! # Invariants
//! - `source_id` is always the owning note's id.
//! - An empty description is stored as `None`.

use crate::model::kind::LinkKind;
use crate::model::note::NoteId;
use crate::model::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source_id: NoteId,
    pub target_id: NoteId,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(source_id: impl Into<NoteId>, target_id: impl Into<NoteId>, kind: LinkKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            description: None,
            created_at: timestamp::now(),
        }
    }

    /// Sets the description; blank input clears it.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = normalize_description(Some(description.into()));
        self
    }

    /// Compares the edge itself, ignoring `created_at`.
    pub fn same_edge(&self, other: &Link) -> bool {
        self.source_id == other.source_id
            && self.target_id == other.target_id
            && self.kind == other.kind
            && self.description == other.description
    }
}

/// Collapses whitespace runs (line breaks included) to single spaces and
/// maps blank values to `None`. Descriptions must fit on one bullet line.
pub fn normalize_description(value: Option<String>) -> Option<String> {
    value
        .map(|text| collapse_whitespace(&text))
        .filter(|text| !text.is_empty())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize_description;

    #[test]
    fn description_collapses_line_breaks_and_blanks() {
        assert_eq!(
            normalize_description(Some("  one\n\ttwo  three \r\n".to_string())),
            Some("one two three".to_string())
        );
        assert_eq!(normalize_description(Some(" \n ".to_string())), None);
        assert_eq!(normalize_description(None), None);
    }
}
