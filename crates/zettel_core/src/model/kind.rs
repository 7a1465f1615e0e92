//! Enumerated kinds and the policy that resolves unknown values.
//!
//! # Responsibility
//! - Provide pure parsers for `NoteKind` and `LinkKind` that never substitute.
//! - Keep default substitution in a separate, swappable `KindPolicy`.
//!
//! # Invariants
//! - `parse(as_str(k)) == Parsed::Known(k)` for every variant.
//! - Parsers trim surrounding whitespace and ignore ASCII case.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Outcome of parsing an enumerated value from free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Known(T),
    /// Raw input that matched no variant.
    Unknown(String),
}

impl<T> Parsed<T> {
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown(_) => None,
        }
    }
}

/// Shared surface of the fixed enumerations stored as text.
pub trait Enumerated: Copy + Sized + 'static {
    /// Field label used in warnings, e.g. `note type`.
    const LABEL: &'static str;
    /// Every variant in declaration order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;
    fn base() -> Self;

    fn parse(value: &str) -> Parsed<Self> {
        let normalized = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(normalized))
            .map_or_else(|| Parsed::Unknown(normalized.to_string()), Parsed::Known)
    }
}

/// Classification of a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Quick, temporary capture.
    Fleeting,
    /// Notes taken from reading material.
    Literature,
    /// Well-formulated, standalone note.
    #[default]
    Permanent,
    /// Index note organizing other notes.
    Structure,
    /// Entry point into a topic.
    Hub,
}

impl Enumerated for NoteKind {
    const LABEL: &'static str = "note type";
    const ALL: &'static [Self] = &[
        Self::Fleeting,
        Self::Literature,
        Self::Permanent,
        Self::Structure,
        Self::Hub,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Fleeting => "fleeting",
            Self::Literature => "literature",
            Self::Permanent => "permanent",
            Self::Structure => "structure",
            Self::Hub => "hub",
        }
    }

    fn base() -> Self {
        Self::Permanent
    }
}

/// Semantic type of a directed link, read from the source note's side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[default]
    Reference,
    Extends,
    ExtendedBy,
    Refines,
    RefinedBy,
    Contradicts,
    ContradictedBy,
    Questions,
    QuestionedBy,
    Supports,
    SupportedBy,
    Related,
}

impl Enumerated for LinkKind {
    const LABEL: &'static str = "link type";
    const ALL: &'static [Self] = &[
        Self::Reference,
        Self::Extends,
        Self::ExtendedBy,
        Self::Refines,
        Self::RefinedBy,
        Self::Contradicts,
        Self::ContradictedBy,
        Self::Questions,
        Self::QuestionedBy,
        Self::Supports,
        Self::SupportedBy,
        Self::Related,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Extends => "extends",
            Self::ExtendedBy => "extended_by",
            Self::Refines => "refines",
            Self::RefinedBy => "refined_by",
            Self::Contradicts => "contradicts",
            Self::ContradictedBy => "contradicted_by",
            Self::Questions => "questions",
            Self::QuestionedBy => "questioned_by",
            Self::Supports => "supports",
            Self::SupportedBy => "supported_by",
            Self::Related => "related",
        }
    }

    fn base() -> Self {
        Self::Reference
    }
}

impl Display for NoteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for LinkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value chosen by a [`KindPolicy`], plus the warning it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub warning: Option<String>,
}

/// Decides what happens to enumerated values that did not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindPolicy {
    /// Replace unknown values with the enumeration's base variant and warn.
    #[default]
    SubstituteDefault,
    /// Reject unknown values.
    Strict,
}

impl KindPolicy {
    /// Resolves a parse outcome. `Err` carries the rejected raw value.
    pub fn resolve<T: Enumerated>(self, parsed: Parsed<T>) -> Result<Resolved<T>, String> {
        match parsed {
            Parsed::Known(value) => Ok(Resolved {
                value,
                warning: None,
            }),
            Parsed::Unknown(raw) => match self {
                Self::SubstituteDefault => {
                    let value = T::base();
                    Ok(Resolved {
                        value,
                        warning: Some(format!(
                            "Invalid {} '{raw}', using {}",
                            T::LABEL,
                            value.as_str()
                        )),
                    })
                }
                Self::Strict => Err(raw),
            },
        }
    }
}
