//! Zettelkasten domain model.
//!
//! # Responsibility
//! - Define the value types shared by codec, repository and exchange layers.
//! - Keep enumerations parseable without hidden default substitution.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId` that doubles as file stem.
//! - Tags are compared by name; links are directed and owned by their source.
//!
//! # See also
//! - crate::codec::markdown for the text encoding of these types.

pub mod kind;
pub mod link;
pub mod note;
pub mod timestamp;
