//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow note-store contract used by exchange and migration.
//! - Isolate SQLite query details from orchestration code.
//!
//! # Invariants
//! - Writes validate notes before any SQL mutation.
//! - Each call commits its own transaction; there is no cross-call batching.
//! - Links to ids absent at write time are dropped, not deferred.

pub mod error;
pub mod note_repo;
pub mod query;

pub use error::{RepoError, RepoResult};
pub use note_repo::{NoteRepository, SqliteNoteRepository, StoreMaintenance};
pub use query::{LinkDirection, NoteListQuery, RepositoryStatistics, SearchQuery, TagUsage};
