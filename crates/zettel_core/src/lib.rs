//! Core of the zettelkasten note store.
//!
//! Notes live in SQLite; markdown directories are the exchange format for
//! export, import, merge, restore and one-shot migration.

pub mod codec;
pub mod config;
pub mod db;
pub mod exchange;
pub mod logging;
pub mod migration;
pub mod model;
pub mod repo;

pub use codec::{decode, decode_file, encode, DecodeError, DecodeOptions, Decoded, Origin};
pub use config::{ConfigError, ZettelConfig};
pub use exchange::{
    ExchangeError, ExchangeResult, ExportCriteria, ExportStats, Exporter, ImportStats, Importer,
    MergeStats, MergeStrategy, NoProgress, ProgressEvent, ProgressObserver, RestoreOutcome,
};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use migration::{verify_migration, MigrationReport, Migrator, Verification};
pub use model::kind::{Enumerated, KindPolicy, LinkKind, NoteKind, Parsed};
pub use model::link::Link;
pub use model::note::{generate_id, Metadata, Note, NoteId, NoteValidationError, Tag};
pub use repo::{
    LinkDirection, NoteListQuery, NoteRepository, RepoError, RepoResult, RepositoryStatistics,
    SearchQuery, SqliteNoteRepository, StoreMaintenance, TagUsage,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
