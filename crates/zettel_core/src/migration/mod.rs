//! Markdown corpus migration and verification.

pub mod migrator;
pub mod verifier;

pub use migrator::{FileError, MigratedNote, MigrationReport, Migrator};
pub use verifier::{verify_migration, Verification};
