//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::note::{NoteId, NoteValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for note persistence, query and maintenance operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    /// `update`/`delete` on an unknown id.
    NotFound(NoteId),
    /// `create` on an id that is already stored.
    AlreadyExists(NoteId),
    /// Persisted row cannot be mapped back to the domain model.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    BackupMissing(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note with id `{id}` not found"),
            Self::AlreadyExists(id) => write!(f, "note with id `{id}` already exists"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::BackupMissing(path) => {
                write!(f, "backup file `{}` does not exist", path.display())
            }
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::InvalidData(_)
            | Self::MissingRequiredTable(_)
            | Self::BackupMissing(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
