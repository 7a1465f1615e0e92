//! Errors that abort a whole batch run.
//!
//! Per-item failures never surface here; they are counted and recorded as
//! warnings in the run statistics.

use crate::model::note::NoteId;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug)]
pub enum ExchangeError {
    Repo(RepoError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    /// Source directory of an import or restore does not exist.
    MissingDirectory(PathBuf),
    InvalidBatchSize,
    /// Note could not be rendered as markdown.
    Encode { id: NoteId, message: String },
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::MissingDirectory(path) => {
                write!(f, "directory `{}` does not exist", path.display())
            }
            Self::InvalidBatchSize => write!(f, "batch size must be greater than zero"),
            Self::Encode { id, message } => write!(f, "failed to encode note `{id}`: {message}"),
        }
    }
}

impl Error for ExchangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::MissingDirectory(_) | Self::InvalidBatchSize | Self::Encode { .. } => None,
        }
    }
}

impl From<RepoError> for ExchangeError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ExchangeError {
    let path = path.into();
    move |source| ExchangeError::Io { path, source }
}
