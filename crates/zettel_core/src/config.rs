//! Runtime configuration.
//!
//! # Responsibility
//! - Resolve database, logging and batch settings from the environment.
//!
//! # Invariants
//! - Missing or blank variables fall back to defaults.
//! - Batch sizes are always positive.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DATABASE_PATH: &str = "ZETTELKASTEN_DATABASE_PATH";
pub const ENV_LOG_DIR: &str = "ZETTELKASTEN_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "ZETTELKASTEN_LOG_LEVEL";
pub const ENV_EXPORT_BATCH: &str = "ZETTELKASTEN_EXPORT_BATCH";
pub const ENV_IMPORT_BATCH: &str = "ZETTELKASTEN_IMPORT_BATCH";

const DEFAULT_DB_PATH: &str = "data/db/zettelkasten.db";
const DEFAULT_LOG_DIR: &str = "data/logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}; expected a positive integer")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZettelConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub export_batch_size: usize,
    pub import_batch_size: usize,
}

impl Default for ZettelConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_level: default_log_level().to_string(),
            export_batch_size: crate::exchange::DEFAULT_EXPORT_BATCH_SIZE,
            import_batch_size: crate::exchange::DEFAULT_IMPORT_BATCH_SIZE,
        }
    }
}

impl ZettelConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DATABASE_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(raw) = read(ENV_EXPORT_BATCH) {
            config.export_batch_size = parse_batch_size(ENV_EXPORT_BATCH, &raw)?;
        }
        if let Some(raw) = read(ENV_IMPORT_BATCH) {
            config.import_batch_size = parse_batch_size(ENV_IMPORT_BATCH, &raw)?;
        }
        Ok(config)
    }

    /// Makes relative paths absolute against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.db_path.is_relative() {
            self.db_path = base.join(&self.db_path);
        }
        if self.log_dir.is_relative() {
            self.log_dir = base.join(&self.log_dir);
        }
        self
    }
}

fn parse_batch_size(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.parse::<usize>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        })
}
