//! Runtime configuration.
//!
//! Resolved once at startup (from a YAML file or defaults) and then handed to
//! the store and manager, so nothing reads the environment mid-request.

use crate::manager::ManagerOptions;
use crate::storage::{OpenStore, SqliteStore, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under the platform data dir holding the default database
pub const DATA_DIR_NAME: &str = "termrequester";

/// File name of the default database
pub const DB_FILE_NAME: &str = "phenotypes.db";

/// Errors raised while loading configuration or applying it
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("failed to open store: {0}")]
    Store(#[from] StorageError),
}

/// Configuration for a term requester deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequesterConfig {
    /// SQLite database file; defaults to [`default_db_path`]
    pub db_path: Option<PathBuf>,
    /// Append the descriptions of duplicate requests
    pub merge_descriptions: bool,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            merge_descriptions: true,
            log_level: "info".to_string(),
        }
    }
}

impl RequesterConfig {
    /// Load configuration from a YAML file; missing keys take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    /// Open (creating if needed) the configured SQLite store
    pub fn open_store(&self) -> Result<SqliteStore, ConfigError> {
        Ok(SqliteStore::open(self.resolved_db_path())?)
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            merge_descriptions: self.merge_descriptions,
        }
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}

/// Default database location (~/.local/share/termrequester/phenotypes.db on Linux)
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join(DATA_DIR_NAME).join(DB_FILE_NAME)
}

/// Install a fmt subscriber at `level`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(level: tracing::Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}
