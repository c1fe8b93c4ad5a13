//! Centralized configuration for kvtrace.
//!
//! Keyspace naming conventions, backend defaults, and the serde-backed
//! settings used to open a SQLite backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Key naming conventions shared by the instrumentation layers and replay.
pub struct KeyspaceConfig;

impl KeyspaceConfig {
    pub const INPUTS_SUFFIX: &'static str = ":inputs";
    pub const OUTPUTS_SUFFIX: &'static str = ":outputs";
    /// Identity of [`crate::Cache::store`].
    pub const STORE_OPERATION: &'static str = "Cache.store";

    /// List key holding the rendered inputs of `operation`.
    pub fn inputs_key(operation: &str) -> String {
        format!("{}{}", operation, Self::INPUTS_SUFFIX)
    }

    /// List key holding the outputs of `operation`.
    pub fn outputs_key(operation: &str) -> String {
        format!("{}{}", operation, Self::OUTPUTS_SUFFIX)
    }
}

/// Backend defaults.
pub struct BackendConfig;

impl BackendConfig {
    pub const APP_DIR_NAME: &'static str = "kvtrace";
    pub const DB_FILE_NAME: &'static str = "kvtrace.sqlite";
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Settings for opening a [`crate::SqliteBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqliteBackendConfig {
    /// Database file location.
    pub path: PathBuf,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging.
    pub wal: bool,
}

impl SqliteBackendConfig {
    /// Configuration for a database at `path` with default tuning.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: BackendConfig::BUSY_TIMEOUT.as_millis() as u64,
            wal: true,
        }
    }
}

/// Default database location: `<data_dir>/kvtrace/kvtrace.sqlite`, falling
/// back to the working directory when no data directory is known.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(BackendConfig::APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BackendConfig::DB_FILE_NAME)
}
