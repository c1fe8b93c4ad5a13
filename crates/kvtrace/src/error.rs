//! Error types for kvtrace.
//!
//! Storage and retrieval failures always reach the caller through [`KvError`].
//! Instrumentation bookkeeping never produces one of these: its failures are
//! logged and dropped by the wrappers in [`crate::instrument`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the kvtrace library.
#[derive(Debug, Error)]
pub enum KvError {
    // Backend connectivity
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Individual operation rejected by the backend
    #[error("Write failed ({operation} {key}): {message}")]
    WriteFailed {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Read failed ({operation} {key}): {message}")]
    ReadFailed {
        operation: &'static str,
        key: String,
        message: String,
    },

    // Value errors
    #[error("Failed to decode value at {key} as {target}: {message}")]
    Decode {
        key: String,
        target: &'static str,
        message: String,
    },

    #[error("No value stored at {key}")]
    AbsentValue { key: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for kvtrace operations.
pub type Result<T> = std::result::Result<T, KvError>;

impl From<std::io::Error> for KvError {
    fn from(err: std::io::Error) -> Self {
        KvError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(err: rusqlite::Error) -> Self {
        KvError::BackendUnavailable {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl KvError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        KvError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a write failure for a backend operation on `key`.
    pub fn write_failed(operation: &'static str, key: &str, message: impl ToString) -> Self {
        KvError::WriteFailed {
            operation,
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a read failure for a backend operation on `key`.
    pub fn read_failed(operation: &'static str, key: &str, message: impl ToString) -> Self {
        KvError::ReadFailed {
            operation,
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the error originated in the backend rather than in decoding.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            KvError::BackendUnavailable { .. }
                | KvError::WriteFailed { .. }
                | KvError::ReadFailed { .. }
        )
    }
}
