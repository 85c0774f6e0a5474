use std::fmt::Display;
use std::path::Path;

use thiserror::Error;

use crate::backend::BackendState;
use crate::operations::OperationError;
use crate::schema::SchemaError;

/// Errors raised by the storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The data source exists but cannot be read or parsed.
    #[error("Cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The destination cannot be written.
    #[error("Cannot write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Cannot {operation} while the backend is {state}")]
    InvalidState {
        operation: &'static str,
        state: BackendState,
    },

    #[error("Asset '{0}' already exists")]
    DuplicateKey(String),

    #[error("Asset '{0}' not found")]
    NotFound(String),

    #[error("Record has no asset id")]
    MissingKey,

    #[error("Database error: {0}")]
    Operation(#[from] OperationError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StorageError {
    pub fn read(path: &Path, reason: impl Display) -> Self {
        Self::Read {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: &Path, reason: impl Display) -> Self {
        Self::Write {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: BackendState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Whether this is a read failure the caller may recover from.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}
