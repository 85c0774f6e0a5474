use thiserror::Error;

use uevault_catalog::CatalogError;
use uevault_db::StorageError;
use uevault_import::ImportError;
use uevault_lib::VaultError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Data source could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Catalog items could not be fetched or saved
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid filter or field list
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The run was stopped before completion
    #[error("Cancelled after {0} items")]
    Cancelled(usize),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub(crate) fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::storage(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::catalog(e.to_string())
    }
}

impl From<ImportError> for CliError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Storage(e) => e.into(),
            ImportError::Catalog(e) => e.into(),
        }
    }
}

impl From<VaultError> for CliError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Storage(e) => e.into(),
            VaultError::Import(e) => e.into(),
            VaultError::Catalog(e) => e.into(),
            VaultError::Filter(e) => Self::invalid_argument(e.to_string()),
            VaultError::Settings(msg) => Self::config(msg),
            VaultError::NoDataSource => Self::config(
                "no data source given; pass --source or set data_source in the settings file",
            ),
            VaultError::Io(e) => Self::Io(e),
        }
    }
}
