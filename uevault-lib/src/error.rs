use thiserror::Error;
use uevault_catalog::CatalogError;
use uevault_db::StorageError;
use uevault_import::ImportError;

use crate::filter::FilterError;

/// Errors surfaced by the vault-level API.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Settings file could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// No data source configured or given
    #[error("No data source configured")]
    NoDataSource,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }
}
