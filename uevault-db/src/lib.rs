//! Storage backends for asset records.
//!
//! Two interchangeable backends implement [`StorageBackend`]: a flat CSV/TSV
//! file rewritten on every save, and an SQLite database (via rusqlite with the
//! bundled feature) saved incrementally.

pub mod backend;
pub mod error;
pub mod export;
pub mod flat_file;
pub mod operations;
pub mod queries;
pub mod schema;
pub mod sqlite;

pub use backend::{
    BackendOptions, BackendState, LoadedDataset, PLACEHOLDER_PREFIX, SaveReport, StorageBackend,
    WritePlan, kind_for_path, open_backend, placeholder_id,
};
pub use error::StorageError;
pub use export::{export_subset, export_user_fields, read_subset, user_field_columns};
pub use flat_file::{FlatFileBackend, backup_file};
pub use operations::OperationError;
pub use schema::{open_database, open_memory};
pub use sqlite::SqliteBackend;
