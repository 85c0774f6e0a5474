//! The storage contract shared by the flat-file and relational backends.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use uevault_catalog::codec::{self, FieldDefaults};
use uevault_catalog::schema::{self, BackendKind};
use uevault_catalog::{Record, field};

use crate::error::StorageError;
use crate::flat_file::FlatFileBackend;
use crate::sqlite::SqliteBackend;

/// Prefix of the asset id given to placeholder rows.
pub const PLACEHOLDER_PREFIX: &str = "dummy_row";

/// Lifecycle of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Loaded,
    Closed,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("not loaded"),
            Self::Loaded => f.write_str("loaded"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Everything a backend holds, keyed by asset id.
#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    pub records: BTreeMap<String, Record>,
    /// Column names in stored order.
    pub columns: Vec<String>,
}

impl LoadedDataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What a save has to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePlan {
    /// The record set is the whole dataset.
    Full,
    /// Only these keys changed since the last load or save.
    Incremental {
        dirty: BTreeSet<String>,
        deleted: BTreeSet<String>,
    },
}

impl WritePlan {
    pub fn incremental<D, X>(dirty: D, deleted: X) -> Self
    where
        D: IntoIterator<Item = String>,
        X: IntoIterator<Item = String>,
    {
        Self::Incremental {
            dirty: dirty.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
        }
    }
}

/// Outcome of [`StorageBackend::write_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Keys written.
    pub saved: Vec<String>,
    /// Keys removed from the store.
    pub deleted: Vec<String>,
    /// Keys that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(k, _)| k.as_str())
    }
}

/// Options common to both backends.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Copy the previous flat file aside before overwriting it.
    pub backup_on_save: bool,
    /// Extra cell texts read as empty by the flat-file backend.
    pub empty_markers: Vec<String>,
}

/// A persistent store of asset records.
///
/// `load_all` moves a backend from `Uninitialized` to `Loaded` and may be
/// repeated. Every other data operation needs `Loaded`. `close` is final.
pub trait StorageBackend {
    fn kind(&self) -> BackendKind;

    fn state(&self) -> BackendState;

    /// File the backend reads and writes.
    fn location(&self) -> &Path;

    /// Columns this backend stores, in registry order.
    fn columns(&self) -> Vec<&'static str> {
        schema::fields_for(self.kind())
    }

    /// Read the whole dataset. An absent or empty source yields an empty set;
    /// an unreadable one is a [`StorageError::Read`].
    fn load_all(&mut self) -> Result<LoadedDataset, StorageError>;

    /// Give up on an unreadable source: set it aside as a backup and continue
    /// as if it were empty, in the `Loaded` state.
    fn start_empty(&mut self) -> Result<(), StorageError>;

    /// Records `offset..offset + limit` in key order.
    fn load_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Record>, StorageError>;

    fn insert(&mut self, record: &Record) -> Result<(), StorageError>;

    fn update(&mut self, record: &Record) -> Result<(), StorageError>;

    /// Remove one asset. Returns whether it existed.
    fn delete(&mut self, asset_id: &str) -> Result<bool, StorageError>;

    /// Persist a record set according to the plan.
    fn write_all(
        &mut self,
        records: &BTreeMap<String, Record>,
        plan: &WritePlan,
    ) -> Result<SaveReport, StorageError>;

    /// Write some fields of some records to a CSV file. Returns the row count.
    fn export_subset(
        &self,
        records: &[&Record],
        fields: &[&str],
        destination: &Path,
    ) -> Result<usize, StorageError> {
        crate::export::export_subset(records.iter().copied(), fields, destination)
    }

    /// A record holding this backend's columns with a placeholder key.
    fn create_empty_row(&self) -> Record {
        let mut row = codec::empty_record(&FieldDefaults::default()).project(self.kind());
        row.set(field::ASSET_ID, PLACEHOLDER_PREFIX);
        row
    }

    fn close(&mut self) -> Result<(), StorageError>;
}

/// First placeholder id not already taken.
pub fn placeholder_id(taken: impl Fn(&str) -> bool) -> String {
    if !taken(PLACEHOLDER_PREFIX) {
        return PLACEHOLDER_PREFIX.to_string();
    }
    (1..)
        .map(|n| format!("{PLACEHOLDER_PREFIX}_{n}"))
        .find(|id| !taken(id))
        .unwrap_or_else(|| PLACEHOLDER_PREFIX.to_string())
}

/// Which backend a path selects.
pub fn kind_for_path(path: &Path) -> BackendKind {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => BackendKind::Relational,
        _ => BackendKind::FlatFile,
    }
}

/// Build the backend for a data source path.
pub fn open_backend(
    path: impl Into<PathBuf>,
    options: &BackendOptions,
) -> Box<dyn StorageBackend> {
    let path = path.into();
    match kind_for_path(&path) {
        BackendKind::Relational => Box::new(SqliteBackend::new(path)),
        BackendKind::FlatFile => Box::new(FlatFileBackend::new(path, options)),
    }
}
