//! Relational backend on SQLite.
//!
//! Unlike the flat file, a save here is incremental: only dirty keys are
//! upserted and only deleted keys removed, each in its own transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use uevault_catalog::schema::BackendKind;
use uevault_catalog::{Record, field, schema};

use crate::backend::{BackendState, LoadedDataset, SaveReport, StorageBackend, WritePlan};
use crate::error::StorageError;
use crate::export;
use crate::flat_file::backup_file;
use crate::operations::{self, OperationError};
use crate::queries;
use crate::schema::{open_database, open_memory};

pub struct SqliteBackend {
    path: PathBuf,
    conn: Option<Connection>,
    state: BackendState,
}

impl SqliteBackend {
    /// Backend for a database file. The file is opened on the first load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            state: BackendState::Uninitialized,
        }
    }

    /// Backend on a fresh in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Some(open_memory()?),
            state: BackendState::Uninitialized,
        })
    }

    fn conn(&self, operation: &'static str) -> Result<&Connection, StorageError> {
        match (&self.conn, self.state) {
            (Some(conn), BackendState::Loaded) => Ok(conn),
            (_, state) => Err(StorageError::invalid_state(operation, state)),
        }
    }

    fn conn_mut(&mut self, operation: &'static str) -> Result<&mut Connection, StorageError> {
        match (&mut self.conn, self.state) {
            (Some(conn), BackendState::Loaded) => Ok(conn),
            (_, state) => Err(StorageError::invalid_state(operation, state)),
        }
    }

    /// Write the user-field subset of every asset to a CSV file.
    pub fn export_user_fields(&self, destination: &Path) -> Result<usize, StorageError> {
        let conn = self.conn("export user fields")?;
        let records = queries::load_assets(conn)?;
        export::export_user_fields(records.iter(), destination)
    }

    /// Apply a user-field CSV to the stored assets. Rows whose asset is not in
    /// the database are skipped. Returns the number of assets updated.
    pub fn import_user_fields(&mut self, source: &Path) -> Result<usize, StorageError> {
        let rows = export::read_subset(source)?;
        let conn = self.conn_mut("import user fields")?;
        let mut updated = 0;
        for row in rows {
            let tx = conn.transaction().map_err(OperationError::from)?;
            if operations::update_user_fields(&tx, &row)? {
                updated += 1;
            } else {
                log::warn!(
                    "User fields for unknown asset '{}' skipped",
                    row.asset_id().unwrap_or_default()
                );
            }
            tx.commit().map_err(OperationError::from)?;
        }
        log::info!("Imported user fields for {updated} assets");
        Ok(updated)
    }
}

/// Run one write in its own transaction. Earlier commits are not affected
/// when it fails.
fn in_transaction<T>(
    conn: &mut Connection,
    op: impl FnOnce(&Connection) -> Result<T, OperationError>,
) -> Result<T, OperationError> {
    let tx = conn.transaction()?;
    let value = op(&*tx)?;
    tx.commit()?;
    Ok(value)
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn load_all(&mut self) -> Result<LoadedDataset, StorageError> {
        if self.state == BackendState::Closed {
            return Err(StorageError::invalid_state("load", self.state));
        }
        if self.conn.is_none() {
            let conn = open_database(&self.path).map_err(|e| StorageError::read(&self.path, e))?;
            self.conn = Some(conn);
        }
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| StorageError::read(&self.path, "database is not open"))?;
        let stored =
            queries::count_assets(conn).map_err(|e| StorageError::read(&self.path, e))?;
        log::debug!("{} rows in assets table", stored);
        let records =
            queries::load_assets(conn).map_err(|e| StorageError::read(&self.path, e))?;
        self.state = BackendState::Loaded;

        let records: BTreeMap<String, Record> = records
            .into_iter()
            .filter_map(|r| r.asset_id().map(str::to_string).map(|k| (k, r)))
            .collect();
        log::info!(
            "Loaded {} assets from {}",
            records.len(),
            self.path.display()
        );
        Ok(LoadedDataset {
            records,
            columns: schema::fields_for(BackendKind::Relational)
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    fn start_empty(&mut self) -> Result<(), StorageError> {
        if self.state == BackendState::Closed {
            return Err(StorageError::invalid_state("reset", self.state));
        }
        if self.path.is_file() {
            self.conn = None;
            if let Some(backup) =
                backup_file(&self.path).map_err(|e| StorageError::write(&self.path, e))?
            {
                log::warn!(
                    "Unreadable {} kept as {}",
                    self.path.display(),
                    backup.display()
                );
            }
            std::fs::remove_file(&self.path).map_err(|e| StorageError::write(&self.path, e))?;
            for suffix in ["-wal", "-shm"] {
                let mut side = self.path.clone().into_os_string();
                side.push(suffix);
                let _ = std::fs::remove_file(PathBuf::from(side));
            }
        }
        if self.conn.is_none() {
            let conn =
                open_database(&self.path).map_err(|e| StorageError::write(&self.path, e))?;
            self.conn = Some(conn);
        }
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn load_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Record>, StorageError> {
        let conn = self.conn("load a page")?;
        Ok(queries::load_assets_page(conn, offset, limit)?)
    }

    fn insert(&mut self, record: &Record) -> Result<(), StorageError> {
        let key = record.asset_id().ok_or(StorageError::MissingKey)?.to_string();
        let conn = self.conn_mut("insert")?;
        if operations::asset_exists(conn, &key)? {
            return Err(StorageError::DuplicateKey(key));
        }
        in_transaction(conn, |tx| operations::upsert_asset(tx, record))?;
        Ok(())
    }

    fn update(&mut self, record: &Record) -> Result<(), StorageError> {
        let key = record.asset_id().ok_or(StorageError::MissingKey)?.to_string();
        let conn = self.conn_mut("update")?;
        if !operations::asset_exists(conn, &key)? {
            return Err(StorageError::NotFound(key));
        }
        in_transaction(conn, |tx| operations::upsert_asset(tx, record))?;
        Ok(())
    }

    fn delete(&mut self, asset_id: &str) -> Result<bool, StorageError> {
        let conn = self.conn_mut("delete")?;
        Ok(in_transaction(conn, |tx| operations::delete_asset(tx, asset_id))?)
    }

    fn write_all(
        &mut self,
        records: &BTreeMap<String, Record>,
        plan: &WritePlan,
    ) -> Result<SaveReport, StorageError> {
        let conn = self.conn_mut("save")?;

        let (to_upsert, to_delete): (Vec<&String>, Vec<String>) = match plan {
            WritePlan::Incremental { dirty, deleted } => (
                dirty.iter().filter(|k| records.contains_key(*k)).collect(),
                deleted.iter().cloned().collect(),
            ),
            WritePlan::Full => {
                let stored: BTreeSet<String> = queries::asset_ids(conn)?.into_iter().collect();
                (
                    records.keys().collect(),
                    stored
                        .into_iter()
                        .filter(|k| !records.contains_key(k))
                        .collect(),
                )
            }
        };

        let mut report = SaveReport::default();
        for key in to_upsert {
            let mut record = records[key].clone();
            // The map key is authoritative over the record's own field.
            record.set(field::ASSET_ID, key.as_str());
            match in_transaction(conn, |tx| operations::upsert_asset(tx, &record)) {
                Ok(()) => report.saved.push(key.clone()),
                Err(e) => {
                    log::warn!("Failed to save asset '{key}': {e}");
                    report.failed.push((key.clone(), e.to_string()));
                }
            }
        }
        for key in to_delete {
            match in_transaction(conn, |tx| operations::delete_asset(tx, &key)) {
                Ok(_) => report.deleted.push(key),
                Err(e) => {
                    log::warn!("Failed to delete asset '{key}': {e}");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        log::info!(
            "Saved {} assets, deleted {}, {} failed",
            report.saved.len(),
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| OperationError::from(e))?;
        }
        self.state = BackendState::Closed;
        Ok(())
    }
}
