//! Flat-file (CSV/TSV) backend.
//!
//! The file is the only copy: nothing is cached between calls, and every
//! write rewrites the whole file through a temp file and a rename, so a failed
//! save leaves the previous file untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use uevault_catalog::codec;
use uevault_catalog::schema::{self, BackendKind};
use uevault_catalog::{Record, field};

use crate::backend::{
    BackendOptions, BackendState, LoadedDataset, SaveReport, StorageBackend, WritePlan,
};
use crate::error::StorageError;

/// Cell texts always read as empty. Older files were written with these.
const DEFAULT_EMPTY_MARKERS: &[&str] = &["None", "nan"];

pub struct FlatFileBackend {
    path: PathBuf,
    delimiter: u8,
    backup_on_save: bool,
    empty_markers: Vec<String>,
    state: BackendState,
}

/// Field delimiter for a path: tab for `.tsv`, comma otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Copy a file to `<stem>.BACKUP_<yy-mm-dd_HH-MM-SS>.<ext>` next to it.
///
/// Returns `None` when there is nothing to back up.
pub fn backup_file(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = chrono::Local::now().format("%y-%m-%d_%H-%M-%S");
    let name = match path.extension() {
        Some(ext) => format!("{stem}.BACKUP_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}.BACKUP_{stamp}"),
    };
    let backup = path.with_file_name(name);
    fs::copy(path, &backup)?;
    log::info!("Backed up {} to {}", path.display(), backup.display());
    Ok(Some(backup))
}

impl FlatFileBackend {
    pub fn new(path: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        let path = path.into();
        let mut empty_markers: Vec<String> =
            DEFAULT_EMPTY_MARKERS.iter().map(|s| s.to_string()).collect();
        empty_markers.extend(options.empty_markers.iter().cloned());
        Self {
            delimiter: delimiter_for(&path),
            path,
            backup_on_save: options.backup_on_save,
            empty_markers,
            state: BackendState::Uninitialized,
        }
    }

    fn require_loaded(&self, operation: &'static str) -> Result<(), StorageError> {
        match self.state {
            BackendState::Loaded => Ok(()),
            state => Err(StorageError::invalid_state(operation, state)),
        }
    }

    fn is_empty_marker(&self, cell: &str) -> bool {
        self.empty_markers.iter().any(|m| m == cell)
    }

    /// Parse the file. Does not touch the state.
    fn read_file(&self) -> Result<LoadedDataset, StorageError> {
        let columns = || {
            schema::fields_for(BackendKind::FlatFile)
                .into_iter()
                .map(String::from)
                .collect()
        };
        let contents = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} does not exist yet", self.path.display());
                return Ok(LoadedDataset {
                    records: BTreeMap::new(),
                    columns: columns(),
                });
            }
            Err(e) => return Err(StorageError::read(&self.path, e)),
        };
        if contents.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(LoadedDataset {
                records: BTreeMap::new(),
                columns: columns(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(contents.as_slice());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| StorageError::read(&self.path, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        if !headers.iter().any(|h| h == field::ASSET_ID) {
            return Err(StorageError::read(
                &self.path,
                format!("no '{}' column in header", field::ASSET_ID),
            ));
        }

        let mut records = BTreeMap::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| StorageError::read(&self.path, e))?;
            let cells = headers.iter().zip(row.iter()).map(|(name, cell)| {
                let cell = if self.is_empty_marker(cell) { "" } else { cell };
                (name.as_str(), cell)
            });
            let (record, errors) = codec::decode_cells(cells);
            for err in errors {
                log::warn!("{} row {}: {}", self.path.display(), line + 2, err);
            }
            let Some(key) = record.asset_id().map(str::to_string) else {
                log::warn!(
                    "{} row {}: no asset id, row skipped",
                    self.path.display(),
                    line + 2
                );
                continue;
            };
            if records.insert(key.clone(), record).is_some() {
                log::warn!("{}: duplicate asset id '{}', last row kept", self.path.display(), key);
            }
        }

        Ok(LoadedDataset {
            records,
            columns: headers,
        })
    }

    /// Rewrite the whole file, sorted by key, with the registry header.
    fn write_file(&self, records: &BTreeMap<String, Record>) -> Result<(), StorageError> {
        if self.backup_on_save {
            backup_file(&self.path).map_err(|e| StorageError::write(&self.path, e))?;
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::write(&self.path, e))?;
        }

        let ext = self
            .path
            .extension()
            .map(|e| format!("{}.tmp", e.to_string_lossy()))
            .unwrap_or_else(|| "tmp".to_string());
        let tmp = self.path.with_extension(ext);

        let result = write_rows(&tmp, self.delimiter, records.values());
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::write(&self.path, e));
        }
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::write(&self.path, e))?;
        log::debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

fn write_rows<'a>(
    path: &Path,
    delimiter: u8,
    records: impl Iterator<Item = &'a Record>,
) -> Result<(), csv::Error> {
    let header = schema::fields_for(BackendKind::FlatFile);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(
            header
                .iter()
                .map(|name| record.get(name).map(|v| v.to_cell()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

impl StorageBackend for FlatFileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FlatFile
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
        let dataset = self.read_file()?;
        self.state = BackendState::Loaded;
        log::info!(
            "Loaded {} assets from {}",
            dataset.records.len(),
            self.path.display()
        );
        Ok(dataset)
    }

    fn start_empty(&mut self) -> Result<(), StorageError> {
        if self.state == BackendState::Closed {
            return Err(StorageError::invalid_state("reset", self.state));
        }
        if let Some(backup) =
            backup_file(&self.path).map_err(|e| StorageError::write(&self.path, e))?
        {
            log::warn!(
                "Unreadable {} kept as {}",
                self.path.display(),
                backup.display()
            );
        }
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn load_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Record>, StorageError> {
        self.require_loaded("load a page")?;
        Ok(self
            .read_file()?
            .records
            .into_values()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn insert(&mut self, record: &Record) -> Result<(), StorageError> {
        self.require_loaded("insert")?;
        let key = record.asset_id().ok_or(StorageError::MissingKey)?.to_string();
        let mut records = self.read_file()?.records;
        if records.contains_key(&key) {
            return Err(StorageError::DuplicateKey(key));
        }
        records.insert(key, record.project(BackendKind::FlatFile));
        self.write_file(&records)
    }

    fn update(&mut self, record: &Record) -> Result<(), StorageError> {
        self.require_loaded("update")?;
        let key = record.asset_id().ok_or(StorageError::MissingKey)?.to_string();
        let mut records = self.read_file()?.records;
        match records.get_mut(&key) {
            Some(slot) => *slot = record.project(BackendKind::FlatFile),
            None => return Err(StorageError::NotFound(key)),
        }
        self.write_file(&records)
    }

    fn delete(&mut self, asset_id: &str) -> Result<bool, StorageError> {
        self.require_loaded("delete")?;
        let mut records = self.read_file()?.records;
        if records.remove(asset_id).is_none() {
            return Ok(false);
        }
        self.write_file(&records)?;
        Ok(true)
    }

    /// The flat file has no incremental save: the plan only shapes the report.
    fn write_all(
        &mut self,
        records: &BTreeMap<String, Record>,
        plan: &WritePlan,
    ) -> Result<SaveReport, StorageError> {
        self.require_loaded("save")?;
        self.write_file(records)?;
        let deleted = match plan {
            WritePlan::Full => Vec::new(),
            WritePlan::Incremental { deleted, .. } => deleted
                .iter()
                .filter(|k| !records.contains_key(*k))
                .cloned()
                .collect(),
        };
        Ok(SaveReport {
            saved: records.keys().cloned().collect(),
            deleted,
            failed: Vec::new(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.state = BackendState::Closed;
        Ok(())
    }
}
