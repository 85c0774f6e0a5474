//! Paginated, filterable, editable view over one backend's dataset.
//!
//! The view owns the only in-memory copy of the records. Edits mark rows
//! dirty by asset id, deletions move ids to a delete set, and [`save`] hands
//! both sets to the backend as an incremental write plan.
//!
//! Row numbers in this API are positions within the current page of the
//! filtered view, starting at 0.
//!
//! [`save`]: DatasetView::save

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use uevault_catalog::schema::{self, BackendKind};
use uevault_catalog::{FieldCoercionError, FieldValue, Record, field};
use uevault_db::{SaveReport, StorageBackend, StorageError, WritePlan, placeholder_id};

use crate::error::VaultError;
use crate::filter::CompiledFilter;

pub struct DatasetView {
    backend: Box<dyn StorageBackend>,
    records: BTreeMap<String, Record>,
    columns: Vec<String>,
    dirty: BTreeSet<String>,
    deleted: BTreeSet<String>,
    /// Key of the untouched placeholder row, if one is shown.
    placeholder: Option<String>,
    filter: Option<CompiledFilter>,
    /// Keys passing the filter, in display order.
    visible: Vec<String>,
    page_size: usize,
    current_page: usize,
    total_pages: usize,
    unsaved: bool,
}

impl DatasetView {
    /// Load the backend's dataset. An unreadable source is set aside and the
    /// view starts with a single placeholder row, as does an empty one.
    pub fn open(backend: Box<dyn StorageBackend>, page_size: usize) -> Result<Self, VaultError> {
        let mut view = Self {
            columns: backend.columns().into_iter().map(String::from).collect(),
            backend,
            records: BTreeMap::new(),
            dirty: BTreeSet::new(),
            deleted: BTreeSet::new(),
            placeholder: None,
            filter: None,
            visible: Vec::new(),
            page_size,
            current_page: 1,
            total_pages: 1,
            unsaved: false,
        };
        view.load()?;
        Ok(view)
    }

    fn load(&mut self) -> Result<(), VaultError> {
        let loaded = match self.backend.load_all() {
            Ok(loaded) => Some(loaded),
            Err(e @ StorageError::Read { .. }) => {
                log::warn!("{e}. Starting with an empty dataset");
                self.backend.start_empty()?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        self.placeholder = None;
        match loaded {
            Some(loaded) if !loaded.is_empty() => {
                self.records = loaded.records;
                if !loaded.columns.is_empty() {
                    self.columns = loaded.columns;
                }
            }
            _ => {
                let row = self.backend.create_empty_row();
                let key = row.asset_id().unwrap_or_default().to_string();
                self.records = BTreeMap::from([(key.clone(), row)]);
                self.placeholder = Some(key);
            }
        }
        self.refresh();
        Ok(())
    }

    /// Recompute the visible keys from the filter, then the pagination.
    fn refresh(&mut self) {
        self.visible = self
            .records
            .iter()
            .filter(|(_, r)| self.filter.as_ref().is_none_or(|f| f.matches(r)))
            .map(|(k, _)| k.clone())
            .collect();
        self.paginate(self.page_size);
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &BTreeMap<String, Record> {
        &self.records
    }

    pub fn record(&self, asset_id: &str) -> Option<&Record> {
        self.records.get(asset_id)
    }

    /// Number of rows passing the filter.
    pub fn filtered_len(&self) -> usize {
        self.visible.len()
    }

    pub fn dirty_keys(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn deleted_keys(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    /// Positions of dirty rows in the filtered ordering.
    pub fn dirty_rows(&self) -> Vec<usize> {
        self.visible
            .iter()
            .enumerate()
            .filter(|(_, k)| self.dirty.contains(*k))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn is_placeholder_only(&self) -> bool {
        self.placeholder.is_some() && self.records.len() == 1
    }

    pub fn filter(&self) -> Option<&CompiledFilter> {
        self.filter.as_ref()
    }

    // ── Pagination ──────────────────────────────────────────────────────

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Set the page size and recompute the page count. An empty view still
    /// has one (empty) page; a page size of 0 puts every row on one page.
    pub fn paginate(&mut self, page_size: usize) {
        self.page_size = page_size;
        self.total_pages = if page_size == 0 {
            1
        } else {
            self.visible.len().div_ceil(page_size).max(1)
        };
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    /// Jump to a page, clamped to the valid range. Returns the page shown.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.current_page = page.clamp(1, self.total_pages);
        self.current_page
    }

    /// Returns false when already on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.current_page >= self.total_pages {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Returns false when already on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.current_page <= 1 {
            return false;
        }
        self.current_page -= 1;
        true
    }

    pub fn first_page(&mut self) {
        self.current_page = 1;
    }

    pub fn last_page(&mut self) {
        self.current_page = self.total_pages;
    }

    fn page_range(&self) -> std::ops::Range<usize> {
        if self.page_size == 0 {
            return 0..self.visible.len();
        }
        let start = ((self.current_page - 1) * self.page_size).min(self.visible.len());
        let end = (start + self.page_size).min(self.visible.len());
        start..end
    }

    /// Keys of the rows on the current page.
    pub fn page_keys(&self) -> &[String] {
        &self.visible[self.page_range()]
    }

    /// Records on the current page.
    pub fn page_rows(&self) -> Vec<&Record> {
        self.page_keys()
            .iter()
            .filter_map(|k| self.records.get(k))
            .collect()
    }

    fn key_at(&self, row: usize) -> Option<&String> {
        self.page_keys().get(row)
    }

    // ── Filtering ───────────────────────────────────────────────────────

    /// Replace the active filter and go back to the first page.
    pub fn apply_filter(&mut self, filter: Option<CompiledFilter>) {
        if let Some(f) = &filter {
            log::debug!("Applying filter '{}'", f.source());
        }
        self.filter = filter;
        self.current_page = 1;
        self.refresh();
    }

    // ── Editing ─────────────────────────────────────────────────────────

    fn touch(&mut self, key: &str) {
        self.dirty.insert(key.to_string());
        // A key that comes back must not be deleted by the next save.
        self.deleted.remove(key);
        if self.placeholder.as_deref() == Some(key) {
            self.placeholder = None;
        }
        self.unsaved = true;
    }

    /// Set one cell from its text form.
    ///
    /// Returns false, leaving the view unchanged, when the row or the field
    /// does not exist or an `Asset_id` edit would collide with another row.
    /// Text that does not parse as the field's type is kept as text.
    pub fn set_cell(&mut self, row: usize, field_name: &str, value: &str) -> bool {
        let Some(key) = self.key_at(row).cloned() else {
            log::warn!("Row {row} is not on the current page");
            return false;
        };
        let Some(spec) = schema::find_field(field_name).filter(|s| s.exposed_in(self.kind()))
        else {
            log::warn!("Unknown column '{field_name}' for the {}", self.kind());
            return false;
        };

        if spec.name == field::ASSET_ID {
            return self.rekey(&key, value.trim());
        }

        let parsed = match FieldValue::parse(value, spec.value_type) {
            Ok(v) => v,
            Err(e) => {
                let error = FieldCoercionError::new(spec.name, e.value, e.expected);
                log::warn!("{key}: {error}, kept as text");
                FieldValue::text(value)
            }
        };
        if let Some(record) = self.records.get_mut(&key) {
            record.set(spec.name, parsed);
        }
        self.touch(&key);
        true
    }

    fn rekey(&mut self, old: &str, new: &str) -> bool {
        if new == old {
            return true;
        }
        if new.is_empty() {
            log::warn!("An asset id cannot be empty");
            return false;
        }
        if self.records.contains_key(new) {
            log::warn!("Asset id '{new}' is already used");
            return false;
        }
        let Some(mut record) = self.records.remove(old) else {
            return false;
        };
        record.set(field::ASSET_ID, new);
        self.records.insert(new.to_string(), record);

        self.dirty.remove(old);
        if self.placeholder.as_deref() == Some(old) {
            self.placeholder = None;
        } else {
            self.deleted.insert(old.to_string());
        }
        if let Some(slot) = self.visible.iter_mut().find(|k| k.as_str() == old) {
            *slot = new.to_string();
        }
        self.touch(new);
        true
    }

    /// Delete rows of the current page. Returns the number deleted.
    pub fn delete_rows(&mut self, rows: &[usize]) -> usize {
        let mut keys: Vec<String> = Vec::new();
        for &row in rows {
            match self.key_at(row) {
                Some(key) if !keys.contains(key) => keys.push(key.clone()),
                Some(_) => {}
                None => log::warn!("Row {row} is not on the current page"),
            }
        }

        for key in &keys {
            self.records.remove(key);
            self.dirty.remove(key);
            if self.placeholder.as_deref() == Some(key.as_str()) {
                self.placeholder = None;
            } else {
                self.deleted.insert(key.clone());
                self.unsaved = true;
            }
        }
        self.visible.retain(|k| !keys.contains(k));
        self.paginate(self.page_size);
        keys.len()
    }

    /// Add a row, projected to the backend's columns. A missing or taken asset
    /// id is replaced by a placeholder id. The new row is dirty and shown on
    /// the last page. Returns its asset id.
    pub fn add_row(&mut self, record: Option<Record>) -> String {
        let mut row = match record {
            Some(r) => r.project(self.kind()),
            None => self.backend.create_empty_row(),
        };
        let key = match row.asset_id() {
            Some(id) if !self.records.contains_key(id) => id.to_string(),
            _ => placeholder_id(|id| self.records.contains_key(id)),
        };
        row.set(field::ASSET_ID, key.as_str());

        self.records.insert(key.clone(), row);
        self.visible.push(key.clone());
        self.touch(&key);
        self.paginate(self.page_size);
        self.last_page();
        key
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write the dirty and deleted rows through the backend.
    ///
    /// On a complete save both sets are cleared. When the backend reports
    /// per-row failures only the saved keys are cleared and the report is
    /// returned for the caller to show. A backend error leaves the sets as
    /// they were.
    pub fn save(&mut self) -> Result<SaveReport, VaultError> {
        let plan = WritePlan::Incremental {
            dirty: self.dirty.clone(),
            deleted: self.deleted.clone(),
        };
        let report = match &self.placeholder {
            Some(placeholder) => {
                let without: BTreeMap<String, Record> = self
                    .records
                    .iter()
                    .filter(|(k, _)| *k != placeholder)
                    .map(|(k, r)| (k.clone(), r.clone()))
                    .collect();
                self.backend.write_all(&without, &plan)?
            }
            None => self.backend.write_all(&self.records, &plan)?,
        };

        if report.is_complete() {
            self.dirty.clear();
            self.deleted.clear();
            self.unsaved = false;
        } else {
            for key in &report.saved {
                self.dirty.remove(key);
            }
            for key in &report.deleted {
                self.deleted.remove(key);
            }
            log::warn!("{} rows could not be saved", report.failed.len());
        }
        Ok(report)
    }

    /// Reload from the backend, dropping unsaved changes. The filter stays.
    pub fn reload(&mut self) -> Result<(), VaultError> {
        self.dirty.clear();
        self.deleted.clear();
        self.unsaved = false;
        self.load()
    }

    /// Write some fields of some rows of the current page to a CSV file.
    /// An empty field list exports every column.
    pub fn export_rows(
        &self,
        rows: &[usize],
        fields: &[&str],
        destination: &Path,
    ) -> Result<usize, VaultError> {
        let records: Vec<&Record> = rows
            .iter()
            .filter_map(|&row| self.key_at(row))
            .filter_map(|k| self.records.get(k))
            .collect();
        let columns: Vec<&str> = if fields.is_empty() {
            self.columns.iter().map(String::as_str).collect()
        } else {
            fields.to_vec()
        };
        Ok(self
            .backend
            .export_subset(&records, &columns, destination)?)
    }

    /// Close the backend, discarding unsaved changes.
    pub fn close(mut self) -> Result<(), VaultError> {
        if self.unsaved {
            log::warn!("Closing with unsaved changes");
        }
        self.backend.close()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
