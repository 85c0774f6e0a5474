use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use super::*;
use crate::filter::FilterEngine;
use tempfile::TempDir;
use uevault_catalog::codec::{FieldDefaults, empty_record};
use uevault_db::{
    BackendOptions, BackendState, FlatFileBackend, LoadedDataset, PLACEHOLDER_PREFIX,
    SqliteBackend,
};

fn asset(id: &str, price: f64) -> Record {
    let mut record = empty_record(&FieldDefaults::default()).project(BackendKind::FlatFile);
    record.set(field::ASSET_ID, id);
    record.set(field::APP_TITLE, format!("Title {id}"));
    record.set(field::PRICE, price);
    record
}

fn flat_with(tmp: &TempDir, ids: &[&str]) -> (PathBuf, Box<dyn StorageBackend>) {
    let path = tmp.path().join("assets.csv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    backend.load_all().unwrap();
    let records: BTreeMap<String, Record> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), asset(id, i as f64 + 1.0)))
        .collect();
    backend.write_all(&records, &WritePlan::Full).unwrap();
    (path, Box::new(backend))
}

/// Relational stand-in that refuses to save keys starting with "bad".
struct PickyBackend {
    stored: BTreeMap<String, Record>,
    state: BackendState,
    writes: Rc<RefCell<Vec<WritePlan>>>,
}

impl PickyBackend {
    fn new(ids: &[&str]) -> Self {
        Self {
            stored: ids
                .iter()
                .map(|id| (id.to_string(), asset(id, 1.0).project(BackendKind::Relational)))
                .collect(),
            state: BackendState::Uninitialized,
            writes: Rc::default(),
        }
    }
}

impl StorageBackend for PickyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn location(&self) -> &Path {
        Path::new(":picky:")
    }

    fn load_all(&mut self) -> Result<LoadedDataset, StorageError> {
        self.state = BackendState::Loaded;
        Ok(LoadedDataset {
            records: self.stored.clone(),
            columns: Vec::new(),
        })
    }

    fn start_empty(&mut self) -> Result<(), StorageError> {
        self.stored.clear();
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn load_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Record>, StorageError> {
        Ok(self.stored.values().skip(offset).take(limit).cloned().collect())
    }

    fn insert(&mut self, record: &Record) -> Result<(), StorageError> {
        let key = record.asset_id().ok_or(StorageError::MissingKey)?;
        self.stored.insert(key.to_string(), record.clone());
        Ok(())
    }

    fn update(&mut self, record: &Record) -> Result<(), StorageError> {
        self.insert(record)
    }

    fn delete(&mut self, asset_id: &str) -> Result<bool, StorageError> {
        Ok(self.stored.remove(asset_id).is_some())
    }

    fn write_all(
        &mut self,
        records: &BTreeMap<String, Record>,
        plan: &WritePlan,
    ) -> Result<SaveReport, StorageError> {
        self.writes.borrow_mut().push(plan.clone());
        let WritePlan::Incremental { dirty, deleted } = plan else {
            return Err(StorageError::invalid_state("full write", self.state));
        };
        let mut report = SaveReport::default();
        for key in dirty {
            if key.starts_with("bad") {
                report.failed.push((key.clone(), "refused".to_string()));
            } else if let Some(record) = records.get(key) {
                self.stored.insert(key.clone(), record.clone());
                report.saved.push(key.clone());
            }
        }
        for key in deleted {
            self.stored.remove(key);
            report.deleted.push(key.clone());
        }
        Ok(report)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.state = BackendState::Closed;
        Ok(())
    }
}

#[test]
fn empty_source_shows_one_placeholder_row() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    let backend = FlatFileBackend::new(&path, &BackendOptions::default());
    let mut view = DatasetView::open(Box::new(backend), 10).unwrap();

    assert!(view.is_placeholder_only());
    assert_eq!(view.total_pages(), 1);
    assert_eq!(view.page_keys(), [PLACEHOLDER_PREFIX.to_string()]);
    assert!(!view.has_unsaved_changes());

    // An untouched placeholder is never written.
    view.save().unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains(PLACEHOLDER_PREFIX));
}

#[test]
fn unreadable_source_falls_back_to_placeholder() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    fs::write(&path, "Name\nbroken\n").unwrap();
    let backend = FlatFileBackend::new(&path, &BackendOptions::default());
    let mut view = DatasetView::open(Box::new(backend), 10).unwrap();

    assert!(view.is_placeholder_only());
    assert_eq!(view.backend().state(), BackendState::Loaded);

    assert!(view.set_cell(0, field::ASSET_ID, "fresh"));
    view.save().unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("fresh,"));
}

#[test]
fn pagination_bounds_and_navigation() {
    let tmp = TempDir::new().unwrap();
    let (_, backend) = flat_with(&tmp, &["a", "b", "c", "d", "e"]);
    let mut view = DatasetView::open(backend, 2).unwrap();

    assert_eq!(view.total_pages(), 3);
    assert_eq!(view.page_rows().len(), 2);
    assert!(!view.prev_page());
    assert!(view.next_page());
    assert_eq!(view.page_keys(), ["c".to_string(), "d".to_string()]);
    view.last_page();
    assert_eq!(view.page_rows().len(), 1);
    assert!(!view.next_page());
    assert_eq!(view.go_to_page(99), 3);
    view.first_page();
    assert_eq!(view.current_page(), 1);

    view.last_page();
    view.paginate(4);
    assert_eq!(view.total_pages(), 2);
    assert_eq!(view.current_page(), 2);

    view.paginate(0);
    assert_eq!(view.total_pages(), 1);
    assert_eq!(view.page_rows().len(), 5);
}

#[test]
fn filter_narrows_rows_and_resets_page() {
    let tmp = TempDir::new().unwrap();
    let (_, backend) = flat_with(&tmp, &["a", "b", "c", "d", "e"]);
    let mut view = DatasetView::open(backend, 2).unwrap();
    view.last_page();

    let engine = FilterEngine::new();
    view.apply_filter(Some(engine.compile("price >= 4").unwrap()));
    assert_eq!(view.current_page(), 1);
    assert_eq!(view.filtered_len(), 2);
    assert_eq!(view.page_keys(), ["d".to_string(), "e".to_string()]);

    view.apply_filter(Some(engine.compile("price > 100").unwrap()));
    assert_eq!(view.total_pages(), 1);
    assert!(view.page_rows().is_empty());

    view.apply_filter(None);
    assert_eq!(view.filtered_len(), 5);
}

#[test]
fn set_cell_coerces_and_marks_dirty() {
    let tmp = TempDir::new().unwrap();
    let (_, backend) = flat_with(&tmp, &["a", "b", "c"]);
    let mut view = DatasetView::open(backend, 2).unwrap();

    assert!(view.set_cell(1, "price", "12.5"));
    assert_eq!(view.record("b").unwrap().get(field::PRICE), Some(&FieldValue::Float(12.5)));
    assert!(view.set_cell(0, "Must buy", "yes"));
    assert_eq!(view.record("a").unwrap().get(field::MUST_BUY), Some(&FieldValue::Bool(true)));

    assert!(view.set_cell(0, field::STARS, "lots"));
    assert_eq!(
        view.record("a").unwrap().get(field::STARS),
        Some(&FieldValue::text("lots"))
    );

    assert!(!view.set_cell(5, field::COMMENT, "x"));
    assert!(!view.set_cell(0, "No such column", "x"));
    assert!(!view.set_cell(0, field::TAGS, "x"));

    assert_eq!(view.dirty_rows(), vec![0, 1]);
    assert!(view.has_unsaved_changes());
}

#[test]
fn editing_the_asset_id_rekeys_the_row() {
    let tmp = TempDir::new().unwrap();
    let (path, backend) = flat_with(&tmp, &["a", "b"]);
    let mut view = DatasetView::open(backend, 10).unwrap();

    assert!(!view.set_cell(0, field::ASSET_ID, "b"));
    assert!(!view.set_cell(0, field::ASSET_ID, "  "));
    assert!(view.set_cell(0, field::ASSET_ID, "z"));

    assert!(view.record("a").is_none());
    assert_eq!(view.record("z").unwrap().asset_id(), Some("z"));
    assert!(view.deleted_keys().contains("a"));
    assert!(view.dirty_keys().contains("z"));
    assert_eq!(view.page_keys()[0], "z");

    view.save().unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("\na,"));
    assert!(text.contains("\nz,"));
    assert!(view.deleted_keys().is_empty());
}

#[test]
fn delete_and_add_rows_through_sqlite() {
    let mut backend = SqliteBackend::in_memory().unwrap();
    backend.load_all().unwrap();
    let records: BTreeMap<String, Record> = ["a", "b", "c"]
        .iter()
        .map(|id| (id.to_string(), asset(id, 2.0).project(BackendKind::Relational)))
        .collect();
    backend.write_all(&records, &WritePlan::Full).unwrap();
    let mut view = DatasetView::open(Box::new(backend), 10).unwrap();

    assert_eq!(view.delete_rows(&[1, 1, 7]), 1);
    assert!(view.deleted_keys().contains("b"));

    let key = view.add_row(None);
    assert_eq!(key, PLACEHOLDER_PREFIX);
    let second = view.add_row(Some(asset("a", 9.0)));
    assert_eq!(second, format!("{PLACEHOLDER_PREFIX}_1"));
    assert_eq!(view.page_keys().last(), Some(&second));

    let report = view.save().unwrap();
    assert!(report.is_complete());
    assert_eq!(report.deleted, vec!["b"]);
    assert!(view.dirty_keys().is_empty());
    assert!(!view.has_unsaved_changes());

    view.reload().unwrap();
    let keys: Vec<&str> = view.records().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a", "c", PLACEHOLDER_PREFIX, second.as_str()]);
    assert!(view.record("a").unwrap().schema_check(BackendKind::Relational).is_ok());
}

#[test]
fn partial_failures_keep_only_unsaved_keys() {
    let backend = PickyBackend::new(&["good", "bad1", "gone"]);
    let mut view = DatasetView::open(Box::new(backend), 10).unwrap();
    // Rows sort as bad1, gone, good.
    assert!(view.set_cell(0, field::COMMENT, "x"));
    assert!(view.set_cell(2, field::COMMENT, "y"));
    assert_eq!(view.delete_rows(&[1]), 1);

    let report = view.save().unwrap();
    assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec!["bad1"]);
    assert_eq!(report.saved, vec!["good"]);
    assert_eq!(view.dirty_keys().iter().collect::<Vec<_>>(), vec!["bad1"]);
    assert!(view.deleted_keys().is_empty());
    assert!(view.has_unsaved_changes());
}

#[test]
fn save_plan_carries_exactly_the_changed_keys() {
    let backend = PickyBackend::new(&["a", "b", "c"]);
    let writes = backend.writes.clone();
    let mut view = DatasetView::open(Box::new(backend), 10).unwrap();
    view.set_cell(0, field::COMMENT, "x");
    view.delete_rows(&[2]);
    view.save().unwrap();
    view.save().unwrap();

    assert_eq!(
        *writes.borrow(),
        vec![
            WritePlan::incremental(["a".to_string()], ["c".to_string()]),
            WritePlan::incremental(Vec::new(), Vec::new()),
        ]
    );
}

#[test]
fn flat_write_failure_leaves_sets_untouched() {
    let tmp = TempDir::new().unwrap();
    let (path, backend) = flat_with(&tmp, &["a"]);
    let mut view = DatasetView::open(backend, 10).unwrap();
    view.set_cell(0, field::COMMENT, "x");

    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
    fs::write(path.join("blocker"), "").unwrap();

    assert!(view.save().is_err());
    assert!(view.dirty_keys().contains("a"));
    assert!(view.has_unsaved_changes());
}

#[test]
fn reload_discards_changes() {
    let tmp = TempDir::new().unwrap();
    let (_, backend) = flat_with(&tmp, &["a", "b"]);
    let mut view = DatasetView::open(backend, 10).unwrap();
    view.set_cell(0, field::COMMENT, "draft");
    view.delete_rows(&[1]);

    view.reload().unwrap();
    assert_eq!(view.records().len(), 2);
    assert_eq!(view.record("a").unwrap().get(field::COMMENT), Some(&FieldValue::Empty));
    assert!(view.dirty_keys().is_empty() && view.deleted_keys().is_empty());
    assert!(!view.has_unsaved_changes());
}

#[test]
fn export_selected_rows() {
    let tmp = TempDir::new().unwrap();
    let (_, backend) = flat_with(&tmp, &["a", "b", "c"]);
    let view = DatasetView::open(backend, 10).unwrap();
    let dest = tmp.path().join("selection.csv");

    let written = view
        .export_rows(&[0, 2], &[field::ASSET_ID, field::PRICE], &dest)
        .unwrap();
    assert_eq!(written, 2);
    let text = fs::read_to_string(&dest).unwrap();
    assert_eq!(text, "Asset_id,Price\na,1.0\nc,3.0\n");
}
