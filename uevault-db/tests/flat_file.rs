use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use tempfile::TempDir;
use uevault_catalog::codec::{FieldDefaults, empty_record};
use uevault_catalog::schema::{self, BackendKind};
use uevault_catalog::{FieldValue, Record, field};
use uevault_db::*;

fn asset(id: &str, price: f64, comment: &str) -> Record {
    let mut record = empty_record(&FieldDefaults::default()).project(BackendKind::FlatFile);
    record.set(field::ASSET_ID, id);
    record.set(field::APP_NAME, format!("{id}_app"));
    record.set(field::PRICE, price);
    if !comment.is_empty() {
        record.set(field::COMMENT, comment);
    }
    record.set(field::MUST_BUY, true);
    record.set(field::ORIGIN, FieldValue::List(vec!["Marketplace".into(), "D:/Vault".into()]));
    record.set(field::STARS, 4i64);
    record
}

fn dataset(records: &[Record]) -> BTreeMap<String, Record> {
    records
        .iter()
        .map(|r| (r.asset_id().unwrap().to_string(), r.clone()))
        .collect()
}

#[test]
fn absent_and_empty_files_load_as_empty() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    assert_eq!(backend.state(), BackendState::Uninitialized);

    let loaded = backend.load_all().unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.columns.len(), schema::field_count(BackendKind::FlatFile));
    assert_eq!(backend.state(), BackendState::Loaded);

    fs::write(&path, "").unwrap();
    assert!(backend.load_all().unwrap().is_empty());
}

#[test]
fn write_then_reload_round_trips() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    backend.load_all().unwrap();

    let records = dataset(&[asset("b2", 8.0, ""), asset("a1", 19.99, "nice, really")]);
    let report = backend.write_all(&records, &WritePlan::Full).unwrap();
    assert_eq!(report.saved, vec!["a1", "b2"]);

    let text = fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(header, schema::fields_for(BackendKind::FlatFile).join(","));
    assert!(text.lines().nth(1).unwrap().starts_with("a1,"));
    assert!(text.contains("True"));

    let reloaded = backend.load_all().unwrap();
    assert_eq!(reloaded.records, records);
    for name in schema::user_fields() {
        assert_eq!(reloaded.records["a1"].get(name), records["a1"].get(name));
    }
}

#[test]
fn tab_separated_by_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.tsv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    backend.load_all().unwrap();
    backend
        .write_all(&dataset(&[asset("a1", 1.0, "")]), &WritePlan::Full)
        .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Asset_id\tApp name\t"));
    assert_eq!(backend.load_all().unwrap().records.len(), 1);
}

#[test]
fn header_without_key_is_a_read_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    fs::write(&path, "Name,Price\nfoo,1.0\n").unwrap();
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    let err = backend.load_all().unwrap_err();
    assert!(err.is_read());
    assert_eq!(backend.state(), BackendState::Uninitialized);
}

#[test]
fn empty_markers_and_short_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    fs::write(&path, "Asset_id,Comment,Price\nA1,None,nan\nC1\n").unwrap();
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    let loaded = backend.load_all().unwrap();

    assert_eq!(loaded.records["A1"].get(field::COMMENT), Some(&FieldValue::Empty));
    assert_eq!(loaded.records["A1"].get(field::PRICE), Some(&FieldValue::Empty));
    assert_eq!(loaded.records["C1"].len(), 1);
}

#[test]
fn operations_need_a_loaded_backend() {
    let tmp = TempDir::new().unwrap();
    let mut backend = FlatFileBackend::new(tmp.path().join("a.csv"), &BackendOptions::default());
    let err = backend
        .write_all(&BTreeMap::new(), &WritePlan::Full)
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidState {
            state: BackendState::Uninitialized,
            ..
        }
    ));

    backend.load_all().unwrap();
    backend.close().unwrap();
    assert!(backend.load_all().is_err());
    assert!(backend.delete("x").is_err());
}

#[test]
fn single_row_operations_rewrite_the_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    backend.load_all().unwrap();

    backend.insert(&asset("a1", 1.0, "")).unwrap();
    backend.insert(&asset("b2", 2.0, "")).unwrap();
    assert!(matches!(
        backend.insert(&asset("a1", 3.0, "")),
        Err(StorageError::DuplicateKey(_))
    ));

    backend.update(&asset("a1", 5.0, "edited")).unwrap();
    assert!(matches!(
        backend.update(&asset("zz", 5.0, "")),
        Err(StorageError::NotFound(_))
    ));
    assert!(backend.delete("b2").unwrap());
    assert!(!backend.delete("b2").unwrap());

    let page = backend.load_page(0, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].get_text(field::COMMENT), Some("edited"));
}

#[test]
fn incremental_plan_still_rewrites_everything() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    backend.load_all().unwrap();
    backend
        .write_all(&dataset(&[asset("a1", 1.0, ""), asset("b2", 2.0, "")]), &WritePlan::Full)
        .unwrap();

    let remaining = dataset(&[asset("a1", 1.5, "")]);
    let plan = WritePlan::Incremental {
        dirty: BTreeSet::new(),
        deleted: BTreeSet::from(["b2".to_string()]),
    };
    let report = backend.write_all(&remaining, &plan).unwrap();
    assert_eq!(report.deleted, vec!["b2"]);

    let reloaded = backend.load_all().unwrap();
    assert_eq!(reloaded.records.len(), 1);
    assert_eq!(reloaded.records["a1"].get(field::PRICE), Some(&FieldValue::Float(1.5)));
}

#[test]
fn backup_on_save_keeps_previous_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    fs::write(&path, "Asset_id\nold\n").unwrap();
    let options = BackendOptions {
        backup_on_save: true,
        ..BackendOptions::default()
    };
    let mut backend = FlatFileBackend::new(&path, &options);
    backend.load_all().unwrap();
    backend
        .write_all(&dataset(&[asset("a1", 1.0, "")]), &WritePlan::Full)
        .unwrap();

    let backups: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("assets.BACKUP_"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].ends_with(".csv"));
    let backup = fs::read_to_string(tmp.path().join(&backups[0])).unwrap();
    assert_eq!(backup, "Asset_id\nold\n");
}

#[test]
fn open_backend_picks_by_extension() {
    let tmp = TempDir::new().unwrap();
    let options = BackendOptions::default();
    assert_eq!(
        open_backend(tmp.path().join("a.csv"), &options).kind(),
        BackendKind::FlatFile
    );
    assert_eq!(
        open_backend(tmp.path().join("a.db"), &options).kind(),
        BackendKind::Relational
    );
    assert_eq!(
        kind_for_path(std::path::Path::new("x.SQLITE3")),
        BackendKind::Relational
    );
}

#[test]
fn empty_row_has_backend_columns() {
    let tmp = TempDir::new().unwrap();
    let backend = FlatFileBackend::new(tmp.path().join("a.csv"), &BackendOptions::default());
    let row = backend.create_empty_row();
    assert!(row.schema_check(BackendKind::FlatFile).is_ok());
    assert_eq!(row.asset_id(), Some(PLACEHOLDER_PREFIX));

    assert_eq!(placeholder_id(|_| false), PLACEHOLDER_PREFIX);
    let taken = [PLACEHOLDER_PREFIX.to_string(), format!("{PLACEHOLDER_PREFIX}_1")];
    assert_eq!(
        placeholder_id(|id| taken.iter().any(|t| t == id)),
        format!("{PLACEHOLDER_PREFIX}_2")
    );
}

#[test]
fn start_empty_sets_unreadable_file_aside() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.csv");
    fs::write(&path, "Name\nbroken\n").unwrap();
    let mut backend = FlatFileBackend::new(&path, &BackendOptions::default());
    assert!(backend.load_all().unwrap_err().is_read());

    backend.start_empty().unwrap();
    assert_eq!(backend.state(), BackendState::Loaded);
    backend
        .write_all(&dataset(&[asset("a1", 1.0, "")]), &WritePlan::Full)
        .unwrap();

    let names: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("assets.BACKUP_")));
    assert_eq!(backend.load_all().unwrap().records.len(), 1);
}
