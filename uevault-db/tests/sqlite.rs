use std::collections::{BTreeMap, BTreeSet};

use tempfile::TempDir;
use uevault_catalog::codec::{FieldDefaults, empty_record};
use uevault_catalog::schema::BackendKind;
use uevault_catalog::{FieldValue, Record, field};
use uevault_db::*;

fn asset(id: &str, price: f64) -> Record {
    let mut record = empty_record(&FieldDefaults::default()).project(BackendKind::Relational);
    record.set(field::ASSET_ID, id);
    record.set(field::APP_NAME, format!("{id}_app"));
    record.set(field::PRICE, price);
    record.set(field::OWNED, true);
    record.set(field::TAGS, FieldValue::List(vec!["nature".into(), "props".into()]));
    record
}

fn loaded_backend(records: &[Record]) -> SqliteBackend {
    let mut backend = SqliteBackend::in_memory().unwrap();
    backend.load_all().unwrap();
    let map: BTreeMap<String, Record> = records
        .iter()
        .map(|r| (r.asset_id().unwrap().to_string(), r.clone()))
        .collect();
    backend.write_all(&map, &WritePlan::Full).unwrap();
    backend
}

#[test]
fn full_write_then_load() {
    let mut backend = loaded_backend(&[asset("a1", 5.0), asset("b2", 7.5)]);
    let loaded = backend.load_all().unwrap();
    assert_eq!(loaded.records.len(), 2);

    let a1 = &loaded.records["a1"];
    assert_eq!(a1.get(field::PRICE), Some(&FieldValue::Float(5.0)));
    assert_eq!(a1.get(field::OWNED), Some(&FieldValue::Bool(true)));
    assert_eq!(
        a1.get(field::TAGS),
        Some(&FieldValue::List(vec!["nature".into(), "props".into()]))
    );
    assert!(a1.schema_check(BackendKind::Relational).is_ok());
    assert_eq!(a1, &asset("a1", 5.0));
}

#[test]
fn full_write_removes_absent_keys() {
    let mut backend = loaded_backend(&[asset("a1", 5.0), asset("b2", 7.5)]);
    let only_a: BTreeMap<String, Record> = [("a1".to_string(), asset("a1", 6.0))].into();
    let report = backend.write_all(&only_a, &WritePlan::Full).unwrap();
    assert_eq!(report.deleted, vec!["b2"]);
    assert_eq!(backend.load_all().unwrap().records.len(), 1);
}

#[test]
fn incremental_write_touches_only_flagged_keys() {
    let mut backend = loaded_backend(&[asset("a1", 5.0), asset("b2", 7.5), asset("c3", 1.0)]);

    let mut records = backend.load_all().unwrap().records;
    records.get_mut("a1").unwrap().set(field::PRICE, 4.0);
    // Changed in memory but not flagged dirty: must not be written.
    records.get_mut("b2").unwrap().set(field::PRICE, 99.0);
    records.remove("c3");

    let plan = WritePlan::Incremental {
        dirty: BTreeSet::from(["a1".to_string()]),
        deleted: BTreeSet::from(["c3".to_string()]),
    };
    let report = backend.write_all(&records, &plan).unwrap();
    assert_eq!(report.saved, vec!["a1"]);
    assert_eq!(report.deleted, vec!["c3"]);
    assert!(report.is_complete());

    let stored = backend.load_all().unwrap().records;
    assert_eq!(stored["a1"].get(field::PRICE), Some(&FieldValue::Float(4.0)));
    assert_eq!(stored["b2"].get(field::PRICE), Some(&FieldValue::Float(7.5)));
    assert!(!stored.contains_key("c3"));
}

#[test]
fn failed_rows_do_not_roll_back_others() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.db");
    let mut backend = SqliteBackend::new(&path);
    backend.load_all().unwrap();

    // A trigger makes every insert of b2 fail inside its own transaction.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER no_b2 BEFORE INSERT ON assets WHEN NEW.asset_id = 'b2'
         BEGIN SELECT RAISE(ABORT, 'b2 is locked'); END;",
    )
    .unwrap();
    drop(conn);

    let records: BTreeMap<String, Record> = [
        ("a1".to_string(), asset("a1", 1.0)),
        ("b2".to_string(), asset("b2", 2.0)),
        ("c3".to_string(), asset("c3", 3.0)),
    ]
    .into();
    let plan = WritePlan::incremental(
        ["a1".to_string(), "b2".to_string(), "c3".to_string()],
        Vec::new(),
    );
    let report = backend.write_all(&records, &plan).unwrap();
    assert_eq!(report.saved, vec!["a1", "c3"]);
    assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec!["b2"]);
    assert!(report.failed[0].1.contains("b2 is locked"));

    let stored = backend.load_all().unwrap().records;
    assert!(stored.contains_key("a1"));
    assert!(stored.contains_key("c3"));
    assert!(!stored.contains_key("b2"));
    backend.close().unwrap();
}

#[test]
fn single_row_operations() {
    let mut backend = loaded_backend(&[asset("a1", 5.0)]);
    backend.insert(&asset("b2", 1.0)).unwrap();
    assert!(matches!(
        backend.insert(&asset("b2", 1.0)),
        Err(StorageError::DuplicateKey(_))
    ));
    let mut changed = asset("b2", 3.0);
    changed.set(field::TAGS, FieldValue::List(vec!["solo".into()]));
    backend.update(&changed).unwrap();
    assert!(matches!(
        backend.update(&asset("zz", 1.0)),
        Err(StorageError::NotFound(_))
    ));

    let page = backend.load_page(1, 5).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].get(field::PRICE), Some(&FieldValue::Float(3.0)));
    assert_eq!(
        page[0].get(field::TAGS),
        Some(&FieldValue::List(vec!["solo".into()]))
    );

    assert!(backend.delete("b2").unwrap());
    assert!(!backend.delete("b2").unwrap());
}

#[test]
fn state_machine_is_enforced() {
    let mut backend = SqliteBackend::in_memory().unwrap();
    assert!(matches!(
        backend.write_all(&BTreeMap::new(), &WritePlan::Full),
        Err(StorageError::InvalidState { .. })
    ));
    backend.load_all().unwrap();
    backend.load_all().unwrap();
    assert_eq!(backend.state(), BackendState::Loaded);
    backend.close().unwrap();
    assert_eq!(backend.state(), BackendState::Closed);
    assert!(backend.load_all().is_err());
    assert!(backend.insert(&asset("a1", 1.0)).is_err());
}

#[test]
fn corrupt_database_is_a_read_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.db");
    std::fs::write(&path, "not an sqlite file\n".repeat(512)).unwrap();
    let mut backend = SqliteBackend::new(&path);
    assert!(backend.load_all().unwrap_err().is_read());
}

#[test]
fn user_fields_round_trip_through_csv() {
    let tmp = TempDir::new().unwrap();
    let mut backend = loaded_backend(&[asset("a1", 5.0), asset("b2", 7.5)]);

    let csv_path = tmp.path().join("user_fields.csv");
    std::fs::write(
        &csv_path,
        "Asset_id,Comment,Stars,Must buy\na1,great pack,5,True\nghost,x,1,False\n",
    )
    .unwrap();
    assert_eq!(backend.import_user_fields(&csv_path).unwrap(), 1);

    let stored = backend.load_all().unwrap().records;
    assert_eq!(stored["a1"].get_text(field::COMMENT), Some("great pack"));
    assert_eq!(stored["a1"].get(field::STARS), Some(&FieldValue::Integer(5)));
    assert_eq!(stored["a1"].get(field::MUST_BUY), Some(&FieldValue::Bool(true)));
    assert_eq!(stored["a1"].get(field::PRICE), Some(&FieldValue::Float(5.0)));

    let out = tmp.path().join("export.csv");
    assert_eq!(backend.export_user_fields(&out).unwrap(), 2);
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().next().unwrap(), user_field_columns().join(","));
    assert!(text.contains("a1,great pack,5,True"));
}

#[test]
fn start_empty_replaces_corrupt_database() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.db");
    std::fs::write(&path, "not an sqlite file\n".repeat(512)).unwrap();
    let mut backend = SqliteBackend::new(&path);
    assert!(backend.load_all().is_err());

    backend.start_empty().unwrap();
    backend.insert(&asset("a1", 1.0)).unwrap();
    assert_eq!(backend.load_all().unwrap().records.len(), 1);
    let backups = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("assets.BACKUP_"))
        .count();
    assert_eq!(backups, 1);
}

#[test]
fn text_columns_store_non_text_values_in_cell_form() {
    let mut record = asset("a1", 5.0);
    record.set(field::COMMENT, FieldValue::Bool(true));
    record.set(field::TEST_RESULT, FieldValue::Integer(3));
    let mut backend = loaded_backend(&[record]);

    let loaded = backend.load_all().unwrap();
    let a1 = &loaded.records["a1"];
    assert_eq!(a1.get_text(field::COMMENT), Some("True"));
    assert_eq!(a1.get_text(field::TEST_RESULT), Some("3"));
}
