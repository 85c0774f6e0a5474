use rusqlite::Connection;
use tempfile::TempDir;
use uevault_catalog::schema::{self as registry, BackendKind};
use uevault_db::schema::{CURRENT_VERSION, asset_columns, get_schema_version};
use uevault_db::queries::count_assets;
use uevault_db::{open_database, open_memory};

fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

#[test]
fn memory_schema_has_registry_columns() {
    let conn = open_memory().unwrap();
    let columns = table_columns(&conn, "assets");
    for spec in asset_columns() {
        assert!(columns.iter().any(|c| c == spec.column), "missing {}", spec.column);
    }
    assert!(!columns.iter().any(|c| c == "tags"));
    assert!(!columns.iter().any(|c| c == "compatible_versions"));
    assert_eq!(
        asset_columns().count() + 1,
        registry::field_count(BackendKind::Relational)
    );
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn open_database_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.db");
    drop(open_database(&path).unwrap());
    let conn = open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    assert!(table_columns(&conn, "asset_tags").contains(&"tag_id".to_string()));
}

#[test]
fn reopening_records_the_version_once() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("assets.db");
    drop(open_database(&path).unwrap());
    drop(open_database(&path).unwrap());
    let conn = open_database(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(get_schema_version(&conn).unwrap(), 1);
    assert!(table_columns(&conn, "assets").contains(&"added_manually".to_string()));
}

#[test]
fn count_follows_inserts_and_deletes() {
    let conn = open_memory().unwrap();
    assert_eq!(count_assets(&conn).unwrap(), 0);
    conn.execute_batch(
        "INSERT INTO assets (asset_id) VALUES ('a1');
         INSERT INTO assets (asset_id) VALUES ('b2');",
    )
    .unwrap();
    assert_eq!(count_assets(&conn).unwrap(), 2);
    conn.execute("DELETE FROM assets WHERE asset_id = 'a1'", []).unwrap();
    assert_eq!(count_assets(&conn).unwrap(), 1);
}

#[test]
fn newer_database_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("future.db");
    {
        let conn = open_database(&path).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();
    }
    assert!(open_database(&path).is_err());
}
