//! SQLite schema creation and migration.
//!
//! The `assets` table is generated from the field registry: one column per
//! relational field except `Tags`, which lives in `tags` + `asset_tags`.

use rusqlite::Connection;
use thiserror::Error;
use uevault_catalog::schema::{self, BackendKind, FieldSpec, ValueType, field};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// Relational fields stored as columns of `assets`, in registry order.
pub fn asset_columns() -> impl Iterator<Item = &'static FieldSpec> {
    schema::specs_for(BackendKind::Relational).filter(|f| f.name != field::TAGS)
}

fn sql_type(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Integer => "INTEGER",
        ValueType::Float => "REAL",
        ValueType::Bool => "BOOLEAN",
        ValueType::Text | ValueType::DateTime | ValueType::List => "TEXT",
    }
}

fn assets_table_sql() -> String {
    let columns: Vec<String> = asset_columns()
        .map(|f| {
            if f.name == field::ASSET_ID {
                format!("    {} TEXT PRIMARY KEY", f.column)
            } else {
                format!("    {} {}", f.column, sql_type(f.value_type))
            }
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS assets (\n{},\n    updated_at TEXT NOT NULL DEFAULT (datetime('now'))\n);",
        columns.join(",\n")
    )
}

/// Create all tables and indexes if they don't exist.
///
/// This is idempotent: safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_VERSION_SQL)?;
    conn.execute_batch(&assets_table_sql())?;
    conn.execute_batch(AUX_TABLES_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create an asset database at the given path.
pub fn open_database(path: &std::path::Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version < CURRENT_VERSION {
        migrate(&conn, version)?;
    } else if version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: version,
        });
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
pub fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Run migrations from `from_version` up to `CURRENT_VERSION`.
fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    let mut version = from_version;
    while version < CURRENT_VERSION {
        // Upgrade steps keyed by the version they start from go here.
        version += 1;
        set_schema_version(conn, version)?;
        log::info!("Migrated asset database to schema version {version}");
    }

    Ok(())
}

const SCHEMA_VERSION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const AUX_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS asset_tags (
    asset_id TEXT NOT NULL REFERENCES assets(asset_id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (asset_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_assets_app_name ON assets(app_name);
CREATE INDEX IF NOT EXISTS idx_asset_tags_tag ON asset_tags(tag_id);
"#;
