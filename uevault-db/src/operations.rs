//! Write operations on the asset database.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;
use uevault_catalog::schema::{self, FieldSpec, ValueType};
use uevault_catalog::{FieldValue, Record, field};

use crate::schema::asset_columns;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Record has no asset id")]
    MissingKey,
}

/// SQL value of a field. Lists are stored comma joined, dates as text.
pub fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Empty => Value::Null,
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Float(f) => Value::Real(*f),
        FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
        FieldValue::DateTime(_) | FieldValue::List(_) => Value::Text(value.to_cell()),
    }
}

/// SQL value of a field for its column. Text columns always receive text.
fn column_value(spec: &FieldSpec, value: &FieldValue) -> Value {
    match (spec.value_type, value) {
        (_, FieldValue::Empty) => Value::Null,
        (ValueType::Text, other) => Value::Text(other.to_cell()),
        _ => to_sql_value(value),
    }
}

fn upsert_sql() -> String {
    let columns: Vec<&str> = asset_columns().map(|f| f.column).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != "asset_id")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO assets ({}) VALUES ({})
         ON CONFLICT(asset_id) DO UPDATE SET {}, updated_at = datetime('now')",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Insert or update one asset and its tags.
pub fn upsert_asset(conn: &Connection, record: &Record) -> Result<(), OperationError> {
    let asset_id = record.asset_id().ok_or(OperationError::MissingKey)?;
    let values: Vec<Value> = asset_columns()
        .map(|f| record.get(f.name).map_or(Value::Null, |v| column_value(f, v)))
        .collect();
    conn.execute(&upsert_sql(), params_from_iter(values))?;

    let tags = match record.get(field::TAGS) {
        Some(FieldValue::List(tags)) => tags.clone(),
        Some(other) if !other.is_empty() => uevault_catalog::record::split_list(&other.to_cell()),
        _ => Vec::new(),
    };
    set_tags(conn, asset_id, &tags)?;
    Ok(())
}

/// Replace the tags linked to an asset.
pub fn set_tags(conn: &Connection, asset_id: &str, tags: &[String]) -> Result<(), OperationError> {
    conn.execute(
        "DELETE FROM asset_tags WHERE asset_id = ?1",
        params![asset_id],
    )?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
            params![tag],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO asset_tags (asset_id, tag_id)
             SELECT ?1, id FROM tags WHERE name = ?2",
            params![asset_id, tag],
        )?;
    }
    Ok(())
}

/// Delete an asset. Returns whether a row was removed.
pub fn delete_asset(conn: &Connection, asset_id: &str) -> Result<bool, OperationError> {
    conn.execute(
        "DELETE FROM asset_tags WHERE asset_id = ?1",
        params![asset_id],
    )?;
    let n = conn.execute("DELETE FROM assets WHERE asset_id = ?1", params![asset_id])?;
    Ok(n > 0)
}

pub fn asset_exists(conn: &Connection, asset_id: &str) -> Result<bool, OperationError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM assets WHERE asset_id = ?1",
            params![asset_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Overwrite the user fields of an existing asset. Fields the record does not
/// carry are left alone. Returns whether the asset exists.
pub fn update_user_fields(conn: &Connection, record: &Record) -> Result<bool, OperationError> {
    let asset_id = record.asset_id().ok_or(OperationError::MissingKey)?;
    let specs: Vec<_> = schema::all_fields()
        .iter()
        .filter(|f| f.is_user_field() && record.contains(f.name))
        .collect();
    if specs.is_empty() {
        return asset_exists(conn, asset_id);
    }

    let sets: Vec<String> = specs
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = ?{}", f.column, i + 1))
        .collect();
    let sql = format!(
        "UPDATE assets SET {}, updated_at = datetime('now') WHERE asset_id = ?{}",
        sets.join(", "),
        specs.len() + 1
    );
    let mut values: Vec<Value> = specs
        .iter()
        .map(|f| match record.get(f.name) {
            // User CSVs may hold ints for bool columns and the like.
            Some(v) => match v.clone().coerce(f.value_type) {
                Ok(typed) => to_sql_value(&typed),
                Err(e) => {
                    log::warn!("{asset_id}: {e}");
                    to_sql_value(v)
                }
            },
            None => Value::Null,
        })
        .collect();
    values.push(Value::Text(asset_id.to_string()));
    let n = conn.execute(&sql, params_from_iter(values))?;
    Ok(n > 0)
}
