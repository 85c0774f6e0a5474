//! Read queries for the asset database.

use std::collections::BTreeMap;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row, params};
use uevault_catalog::codec::decode_cell;
use uevault_catalog::schema::{FieldSpec, ValueType};
use uevault_catalog::{FieldValue, Record, field};

use crate::operations::OperationError;
use crate::schema::asset_columns;

fn select_sql(suffix: &str) -> String {
    let columns: Vec<&str> = asset_columns().map(|f| f.column).collect();
    format!("SELECT {} FROM assets {suffix}", columns.join(", "))
}

/// Convert a stored SQL value back to the field's type. Values that do not
/// fit are kept as text and logged.
fn from_sql_value(spec: &FieldSpec, value: ValueRef<'_>) -> FieldValue {
    match (value, spec.value_type) {
        (ValueRef::Null, _) => FieldValue::Empty,
        (ValueRef::Integer(i), ValueType::Bool) => FieldValue::Bool(i != 0),
        (ValueRef::Integer(i), ValueType::Float) => FieldValue::Float(i as f64),
        (ValueRef::Integer(i), ValueType::Integer) => FieldValue::Integer(i),
        (ValueRef::Real(f), ValueType::Float) => FieldValue::Float(f),
        (ValueRef::Integer(i), _) => FieldValue::Text(i.to_string()),
        (ValueRef::Real(f), _) => parse_or_text(spec, &f.to_string()),
        (ValueRef::Text(bytes), _) => parse_or_text(spec, &String::from_utf8_lossy(bytes)),
        (ValueRef::Blob(_), _) => {
            log::warn!("Column {} holds a blob, ignored", spec.column);
            FieldValue::Empty
        }
    }
}

fn parse_or_text(spec: &FieldSpec, raw: &str) -> FieldValue {
    match decode_cell(spec.name, raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("{e}");
            FieldValue::Text(raw.to_string())
        }
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, spec) in asset_columns().enumerate() {
        let value = from_sql_value(spec, row.get_ref(i)?);
        record.set(spec.name, value);
    }
    Ok(record)
}

/// Every tag, grouped by asset id.
pub fn all_tags(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT at.asset_id, t.name FROM asset_tags at
         JOIN tags t ON t.id = at.tag_id
         ORDER BY at.asset_id, t.name",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let (asset_id, name) = row?;
        tags.entry(asset_id).or_default().push(name);
    }
    Ok(tags)
}

/// Tags of one asset, sorted by name.
pub fn tags_for(conn: &Connection, asset_id: &str) -> Result<Vec<String>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM asset_tags at
         JOIN tags t ON t.id = at.tag_id
         WHERE at.asset_id = ?1 ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![asset_id], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn attach_tags(record: &mut Record, tags: Vec<String>) {
    let value = if tags.is_empty() {
        FieldValue::Empty
    } else {
        FieldValue::List(tags)
    };
    record.set(field::TAGS, value);
}

/// Every asset, ordered by asset id.
pub fn load_assets(conn: &Connection) -> Result<Vec<Record>, OperationError> {
    let mut tags = all_tags(conn)?;
    let mut stmt = conn.prepare(&select_sql("ORDER BY asset_id"))?;
    let rows = stmt.query_map([], row_to_record)?;
    let mut records = Vec::new();
    for row in rows {
        let mut record = row?;
        let asset_tags = record
            .asset_id()
            .and_then(|id| tags.remove(id))
            .unwrap_or_default();
        attach_tags(&mut record, asset_tags);
        records.push(record);
    }
    Ok(records)
}

/// Assets `offset..offset + limit`, ordered by asset id.
pub fn load_assets_page(
    conn: &Connection,
    offset: usize,
    limit: usize,
) -> Result<Vec<Record>, OperationError> {
    let mut stmt = conn.prepare(&select_sql("ORDER BY asset_id LIMIT ?1 OFFSET ?2"))?;
    let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_record)?;
    let mut records = Vec::new();
    for row in rows {
        let mut record = row?;
        let asset_tags = match record.asset_id() {
            Some(id) => tags_for(conn, id)?,
            None => Vec::new(),
        };
        attach_tags(&mut record, asset_tags);
        records.push(record);
    }
    Ok(records)
}

/// Number of stored assets.
pub fn count_assets(conn: &Connection) -> Result<usize, OperationError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
    Ok(n as usize)
}

/// Every stored asset id, sorted.
pub fn asset_ids(conn: &Connection) -> Result<Vec<String>, OperationError> {
    let mut stmt = conn.prepare("SELECT asset_id FROM assets ORDER BY asset_id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
