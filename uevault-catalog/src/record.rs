//! Typed asset records.
//!
//! A [`Record`] is an ordered list of `(field name, value)` pairs. Both storage
//! backends and the merge engine work on records; fields are always addressed by
//! name, never by position.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::schema::{self, BackendKind, ValueType, field};

/// Format used to store and display date-time fields.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    List(Vec<String>),
}

/// A value could not be converted to the type the registry declares for it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot read {value:?} as {expected} for field '{field}'")]
pub struct FieldCoercionError {
    pub field: String,
    pub value: String,
    pub expected: ValueType,
}

impl FieldCoercionError {
    pub fn new(field: impl Into<String>, value: impl Into<String>, expected: ValueType) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            expected,
        }
    }
}

/// A record does not carry the field set the registry expects for a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} fields for the {backend} layout, found {found} (missing: {missing:?})")]
pub struct SchemaMismatchError {
    pub backend: BackendKind,
    pub expected: usize,
    pub found: usize,
    pub missing: Vec<&'static str>,
}

/// Parse a boolean written by a human or by one of the backends.
pub fn parse_bool_literal(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse the date formats found in stored files and catalog payloads.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Split a comma separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Parse a stored text cell into the given type. Blank input is `Empty`.
    pub fn parse(raw: &str, value_type: ValueType) -> Result<Self, FieldCoercionError> {
        if raw.trim().is_empty() {
            return Ok(Self::Empty);
        }
        let fail = || FieldCoercionError::new("", raw, value_type);
        match value_type {
            ValueType::Text => Ok(Self::Text(raw.to_string())),
            ValueType::Integer => {
                let trimmed = raw.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Self::Integer(i));
                }
                // "3.0" is what spreadsheet tools write back for integer columns
                match trimmed.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(Self::Integer(f as i64)),
                    _ => Err(fail()),
                }
            }
            ValueType::Float => raw.trim().parse::<f64>().map(Self::Float).map_err(|_| fail()),
            ValueType::Bool => parse_bool_literal(raw).map(Self::Bool).ok_or_else(fail),
            ValueType::DateTime => parse_datetime(raw).map(Self::DateTime).ok_or_else(fail),
            ValueType::List => Ok(Self::List(split_list(raw))),
        }
    }

    /// Convert a value to the given type, going through its text form when needed.
    pub fn coerce(self, value_type: ValueType) -> Result<Self, FieldCoercionError> {
        match (self, value_type) {
            (Self::Empty, _) => Ok(Self::Empty),
            (v @ Self::Text(_), ValueType::Text) => Ok(v),
            (v @ Self::Integer(_), ValueType::Integer) => Ok(v),
            (v @ Self::Float(_), ValueType::Float) => Ok(v),
            (Self::Integer(i), ValueType::Float) => Ok(Self::Float(i as f64)),
            (v @ Self::Bool(_), ValueType::Bool) => Ok(v),
            (v @ Self::DateTime(_), ValueType::DateTime) => Ok(v),
            (v @ Self::List(_), ValueType::List) => Ok(v),
            (other, vt) => Self::parse(&other.to_cell(), vt),
        }
    }

    /// Default value of a type when no data is available.
    pub fn blank(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Text => Self::Text(String::new()),
            ValueType::Integer => Self::Integer(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::Bool => Self::Bool(false),
            ValueType::DateTime => Self::Empty,
            ValueType::List => Self::List(Vec::new()),
        }
    }

    /// Whether the value carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => parse_bool_literal(s),
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used by the flat file: bools as `True`/`False`, lists comma joined.
    pub fn to_cell(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            Self::List(items) => items.join(","),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cell())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// One asset, as an ordered field → value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.set(name, value);
        }
        record
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replace the value of a field, appending the field if it is new.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Text of a text field, if the field exists and holds text.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// The dataset key.
    pub fn asset_id(&self) -> Option<&str> {
        self.get_text(field::ASSET_ID).filter(|s| !s.is_empty())
    }

    /// Copy of this record restricted to the fields a backend stores, in
    /// registry order. Missing fields are `Empty`.
    pub fn project(&self, backend: BackendKind) -> Record {
        let fields = schema::specs_for(backend)
            .map(|spec| {
                let value = self.get(spec.name).cloned().unwrap_or_default();
                (spec.name.to_string(), value)
            })
            .collect();
        Record { fields }
    }

    /// Check that the record carries exactly the fields the registry expects
    /// for a backend.
    pub fn schema_check(&self, backend: BackendKind) -> Result<(), SchemaMismatchError> {
        let expected: Vec<&'static str> = schema::fields_for(backend);
        let missing: Vec<&'static str> = expected
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect();
        if missing.is_empty() && self.len() == expected.len() {
            return Ok(());
        }
        Err(SchemaMismatchError {
            backend,
            expected: expected.len(),
            found: self.len(),
            missing,
        })
    }
}

#[cfg(test)]
#[path = "tests/record_tests.rs"]
mod tests;
