//! Merging freshly fetched records into the stored dataset.
//!
//! The fetch is authoritative for which assets exist and for catalog fields.
//! The stored dataset is authoritative for user fields: a non-empty stored
//! value is never replaced. `Origin` accumulates across merges and `Price`
//! leaves its previous value in `Old price`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use uevault_catalog::record::{FieldCoercionError, SchemaMismatchError, split_list};
use uevault_catalog::schema::{self, BackendKind, FieldSpec, MergeRule, Provenance, ValueType};
use uevault_catalog::{FieldValue, Record};

/// A recoverable problem met during a merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeWarning {
    /// The stored row did not have the backend's field set. It was replaced
    /// by the incoming record.
    SchemaMismatch {
        asset_id: String,
        error: SchemaMismatchError,
    },
    /// A stored value could not be read as its declared type. The incoming
    /// value was kept.
    Coercion {
        asset_id: String,
        error: FieldCoercionError,
    },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch { asset_id, error } => {
                write!(f, "{asset_id}: stored row overwritten, {error}")
            }
            Self::Coercion { asset_id, error } => write!(f, "{asset_id}: {error}"),
        }
    }
}

/// Counters from a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Keys not present before.
    pub added: usize,
    /// Keys merged field by field.
    pub merged: usize,
    /// Keys whose stored row was malformed and replaced.
    pub overwritten: usize,
    /// Stored keys absent from the fetch.
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub merged: BTreeMap<String, Record>,
    pub warnings: Vec<MergeWarning>,
    pub stats: MergeStats,
}

/// Merge an incoming batch into the stored records of a backend.
///
/// Stored keys missing from `incoming` are dropped. Incoming records without
/// an asset id are skipped; a repeated key keeps its first record.
pub fn merge_records(
    incoming: &[Record],
    existing: &BTreeMap<String, Record>,
    backend: BackendKind,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for record in incoming {
        let Some(key) = record.asset_id().map(str::to_string) else {
            log::warn!("Incoming record without asset id skipped");
            continue;
        };
        if outcome.merged.contains_key(&key) {
            log::warn!("Asset {key} appears twice in the batch, first record kept");
            continue;
        }

        let Some(stored) = existing.get(&key) else {
            outcome.stats.added += 1;
            outcome.merged.insert(key, record.clone());
            continue;
        };

        if let Err(error) = stored.schema_check(backend) {
            log::warn!("{key}: inconsistent stored row, using fetched data ({error})");
            outcome.warnings.push(MergeWarning::SchemaMismatch {
                asset_id: key.clone(),
                error,
            });
            outcome.stats.overwritten += 1;
            outcome.merged.insert(key, record.clone());
            continue;
        }

        let (merged, errors) = merge_record(record, stored, backend);
        for error in errors {
            log::warn!("{key}: {error}");
            outcome.warnings.push(MergeWarning::Coercion {
                asset_id: key.clone(),
                error,
            });
        }
        outcome.stats.merged += 1;
        outcome.merged.insert(key, merged);
    }

    outcome.stats.dropped = existing
        .keys()
        .filter(|k| !outcome.merged.contains_key(*k))
        .count();
    if outcome.stats.dropped > 0 {
        log::info!(
            "{} stored assets are not in the fetch and were dropped",
            outcome.stats.dropped
        );
    }
    outcome
}

/// Merge one incoming record with its stored counterpart, field by field in
/// registry order.
pub fn merge_record(
    incoming: &Record,
    stored: &Record,
    backend: BackendKind,
) -> (Record, Vec<FieldCoercionError>) {
    let mut merged = incoming.clone();
    let mut errors = Vec::new();

    // Fields filled by a price-tracking rule must not be reset afterwards.
    let tracked: HashSet<&str> = schema::specs_for(backend)
        .filter_map(|f| match f.merge_rule {
            MergeRule::TrackPrevious(target) => Some(target),
            _ => None,
        })
        .collect();

    for spec in schema::specs_for(backend) {
        let stored_value = stored.get(spec.name).unwrap_or(&FieldValue::Empty);
        let incoming_value = incoming.get(spec.name).unwrap_or(&FieldValue::Empty);

        match spec.merge_rule {
            MergeRule::UnionList => {
                let union = union_tokens(stored_value, incoming_value);
                if !union.is_empty() {
                    merged.set(spec.name, FieldValue::List(union));
                }
            }
            MergeRule::TrackPrevious(target) => {
                match previous_number(spec, stored_value) {
                    Ok(Some(old)) => merged.set(target, FieldValue::Float(old)),
                    Ok(None) => {}
                    Err(e) => errors.push(e),
                }
            }
            MergeRule::Standard if tracked.contains(spec.name) => {}
            MergeRule::Standard => {
                if spec.provenance == Provenance::Preserved && !stored_value.is_empty() {
                    merged.set(spec.name, preserved_value(spec, stored_value));
                }
            }
        }
    }

    (merged, errors)
}

/// Stored value of a preserved field. Textual booleans in a boolean field
/// become booleans; any other value keeps its stored form.
fn preserved_value(spec: &FieldSpec, stored: &FieldValue) -> FieldValue {
    if spec.value_type != ValueType::Bool {
        return stored.clone();
    }
    match stored {
        FieldValue::Text(s) if s.trim().eq_ignore_ascii_case("true") => FieldValue::Bool(true),
        FieldValue::Text(s) if s.trim().eq_ignore_ascii_case("false") => FieldValue::Bool(false),
        other => other.clone(),
    }
}

fn tokens(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::List(items) => items.clone(),
        FieldValue::Empty => Vec::new(),
        other => split_list(&other.to_cell()),
    }
}

/// Stored tokens first, then incoming tokens not already present.
fn union_tokens(stored: &FieldValue, incoming: &FieldValue) -> Vec<String> {
    let mut union: Vec<String> = Vec::new();
    for token in tokens(stored).into_iter().chain(tokens(incoming)) {
        if !union.contains(&token) {
            union.push(token);
        }
    }
    union
}

fn previous_number(
    spec: &FieldSpec,
    stored: &FieldValue,
) -> Result<Option<f64>, FieldCoercionError> {
    if stored.is_empty() {
        return Ok(None);
    }
    stored
        .as_f64()
        .map(Some)
        .ok_or_else(|| FieldCoercionError::new(spec.name, stored.to_cell(), ValueType::Float))
}
