//! Asset data model: field registry, typed records, catalog item types and
//! the codec between them.
//!
//! This crate has no storage dependencies. `uevault-db` persists the records
//! it defines and `uevault-import` merges them.

pub mod codec;
pub mod record;
pub mod schema;
pub mod source;
pub mod types;
pub mod version;

pub use codec::{CodecOptions, FieldDefaults, decode_cells, empty_record, from_catalog_item};
pub use record::{FieldCoercionError, FieldValue, Record, SchemaMismatchError};
pub use schema::{BackendKind, FieldSpec, MergeRule, Provenance, ValueType, Visibility, field};
pub use source::{BatchFilter, CatalogError, CatalogSource, JsonDirSource};
pub use types::*;
pub use version::EngineVersion;
