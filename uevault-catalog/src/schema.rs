//! Field schema registry.
//!
//! One static table describes every asset record field: its display name
//! (the flat-file header), its SQL column, its value type, how a merge treats
//! it, and which storage backends expose it. Everything else in the workspace
//! asks this module for field lists instead of spelling them out.

use std::fmt;

/// Value type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Integer,
    Float,
    Bool,
    DateTime,
    /// Comma separated list of text tokens.
    List,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
            Self::List => "list",
        };
        f.write_str(s)
    }
}

/// How a merge treats a field when the asset already exists in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// A stored non-empty value wins over the freshly fetched one.
    Preserved,
    /// The freshly fetched value always wins.
    Overwrite,
    /// Derived during record creation or merge.
    Computed,
}

/// Which storage backends expose a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    FlatOnly,
    RelationalOnly,
    Both,
    /// User-entered field, present in both backends and in the user-field CSV subset.
    User,
}

/// The two interchangeable storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    FlatFile,
    Relational,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlatFile => f.write_str("flat file"),
            Self::Relational => f.write_str("database"),
        }
    }
}

/// Field-specific merge behaviour layered on top of [`Provenance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Standard,
    /// Stored and fetched values are unioned as a comma separated set.
    UnionList,
    /// The stored numeric value is copied into the named field before the
    /// fetched value replaces it.
    TrackPrevious(&'static str),
}

/// One entry of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Display name, also the flat-file header.
    pub name: &'static str,
    /// Column name in the relational store.
    pub column: &'static str,
    pub value_type: ValueType,
    pub provenance: Provenance,
    pub visibility: Visibility,
    pub merge_rule: MergeRule,
}

impl FieldSpec {
    /// Whether the given backend stores this field.
    pub fn exposed_in(&self, backend: BackendKind) -> bool {
        match (self.visibility, backend) {
            (Visibility::Both | Visibility::User, _) => true,
            (Visibility::FlatOnly, BackendKind::FlatFile) => true,
            (Visibility::RelationalOnly, BackendKind::Relational) => true,
            _ => false,
        }
    }

    pub fn is_user_field(&self) -> bool {
        self.visibility == Visibility::User
    }
}

/// Field name constants for the fields other modules address directly.
pub mod field {
    pub const ASSET_ID: &str = "Asset_id";
    pub const APP_NAME: &str = "App name";
    pub const APP_TITLE: &str = "App title";
    pub const CATEGORY: &str = "Category";
    pub const REVIEW: &str = "Review";
    pub const DEVELOPER: &str = "Developer";
    pub const DESCRIPTION: &str = "Description";
    pub const STATUS: &str = "Status";
    pub const DISCOUNT_PRICE: &str = "Discount price";
    pub const DISCOUNT_PERCENTAGE: &str = "Discount percentage";
    pub const DISCOUNTED: &str = "Discounted";
    pub const OWNED: &str = "Owned";
    pub const OBSOLETE: &str = "Obsolete";
    pub const SUPPORTED_VERSIONS: &str = "Supported versions";
    pub const GRAB_RESULT: &str = "Grab result";
    pub const PRICE: &str = "Price";
    pub const OLD_PRICE: &str = "Old price";
    pub const COMMENT: &str = "Comment";
    pub const STARS: &str = "Stars";
    pub const MUST_BUY: &str = "Must buy";
    pub const TEST_RESULT: &str = "Test result";
    pub const INSTALLED_FOLDER: &str = "Installed folder";
    pub const ALTERNATIVE: &str = "Alternative";
    pub const ORIGIN: &str = "Origin";
    pub const ADDED_MANUALLY: &str = "Added manually";
    pub const PAGE_TITLE: &str = "Page title";
    pub const IMAGE: &str = "Image";
    pub const URL: &str = "Url";
    pub const COMPATIBLE_VERSIONS: &str = "Compatible versions";
    pub const DATE_ADDED: &str = "Date added";
    pub const CREATION_DATE: &str = "Creation date";
    pub const UPDATE_DATE: &str = "Update date";
    pub const UE_VERSION: &str = "UE version";
    pub const UID: &str = "Uid";
    pub const NAMESPACE: &str = "Namespace";
    pub const CATALOG_ITEM_ID: &str = "Catalog item id";
    pub const TAGS: &str = "Tags";
}

const fn entry(
    name: &'static str,
    column: &'static str,
    value_type: ValueType,
    provenance: Provenance,
    visibility: Visibility,
) -> FieldSpec {
    FieldSpec {
        name,
        column,
        value_type,
        provenance,
        visibility,
        merge_rule: MergeRule::Standard,
    }
}

use Provenance::{Computed, Overwrite, Preserved};
use ValueType::{Bool, DateTime, Float, Integer, List, Text};
use Visibility::{Both, FlatOnly, RelationalOnly, User};

/// The registry. Order matters: it is the flat-file column order.
static FIELDS: &[FieldSpec] = &[
    entry(field::ASSET_ID, "asset_id", Text, Overwrite, Both),
    entry(field::APP_NAME, "app_name", Text, Overwrite, Both),
    entry(field::APP_TITLE, "app_title", Text, Overwrite, Both),
    entry(field::CATEGORY, "category", Text, Overwrite, Both),
    entry(field::REVIEW, "review", Float, Overwrite, Both),
    entry(field::DEVELOPER, "developer", Text, Overwrite, Both),
    entry(field::DESCRIPTION, "description", Text, Overwrite, Both),
    entry(field::STATUS, "status", Text, Overwrite, Both),
    entry(field::DISCOUNT_PRICE, "discount_price", Float, Overwrite, Both),
    entry(field::DISCOUNT_PERCENTAGE, "discount_percentage", Integer, Overwrite, Both),
    entry(field::DISCOUNTED, "discounted", Bool, Overwrite, Both),
    entry(field::OWNED, "owned", Bool, Overwrite, Both),
    entry(field::OBSOLETE, "obsolete", Bool, Computed, Both),
    entry(field::SUPPORTED_VERSIONS, "supported_versions", Text, Overwrite, Both),
    entry(field::GRAB_RESULT, "grab_result", Text, Overwrite, Both),
    FieldSpec {
        name: field::PRICE,
        column: "price",
        value_type: Float,
        provenance: Overwrite,
        visibility: Both,
        merge_rule: MergeRule::TrackPrevious(field::OLD_PRICE),
    },
    entry(field::OLD_PRICE, "old_price", Float, Computed, Both),
    // User fields
    entry(field::COMMENT, "comment", Text, Preserved, User),
    entry(field::STARS, "stars", Integer, Preserved, User),
    entry(field::MUST_BUY, "must_buy", Bool, Preserved, User),
    entry(field::TEST_RESULT, "test_result", Text, Preserved, User),
    entry(field::INSTALLED_FOLDER, "installed_folder", Text, Preserved, User),
    entry(field::ALTERNATIVE, "alternative", Text, Preserved, User),
    FieldSpec {
        name: field::ORIGIN,
        column: "origin",
        value_type: List,
        provenance: Preserved,
        visibility: User,
        merge_rule: MergeRule::UnionList,
    },
    entry(field::ADDED_MANUALLY, "added_manually", Bool, Preserved, User),
    // Less important fields
    entry(field::PAGE_TITLE, "page_title", Text, Overwrite, Both),
    entry(field::IMAGE, "thumbnail_url", Text, Overwrite, Both),
    entry(field::URL, "asset_url", Text, Overwrite, Both),
    entry(field::COMPATIBLE_VERSIONS, "compatible_versions", Text, Overwrite, FlatOnly),
    entry(field::DATE_ADDED, "date_added", DateTime, Preserved, Both),
    entry(field::CREATION_DATE, "creation_date", DateTime, Overwrite, Both),
    entry(field::UPDATE_DATE, "update_date", DateTime, Overwrite, Both),
    entry(field::UE_VERSION, "ue_version", Text, Overwrite, Both),
    entry(field::UID, "uid", Text, Overwrite, Both),
    // Relational only
    entry(field::NAMESPACE, "namespace", Text, Overwrite, RelationalOnly),
    entry(field::CATALOG_ITEM_ID, "catalog_item_id", Text, Overwrite, RelationalOnly),
    entry(field::TAGS, "tags", List, Overwrite, RelationalOnly),
];

/// Every registered field, in registry order.
pub fn all_fields() -> &'static [FieldSpec] {
    FIELDS
}

/// Look up a field by its exact display name.
pub fn spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Loose lookup used for user-typed names: case-insensitive, and spaces and
/// underscores are interchangeable. Matches display names and column names.
pub fn find_field(name: &str) -> Option<&'static FieldSpec> {
    let wanted = normalize_name(name);
    FIELDS
        .iter()
        .find(|f| normalize_name(f.name) == wanted || f.column == wanted)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Fields stored by a backend, in registry order.
pub fn specs_for(backend: BackendKind) -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(move |f| f.exposed_in(backend))
}

/// Field names stored by a backend, in registry order.
pub fn fields_for(backend: BackendKind) -> Vec<&'static str> {
    specs_for(backend).map(|f| f.name).collect()
}

/// Number of fields a well-formed record of the given backend carries.
pub fn field_count(backend: BackendKind) -> usize {
    specs_for(backend).count()
}

pub fn provenance_of(name: &str) -> Option<Provenance> {
    spec(name).map(|f| f.provenance)
}

pub fn type_of(name: &str) -> Option<ValueType> {
    spec(name).map(|f| f.value_type)
}

/// The user-field subset, in registry order.
pub fn user_fields() -> Vec<&'static str> {
    FIELDS
        .iter()
        .filter(|f| f.is_user_field())
        .map(|f| f.name)
        .collect()
}

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
