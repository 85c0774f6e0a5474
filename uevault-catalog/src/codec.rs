//! Conversion between catalog items, stored cells, and [`Record`]s.

use chrono::{NaiveDateTime, Timelike};

use crate::record::{FieldCoercionError, FieldValue, Record, parse_datetime};
use crate::schema::{self, ValueType, field};
use crate::types::{AssetExtra, CatalogItem, CatalogMetadata, DEFAULT_PLATFORM, GrabResult};
use crate::version::{self, EngineVersion};

/// Origin recorded for assets that come from the marketplace catalog.
pub const MARKETPLACE_ORIGIN: &str = "Marketplace";

/// Values substituted for fields the catalog does not provide.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefaults {
    pub text: String,
    pub integer: i64,
    pub float: f64,
    pub boolean: bool,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            text: String::new(),
            integer: 0,
            float: 0.0,
            boolean: false,
        }
    }
}

impl FieldDefaults {
    /// Default for a value type. Blank text and empty lists are `Empty`.
    pub fn value_for(&self, value_type: ValueType) -> FieldValue {
        match value_type {
            ValueType::Text if self.text.is_empty() => FieldValue::Empty,
            ValueType::Text => FieldValue::Text(self.text.clone()),
            ValueType::Integer => FieldValue::Integer(self.integer),
            ValueType::Float => FieldValue::Float(self.float),
            ValueType::Bool => FieldValue::Bool(self.boolean),
            ValueType::DateTime | ValueType::List => FieldValue::Empty,
        }
    }
}

/// Options for [`from_catalog_item`].
#[derive(Debug, Clone)]
pub struct CodecOptions {
    pub defaults: FieldDefaults,
    /// Assets whose supported versions all predate this one are obsolete.
    pub obsolete_reference: Option<EngineVersion>,
    /// Stamp for the `Date added` field.
    pub date_added: NaiveDateTime,
    /// Value of the `Origin` field for new records.
    pub origin: String,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            defaults: FieldDefaults::default(),
            obsolete_reference: None,
            date_added: chrono::Local::now().naive_local(),
            origin: MARKETPLACE_ORIGIN.to_string(),
        }
    }
}

/// Dataset key of a catalog item: its Windows asset id, or its title when the
/// catalog gave no asset info.
pub fn asset_id_for(item: &CatalogItem) -> String {
    match item.asset_info(DEFAULT_PLATFORM) {
        Some(info) if !info.asset_id.is_empty() => info.asset_id.clone(),
        _ => item.app_title.clone(),
    }
}

/// Engine versions listed in `releaseInfo[*].compatibleApps`.
///
/// Returns `Ok(None)` when the item has no release info and `Err` with a
/// description when the structure is not the expected list of objects holding
/// string lists.
pub fn compatible_apps(metadata: &CatalogMetadata) -> Result<Option<Vec<String>>, String> {
    let Some(info) = &metadata.release_info else {
        return Ok(None);
    };
    let releases = info
        .as_array()
        .ok_or_else(|| "releaseInfo is not a list".to_string())?;
    let mut apps = Vec::new();
    for release in releases {
        let Some(compatible) = release.get("compatibleApps") else {
            continue;
        };
        if compatible.is_null() {
            continue;
        }
        let list = compatible
            .as_array()
            .ok_or_else(|| "compatibleApps is not a list".to_string())?;
        for app in list {
            let app = app
                .as_str()
                .ok_or_else(|| format!("compatibleApps entry is not text: {app}"))?;
            apps.push(app.to_string());
        }
    }
    Ok(Some(apps))
}

fn thumbnail_url(metadata: &CatalogMetadata) -> Option<&str> {
    metadata
        .key_images
        .iter()
        .find(|img| img.kind.eq_ignore_ascii_case("Thumbnail"))
        .or_else(|| metadata.key_images.first())
        .map(|img| img.url.as_str())
        .filter(|url| !url.is_empty())
}

fn tag_names(metadata: &CatalogMetadata) -> Vec<String> {
    metadata
        .tags
        .iter()
        .filter_map(|tag| match tag {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Object(obj) => obj
                .get("name")
                .or_else(|| obj.get("id"))
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())),
            _ => None,
        })
        .collect()
}

fn truncate_seconds(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

fn text(s: &str) -> Option<FieldValue> {
    (!s.is_empty()).then(|| FieldValue::Text(s.to_string()))
}

fn date(raw: Option<&String>) -> Option<FieldValue> {
    raw.and_then(|s| parse_datetime(s))
        .map(|dt| FieldValue::DateTime(truncate_seconds(dt)))
}

/// Flatten a catalog item into a record holding every registry field.
///
/// Fields the item does not provide get the caller's defaults. A malformed
/// `releaseInfo` only costs the `Compatible versions` field: it is logged and
/// defaulted.
pub fn from_catalog_item(item: &CatalogItem, options: &CodecOptions) -> (String, Record) {
    let asset_id = asset_id_for(item);
    let metadata = &item.metadata;
    let no_extra = AssetExtra::default();
    let extra = item.extra.as_ref().unwrap_or(&no_extra);

    let compatible = match compatible_apps(metadata) {
        Ok(apps) => apps.map(|apps| apps.join(",")),
        Err(reason) => {
            log::warn!(
                "Error getting compatibleApps for {}: {}",
                item.app_name,
                reason
            );
            None
        }
    };
    if thumbnail_url(metadata).is_none() {
        log::debug!("asset {} has no image", item.app_name);
    }
    let supported = extra.supported_versions.clone().unwrap_or_default();
    let obsolete = version::is_obsolete(&supported, options.obsolete_reference);
    let windows = item.asset_info(DEFAULT_PLATFORM);

    let mut record = Record::new();
    for spec in schema::all_fields() {
        let value = match spec.name {
            field::ASSET_ID => text(&asset_id),
            field::APP_NAME => text(&item.app_name),
            field::APP_TITLE => text(&item.app_title),
            field::CATEGORY => metadata.categories.first().and_then(|c| text(&c.path)),
            field::REVIEW => extra.review.map(FieldValue::Float),
            field::DEVELOPER => text(&metadata.developer),
            field::DESCRIPTION => text(&metadata.description),
            field::STATUS => text(&metadata.status),
            field::DISCOUNT_PRICE => extra.discount_price.map(FieldValue::Float),
            field::DISCOUNT_PERCENTAGE => extra.discount_percentage.map(FieldValue::Integer),
            field::DISCOUNTED => extra.discounted.map(FieldValue::Bool),
            field::OWNED => extra.owned.map(FieldValue::Bool),
            field::OBSOLETE => Some(FieldValue::Bool(obsolete)),
            field::SUPPORTED_VERSIONS => text(&supported),
            field::GRAB_RESULT => Some(FieldValue::text(
                extra.grab_result.unwrap_or(GrabResult::NoError).as_str(),
            )),
            field::PRICE => extra.price.map(FieldValue::Float),
            field::ORIGIN => {
                (!options.origin.is_empty()).then(|| FieldValue::List(vec![options.origin.clone()]))
            }
            field::PAGE_TITLE => extra.page_title.as_deref().and_then(text),
            field::IMAGE => thumbnail_url(metadata).and_then(text),
            field::URL => extra.asset_url.as_deref().and_then(text),
            field::COMPATIBLE_VERSIONS => compatible.as_deref().and_then(text),
            field::DATE_ADDED => Some(FieldValue::DateTime(truncate_seconds(options.date_added))),
            field::CREATION_DATE => date(metadata.creation_date.as_ref()),
            field::UPDATE_DATE => date(metadata.last_modified_date.as_ref()),
            field::UE_VERSION => item.app_version(DEFAULT_PLATFORM).and_then(text),
            field::UID => text(&metadata.id),
            field::NAMESPACE => text(&metadata.namespace),
            field::CATALOG_ITEM_ID => windows.and_then(|info| text(&info.catalog_item_id)),
            field::TAGS => {
                let tags = tag_names(metadata);
                (!tags.is_empty()).then_some(FieldValue::List(tags))
            }
            // Old price and the user fields never come from the catalog.
            _ => None,
        };
        let value = value.unwrap_or_else(|| options.defaults.value_for(spec.value_type));
        record.set(spec.name, value);
    }

    (asset_id, record)
}

/// A record with every registry field set to its type default.
pub fn empty_record(defaults: &FieldDefaults) -> Record {
    Record::from_pairs(
        schema::all_fields()
            .iter()
            .map(|spec| (spec.name, defaults.value_for(spec.value_type))),
    )
}

/// Parse one stored text cell for a named field.
pub fn decode_cell(name: &str, raw: &str) -> Result<FieldValue, FieldCoercionError> {
    match schema::type_of(name) {
        Some(value_type) => FieldValue::parse(raw, value_type)
            .map_err(|e| FieldCoercionError::new(name, e.value, e.expected)),
        None if raw.trim().is_empty() => Ok(FieldValue::Empty),
        None => Ok(FieldValue::Text(raw.to_string())),
    }
}

/// Build a record from `(column, cell)` pairs read from storage.
///
/// Cells that do not parse as their declared type are kept as stored text and
/// reported, so a bad cell never loses data.
pub fn decode_cells<'a, I>(cells: I) -> (Record, Vec<FieldCoercionError>)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut record = Record::new();
    let mut errors = Vec::new();
    for (name, raw) in cells {
        let value = match decode_cell(name, raw) {
            Ok(value) => value,
            Err(e) => {
                errors.push(e);
                FieldValue::Text(raw.to_string())
            }
        };
        record.set(name, value);
    }
    (record, errors)
}
