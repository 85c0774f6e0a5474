//! Building the incoming batch for a merge.
//!
//! The catalog can return several items for the same asset id (one per engine
//! version of a pack). Items are ordered by a tie-break policy and the first
//! item seen for each asset id wins.

use std::cmp::Ordering;
use std::collections::HashSet;

use uevault_catalog::codec::{self, CodecOptions};
use uevault_catalog::schema::BackendKind;
use uevault_catalog::version::{EngineVersion, highest_version};
use uevault_catalog::{CatalogItem, Record};

/// Which of several items sharing an asset id is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Lowercased app name, descending. Version suffixes usually sort last, so
    /// the newest variant tends to come first. A heuristic only.
    #[default]
    NameDescending,
    /// Highest engine version found in the item's compatible apps or supported
    /// versions, then name descending.
    HighestEngineVersion,
}

fn name_key(item: &CatalogItem) -> String {
    item.app_name.to_lowercase()
}

/// Highest engine version an item declares.
pub fn item_engine_version(item: &CatalogItem) -> Option<EngineVersion> {
    let from_apps = codec::compatible_apps(&item.metadata)
        .ok()
        .flatten()
        .and_then(|apps| highest_version(&apps.join(",")));
    let from_page = item
        .extra
        .as_ref()
        .and_then(|e| e.supported_versions.as_deref())
        .and_then(highest_version);
    from_apps.max(from_page)
}

fn compare(policy: TieBreak, a: &CatalogItem, b: &CatalogItem) -> Ordering {
    let by_name = name_key(b).cmp(&name_key(a));
    match policy {
        TieBreak::NameDescending => by_name,
        TieBreak::HighestEngineVersion => item_engine_version(b)
            .cmp(&item_engine_version(a))
            .then(by_name),
    }
}

/// Sort items so the preferred variant of each asset comes first.
pub fn sort_items(items: &mut [CatalogItem], policy: TieBreak) {
    items.sort_by(|a, b| compare(policy, a, b));
}

/// Flatten catalog items into records for one backend, one per asset id.
///
/// The result is ordered by the tie-break policy and carries exactly the
/// backend's fields.
pub fn build_incoming(
    mut items: Vec<CatalogItem>,
    options: &CodecOptions,
    policy: TieBreak,
    backend: BackendKind,
) -> Vec<Record> {
    sort_items(&mut items, policy);

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for item in &items {
        let (key, record) = codec::from_catalog_item(item, options);
        if key.is_empty() {
            log::warn!("Catalog item '{}' has no asset id, skipped", item.app_name);
            continue;
        }
        if !seen.insert(key.clone()) {
            log::debug!("Asset {} already in batch, '{}' ignored", key, item.app_name);
            continue;
        }
        records.push(record.project(backend));
    }
    records
}
