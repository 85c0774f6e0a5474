//! Catalog item model.
//!
//! These types mirror the JSON the marketplace catalog returns for one item,
//! plus the extra data scraped from the item's store page. Only the fields the
//! record codec reads are modelled; unknown JSON keys are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Platform key used for asset infos and build versions.
pub const DEFAULT_PLATFORM: &str = "Windows";

// ── Catalog Item ────────────────────────────────────────────────────────────

/// One catalog item as returned by the catalog (or replayed from a saved file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogItem {
    pub app_name: String,
    #[serde(default)]
    pub app_title: String,
    /// Per-platform asset info, keyed by platform name (e.g. "Windows").
    #[serde(default)]
    pub asset_infos: BTreeMap<String, AssetInfo>,
    #[serde(default)]
    pub metadata: CatalogMetadata,
    /// Data scraped from the store page, when it was fetched.
    #[serde(default)]
    pub extra: Option<AssetExtra>,
}

impl CatalogItem {
    /// Asset info for a platform, if the catalog reported one.
    pub fn asset_info(&self, platform: &str) -> Option<&AssetInfo> {
        self.asset_infos.get(platform)
    }

    /// Build version for a platform.
    pub fn app_version(&self, platform: &str) -> Option<&str> {
        self.asset_info(platform)
            .map(|info| info.build_version.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Per-platform asset information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetInfo {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub build_version: String,
    #[serde(default)]
    pub catalog_item_id: String,
    #[serde(default)]
    pub label_name: String,
    #[serde(default)]
    pub namespace: String,
}

// ── Metadata ────────────────────────────────────────────────────────────────

/// Catalog metadata of an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub key_images: Vec<KeyImage>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
    /// Kept as raw JSON: the structure is not reliable across catalog items
    /// and the codec checks it field by field.
    #[serde(default)]
    pub release_info: Option<serde_json::Value>,
    /// Tags are either plain strings or objects with a `name`/`id`.
    #[serde(default)]
    pub tags: Vec<serde_json::Value>,
}

/// A category path such as `assets/environments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(default)]
    pub path: String,
}

/// An image attached to a catalog item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyImage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

// ── Store Page Data ─────────────────────────────────────────────────────────

/// Result of scraping an item's store page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrabResult {
    #[default]
    NoError,
    InconsistentData,
    PageNotFound,
    ContentNotFound,
    TimeOut,
    PartialContent,
}

impl GrabResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::InconsistentData => "INCONSISTENT_DATA",
            Self::PageNotFound => "PAGE_NOT_FOUND",
            Self::ContentNotFound => "CONTENT_NOT_FOUND",
            Self::TimeOut => "TIME_OUT",
            Self::PartialContent => "PARTIAL_CONTENT",
        }
    }
}

/// Data scraped from the store page. Every field is optional: pages often
/// lack some of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetExtra {
    #[serde(default)]
    pub asset_url: Option<String>,
    #[serde(default)]
    pub review: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub discount_price: Option<f64>,
    #[serde(default)]
    pub discount_percentage: Option<i64>,
    #[serde(default)]
    pub discounted: Option<bool>,
    #[serde(default)]
    pub owned: Option<bool>,
    #[serde(default)]
    pub supported_versions: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub grab_result: Option<GrabResult>,
}
