//! Catalog sources.
//!
//! The HTTP catalog client lives outside this workspace. The rest of the code
//! only talks to a [`CatalogSource`], and [`JsonDirSource`] replays catalog
//! items previously saved as one JSON file per item.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::CatalogItem;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Directory not found: {0}")]
    DirNotFound(String),
    #[error("No catalog item named '{0}'")]
    NotFound(String),
}

impl CatalogError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Narrows which items a batch fetch returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchFilter {
    /// Case-insensitive substring matched against the item's category paths.
    pub category: Option<String>,
    /// Only keep items the user owns.
    pub owned_only: bool,
    /// Stop after this many items.
    pub limit: Option<usize>,
}

impl BatchFilter {
    pub fn matches(&self, item: &CatalogItem) -> bool {
        if let Some(wanted) = &self.category {
            let wanted = wanted.to_lowercase();
            let hit = item
                .metadata
                .categories
                .iter()
                .any(|c| c.path.to_lowercase().contains(&wanted));
            if !hit {
                return false;
            }
        }
        if self.owned_only {
            let owned = item.extra.as_ref().and_then(|e| e.owned).unwrap_or(false);
            if !owned {
                return false;
            }
        }
        true
    }
}

/// Anything that can hand out catalog items.
pub trait CatalogSource {
    /// Names of the items the source knows about, in source order.
    fn app_names(&self, filter: &BatchFilter) -> Result<Vec<String>, CatalogError>;

    /// Full data for one item.
    fn fetch_item_metadata(&self, app_name: &str) -> Result<CatalogItem, CatalogError>;

    /// Every item matching the filter.
    fn fetch_batch(&self, filter: &BatchFilter) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut items = Vec::new();
        for name in self.app_names(filter)? {
            let item = self.fetch_item_metadata(&name)?;
            if filter.matches(&item) {
                items.push(item);
                if filter.limit.is_some_and(|limit| items.len() >= limit) {
                    break;
                }
            }
        }
        Ok(items)
    }
}

/// Catalog items stored as `<app_name>.json` files in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(CatalogError::DirNotFound(dir.display().to_string()));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn json_files(&self) -> Result<Vec<PathBuf>, CatalogError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| CatalogError::io(&self.dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_item(path: &Path) -> Result<CatalogItem, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| CatalogError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Save an item so a later run can replay it.
    pub fn save_item(&self, item: &CatalogItem) -> Result<PathBuf, CatalogError> {
        let path = self.dir.join(format!("{}.json", item.app_name));
        let json = serde_json::to_string_pretty(item).map_err(|e| CatalogError::Json {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| CatalogError::io(&path, e))?;
        Ok(path)
    }
}

impl CatalogSource for JsonDirSource {
    fn app_names(&self, _filter: &BatchFilter) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .json_files()?
            .iter()
            .filter_map(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .collect())
    }

    fn fetch_item_metadata(&self, app_name: &str) -> Result<CatalogItem, CatalogError> {
        let path = self.dir.join(format!("{app_name}.json"));
        if !path.is_file() {
            return Err(CatalogError::NotFound(app_name.to_string()));
        }
        let mut item = Self::read_item(&path)?;
        if item.app_name.is_empty() {
            item.app_name = app_name.to_string();
        }
        Ok(item)
    }
}
