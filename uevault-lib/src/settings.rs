//! Application settings.
//!
//! Settings live in `~/.config/uevault/settings.toml` unless a path is given.
//! A missing file, or one that no longer parses, yields the defaults; saving
//! always writes the whole file atomically.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uevault_catalog::EngineVersion;
use uevault_import::TieBreak;

use crate::filter::FilterValue;

/// Rows per page when nothing is configured.
pub const DEFAULT_PAGE_SIZE: usize = 36;

/// Canonical path to the settings file: `~/.config/uevault/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("uevault").join("settings.toml")
}

/// Default directory for caches, next to the settings file.
pub fn default_cache_root() -> PathBuf {
    let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    cache.join("uevault")
}

/// Tie-break policy as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakSetting {
    #[default]
    NameDescending,
    HighestEngineVersion,
}

impl From<TieBreakSetting> for TieBreak {
    fn from(setting: TieBreakSetting) -> Self {
        match setting {
            TieBreakSetting::NameDescending => TieBreak::NameDescending,
            TieBreakSetting::HighestEngineVersion => TieBreak::HighestEngineVersion,
        }
    }
}

/// Folders holding derived data that `cleanup` may purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Catalog items saved as JSON, replayed by the offline source.
    pub metadata_dir: PathBuf,
    /// Scraped store-page data.
    pub extra_dir: PathBuf,
    pub image_dir: PathBuf,
    pub manifest_dir: PathBuf,
    pub log_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::under(&default_cache_root())
    }
}

impl CacheSettings {
    /// The standard layout under one root folder.
    pub fn under(root: &Path) -> Self {
        Self {
            metadata_dir: root.join("metadata"),
            extra_dir: root.join("extra"),
            image_dir: root.join("images"),
            manifest_dir: root.join("manifests"),
            log_dir: root.join("logs"),
            tmp_dir: root.join("tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// CSV/TSV file or SQLite database holding the assets.
    pub data_source: Option<PathBuf>,
    /// Rows per page in the dataset view. 0 shows every row on one page.
    pub page_size: usize,
    /// Copy the flat file aside before each save.
    pub backup_on_save: bool,
    /// Cell texts read as empty, on top of the empty string.
    pub empty_cell_markers: Vec<String>,
    /// Assets whose newest supported engine predates this are obsolete.
    pub obsolete_engine_version: Option<String>,
    pub tie_break: TieBreakSetting,
    pub cache: CacheSettings,
    /// Saved filters, offered by name.
    pub filters: Vec<FilterValue>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_source: None,
            page_size: DEFAULT_PAGE_SIZE,
            backup_on_save: true,
            empty_cell_markers: vec!["None".to_string(), "nan".to_string()],
            obsolete_engine_version: Some("4.26".to_string()),
            tie_break: TieBreakSetting::default(),
            cache: CacheSettings::default(),
            filters: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Parsed obsolete reference. An unparsable value is logged and ignored.
    pub fn obsolete_reference(&self) -> Option<EngineVersion> {
        let raw = self.obsolete_engine_version.as_deref()?;
        match raw.parse() {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("Ignoring obsolete_engine_version: {e}");
                None
            }
        }
    }

    /// Add or replace a saved filter, matched by name ignoring case.
    pub fn save_filter(&mut self, value: FilterValue) {
        match self
            .filters
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&value.name))
        {
            Some(existing) => *existing = value,
            None => self.filters.push(value),
        }
    }

    /// Remove a saved filter. Returns whether it existed.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| !f.name.eq_ignore_ascii_case(name));
        self.filters.len() != before
    }
}

/// Load settings from `path`, falling back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return AppSettings::default(),
        Err(e) => {
            log::warn!("Cannot read {}: {}. Using defaults", path.display(), e);
            return AppSettings::default();
        }
    };
    match toml::from_str(&contents) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Invalid settings in {}: {}. Using defaults", path.display(), e);
            AppSettings::default()
        }
    }
}

/// Write settings to `path` atomically.
pub fn save_settings(path: &Path, settings: &AppSettings) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(settings).map_err(io::Error::other)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, &serialized)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve the data source using a priority chain:
///
/// 1. CLI override (if `Some`)
/// 2. `data_source` in the settings
pub fn resolve_data_source(cli_override: Option<PathBuf>, settings: &AppSettings) -> Option<PathBuf> {
    cli_override.or_else(|| settings.data_source.clone())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
