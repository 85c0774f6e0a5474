//! Session context: loaded settings plus the factories that turn them into
//! backends, views, filters and import options.

use std::path::{Path, PathBuf};

use uevault_catalog::{BatchFilter, CodecOptions, JsonDirSource};
use uevault_db::{BackendOptions, StorageBackend, open_backend};
use uevault_import::ListOptions;

use crate::error::VaultError;
use crate::filter::FilterEngine;
use crate::settings::{AppSettings, load_settings, resolve_data_source, save_settings, settings_path};
use crate::view::DatasetView;

/// Settings and the file they came from.
///
/// This is the main entry point for front ends: load a context, then ask it
/// for the pieces a command needs.
#[derive(Debug, Clone)]
pub struct VaultContext {
    settings: AppSettings,
    settings_path: PathBuf,
}

impl VaultContext {
    /// Load settings from `path`, or from the default location.
    pub fn load(path: Option<PathBuf>) -> Self {
        let settings_path = path.unwrap_or_else(settings_path);
        let settings = load_settings(&settings_path);
        log::debug!("Settings loaded from {}", settings_path.display());
        Self {
            settings,
            settings_path,
        }
    }

    pub fn new(settings: AppSettings, settings_path: PathBuf) -> Self {
        Self {
            settings,
            settings_path,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut AppSettings {
        &mut self.settings
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Write the current settings back to their file.
    pub fn save(&self) -> Result<(), VaultError> {
        save_settings(&self.settings_path, &self.settings).map_err(|e| {
            VaultError::settings(format!("{}: {}", self.settings_path.display(), e))
        })
    }

    /// The data source to use: `cli_override` first, then the settings.
    pub fn data_source(&self, cli_override: Option<PathBuf>) -> Result<PathBuf, VaultError> {
        resolve_data_source(cli_override, &self.settings).ok_or(VaultError::NoDataSource)
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            backup_on_save: self.settings.backup_on_save,
            empty_markers: self.settings.empty_cell_markers.clone(),
        }
    }

    /// Backend for `source`, not yet loaded.
    pub fn open_backend(&self, source: &Path) -> Box<dyn StorageBackend> {
        open_backend(source, &self.backend_options())
    }

    /// Load `source` into a view paged per the settings.
    pub fn open_view(&self, source: &Path) -> Result<DatasetView, VaultError> {
        DatasetView::open(self.open_backend(source), self.settings.page_size)
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            obsolete_reference: self.settings.obsolete_reference(),
            ..CodecOptions::default()
        }
    }

    pub fn list_options(&self, filter: BatchFilter) -> ListOptions {
        ListOptions {
            codec: self.codec_options(),
            tie_break: self.settings.tie_break.into(),
            filter,
        }
    }

    /// Filter engine knowing the saved filters.
    pub fn filter_engine(&self) -> FilterEngine {
        FilterEngine::with_saved(self.settings.filters.iter().cloned())
    }

    /// Offline source reading the saved catalog items in `dir`, or in the
    /// metadata cache when `dir` is `None`.
    pub fn catalog_source(&self, dir: Option<&Path>) -> Result<JsonDirSource, VaultError> {
        let dir = dir.unwrap_or(self.settings.cache.metadata_dir.as_path());
        Ok(JsonDirSource::new(dir)?)
    }
}
