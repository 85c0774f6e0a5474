//! Front-end facing layer: dataset view, filters, settings and maintenance.
//!
//! Front ends load a [`VaultContext`] and build everything else from it.

pub mod cleanup;
pub mod context;
pub mod error;
pub mod filter;
pub mod settings;
pub mod view;

pub use cleanup::{BACKUP_MARKER, CleanupOptions, CleanupReport, cleanup, format_mib};
pub use context::VaultContext;
pub use error::VaultError;
pub use filter::{CompiledFilter, FilterEngine, FilterError, FilterKind, FilterValue, Preset};
pub use settings::{
    AppSettings, CacheSettings, DEFAULT_PAGE_SIZE, TieBreakSetting, load_settings,
    resolve_data_source, save_settings, settings_path,
};
pub use view::DatasetView;

pub use uevault_catalog;
pub use uevault_db;
pub use uevault_import;
