//! The list pipeline: fetch catalog items, merge them into the stored
//! dataset and write the result back.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use uevault_catalog::codec::CodecOptions;
use uevault_catalog::source::{BatchFilter, CatalogError, CatalogSource};
use uevault_catalog::CatalogItem;
use uevault_db::{StorageBackend, StorageError, WritePlan};

use crate::batch::{TieBreak, build_incoming};
use crate::merge::{MergeWarning, merge_records};
use crate::progress::ImportProgress;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Settings for one list run.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub codec: CodecOptions,
    pub tie_break: TieBreak,
    pub filter: BatchFilter,
}

/// Statistics from a completed list run.
#[derive(Debug, Default)]
pub struct ListStats {
    pub fetched: usize,
    pub fetch_failures: usize,
    pub added: usize,
    pub merged: usize,
    pub overwritten: usize,
    pub dropped: usize,
    pub saved: usize,
    pub save_failures: usize,
    pub warnings: Vec<MergeWarning>,
}

#[derive(Debug)]
pub enum ListOutcome {
    /// Stopped during the fetch. Nothing was loaded or written.
    Cancelled { fetched: usize },
    Completed(ListStats),
}

/// Items fetched from a source, with the count of items that failed.
#[derive(Debug, Default)]
pub struct FetchResult {
    pub items: Vec<CatalogItem>,
    pub failures: usize,
    pub cancelled: bool,
}

/// Fetch every item matching `filter`, one at a time.
///
/// A failing item is logged and skipped. `cancel` is checked before each
/// item; once set, the items fetched so far are returned with `cancelled`.
pub fn fetch_all(
    source: &dyn CatalogSource,
    filter: &BatchFilter,
    cancel: &AtomicBool,
    progress: &dyn ImportProgress,
) -> Result<FetchResult, ImportError> {
    let names = source.app_names(filter)?;
    let total = names.len();
    progress.on_start(total);
    progress.on_phase(&format!("Fetching {total} catalog items"));

    let mut result = FetchResult::default();
    for (i, name) in names.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::info!("Fetch cancelled after {} items", result.items.len());
            result.cancelled = true;
            return Ok(result);
        }
        match source.fetch_item_metadata(name) {
            Ok(item) if filter.matches(&item) => result.items.push(item),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Failed to fetch '{name}': {e}");
                progress.on_item_failed(name, &e.to_string());
                result.failures += 1;
            }
        }
        progress.on_item(i + 1, total, name);
        if filter.limit.is_some_and(|limit| result.items.len() >= limit) {
            break;
        }
    }
    Ok(result)
}

/// Merge already fetched items into a backend and save the full result.
pub fn merge_into(
    items: Vec<CatalogItem>,
    backend: &mut dyn StorageBackend,
    options: &ListOptions,
    progress: &dyn ImportProgress,
) -> Result<ListStats, ImportError> {
    let mut stats = ListStats {
        fetched: items.len(),
        ..ListStats::default()
    };

    let existing = match backend.load_all() {
        Ok(loaded) => loaded.records,
        Err(e) if e.is_read() => {
            log::warn!("{e}. Starting from an empty dataset");
            backend.start_empty()?;
            Default::default()
        }
        Err(e) => return Err(e.into()),
    };

    progress.on_phase(&format!(
        "Merging {} fetched items into {} stored assets",
        items.len(),
        existing.len()
    ));
    let incoming = build_incoming(items, &options.codec, options.tie_break, backend.kind());
    let outcome = merge_records(&incoming, &existing, backend.kind());

    let report = backend.write_all(&outcome.merged, &WritePlan::Full)?;
    for (key, reason) in &report.failed {
        log::error!("Asset '{key}' was not saved: {reason}");
    }

    stats.added = outcome.stats.added;
    stats.merged = outcome.stats.merged;
    stats.overwritten = outcome.stats.overwritten;
    stats.dropped = outcome.stats.dropped;
    stats.saved = report.saved.len();
    stats.save_failures = report.failed.len();
    stats.warnings = outcome.warnings;

    progress.on_complete(&format!(
        "{} assets saved to {} ({} new, {} merged, {} dropped)",
        stats.saved,
        backend.location().display(),
        stats.added,
        stats.merged,
        stats.dropped
    ));
    Ok(stats)
}

/// Fetch from `source`, merge into `backend` and save.
///
/// A cancelled fetch returns before the backend is touched.
pub fn run_list(
    source: &dyn CatalogSource,
    backend: &mut dyn StorageBackend,
    options: &ListOptions,
    cancel: &AtomicBool,
    progress: &dyn ImportProgress,
) -> Result<ListOutcome, ImportError> {
    let fetch = fetch_all(source, &options.filter, cancel, progress)?;
    if fetch.cancelled {
        return Ok(ListOutcome::Cancelled {
            fetched: fetch.items.len(),
        });
    }
    let failures = fetch.failures;
    let mut stats = merge_into(fetch.items, backend, options, progress)?;
    stats.fetch_failures = failures;
    Ok(ListOutcome::Completed(stats))
}
