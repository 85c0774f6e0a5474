use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use uevault_catalog::{BatchFilter, CatalogItem, JsonDirSource};
use uevault_catalog::schema::BackendKind;
use uevault_db::{backup_file, kind_for_path};
use uevault_import::{ListOptions, LogProgress, merge_into};
use uevault_lib::VaultContext;

use super::fetch::{Fetched, fetch_with_progress};
use crate::cli_types::CatalogArgs;
use crate::error::CliError;

fn list_options(ctx: &VaultContext, catalog: &CatalogArgs, filter: BatchFilter) -> ListOptions {
    let mut options = ctx.list_options(filter);
    if let Some(tie_break) = catalog.tie_break {
        options.tie_break = tie_break.into();
    }
    options
}

fn log_header(verb: &str, catalog: &JsonDirSource, data_source: &Path, filter: &BatchFilter) {
    log::info!(
        "{} {} into {}",
        verb,
        catalog.dir().display().if_supports_color(Stdout, |t| t.cyan()),
        data_source.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    if let Some(category) = &filter.category {
        log::info!(
            "{}",
            format!("Category: {category}").if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    if filter.owned_only {
        log::info!("{}", "Owned items only".if_supports_color(Stdout, |t| t.dimmed()));
    }
    if let Some(n) = filter.limit {
        log::info!(
            "{}",
            format!("Limit: {n} items").if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
}

/// Whether `--backup` has to copy the data source itself. A flat file saved
/// with `backup_on_save` already gets its copy from the backend.
fn needs_explicit_backup(ctx: &VaultContext, data_source: &Path) -> bool {
    !(kind_for_path(data_source) == BackendKind::FlatFile && ctx.settings().backup_on_save)
}

/// Merge fetched items into the data source and print the counters.
fn merge_and_report(
    ctx: &VaultContext,
    data_source: &Path,
    fetched: Fetched,
    options: &ListOptions,
) -> Result<(), CliError> {
    let mut backend = ctx.open_backend(data_source);
    let mut stats = merge_into(fetched.items, backend.as_mut(), options, &LogProgress)?;
    stats.fetch_failures = fetched.failures;
    backend.close()?;

    log::info!("");
    log::info!(
        "{} {} assets saved ({} new, {} merged, {} overwritten, {} dropped)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        stats.saved.if_supports_color(Stdout, |t| t.bold()),
        stats.added,
        stats.merged,
        stats.overwritten,
        stats.dropped,
    );
    if stats.fetch_failures > 0 {
        log::warn!(
            "{} {} catalog items could not be read",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            stats.fetch_failures,
        );
    }
    if !stats.warnings.is_empty() {
        log::warn!(
            "{} {} merge warnings",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            stats.warnings.len(),
        );
        for warning in &stats.warnings {
            log::debug!("  {warning}");
        }
    }
    if stats.save_failures > 0 {
        return Err(CliError::storage(format!(
            "{} assets were not saved",
            stats.save_failures
        )));
    }
    Ok(())
}

pub(crate) fn run_list(
    ctx: &VaultContext,
    source: Option<PathBuf>,
    catalog: CatalogArgs,
    owned: bool,
    backup: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source)?;
    let catalog_source = ctx.catalog_source(catalog.catalog_dir.as_deref())?;
    let filter = BatchFilter {
        category: catalog.category.clone(),
        owned_only: owned,
        limit: catalog.limit,
    };
    let options = list_options(ctx, &catalog, filter.clone());

    log_header("Listing", &catalog_source, &data_source, &filter);
    let fetched = fetch_with_progress(catalog_source, filter, quiet)?;
    log::info!("Fetched {} items", fetched.items.len());

    if backup && needs_explicit_backup(ctx, &data_source) {
        backup_file(&data_source)?;
    }
    merge_and_report(ctx, &data_source, fetched, &options)
}

/// Save items to the metadata cache so later runs can replay them.
fn store_items(ctx: &VaultContext, items: &[CatalogItem]) -> Result<usize, CliError> {
    let dir = &ctx.settings().cache.metadata_dir;
    std::fs::create_dir_all(dir)?;
    let cache = JsonDirSource::new(dir)?;
    for item in items {
        cache.save_item(item)?;
    }
    Ok(items.len())
}

pub(crate) fn run_scrap(
    ctx: &VaultContext,
    source: Option<PathBuf>,
    catalog: CatalogArgs,
    no_files: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source)?;
    let catalog_source = ctx.catalog_source(catalog.catalog_dir.as_deref())?;
    let replaying_cache = catalog_source.dir() == ctx.settings().cache.metadata_dir.as_path();
    let filter = BatchFilter {
        category: catalog.category.clone(),
        owned_only: false,
        limit: catalog.limit,
    };
    let options = list_options(ctx, &catalog, filter.clone());

    log_header("Scraping", &catalog_source, &data_source, &filter);
    let fetched = fetch_with_progress(catalog_source, filter, quiet)?;
    log::info!("Fetched {} items", fetched.items.len());

    if !no_files && !replaying_cache {
        let stored = store_items(ctx, &fetched.items)?;
        log::info!(
            "{}",
            format!(
                "{stored} items saved to {}",
                ctx.settings().cache.metadata_dir.display()
            )
            .if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    merge_and_report(ctx, &data_source, fetched, &options)
}
