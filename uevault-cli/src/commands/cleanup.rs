use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use uevault_lib::{CleanupOptions, VaultContext, cleanup, format_mib};

use crate::error::CliError;

/// Purge derived data. Without a data source, backups are left alone.
pub(crate) fn run_cleanup(
    ctx: &VaultContext,
    source: Option<PathBuf>,
    options: CleanupOptions,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source).ok();
    if data_source.is_none() {
        log::info!(
            "{}",
            "No data source configured: backups are kept".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }

    let report = cleanup(&ctx.settings().cache, data_source.as_deref(), options)?;
    log::info!(
        "{} Removed {} files ({} freed)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        report.files_removed,
        format_mib(report.bytes_freed),
    );
    Ok(())
}
