use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use uevault_catalog::{BatchFilter, CatalogItem, JsonDirSource};
use uevault_import::{FetchEvent, spawn_fetch};

use crate::error::CliError;

pub(crate) struct Fetched {
    pub items: Vec<CatalogItem>,
    pub failures: usize,
}

/// Run the fetch worker and follow it with a progress bar until it ends.
pub(crate) fn fetch_with_progress(
    source: JsonDirSource,
    filter: BatchFilter,
    quiet: bool,
) -> Result<Fetched, CliError> {
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    };

    let handle = spawn_fetch(Arc::new(source), filter);
    let mut failures = 0usize;
    let result = loop {
        let Ok(event) = handle.events.recv() else {
            break Err(CliError::other("catalog fetch stopped unexpectedly"));
        };
        match event {
            FetchEvent::Started { total } => pb.set_length(total as u64),
            FetchEvent::Progress { current, name, .. } => {
                pb.set_position(current as u64);
                pb.set_message(name);
            }
            FetchEvent::ItemFailed { .. } => failures += 1,
            FetchEvent::Finished(items) => break Ok(Fetched { items, failures }),
            FetchEvent::Cancelled { fetched } => break Err(CliError::Cancelled(fetched)),
            FetchEvent::Failed(reason) => break Err(CliError::other(reason)),
        }
    };
    pb.finish_and_clear();
    handle.join();
    result
}
