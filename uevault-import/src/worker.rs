//! Catalog fetch on a background thread.
//!
//! The caller keeps its own thread free and polls the event channel. Setting
//! the cancel flag stops the fetch before the next item.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use uevault_catalog::source::{BatchFilter, CatalogSource};
use uevault_catalog::CatalogItem;

use crate::list_import::fetch_all;
use crate::progress::ImportProgress;

/// Messages sent by a fetch worker.
#[derive(Debug)]
pub enum FetchEvent {
    Started { total: usize },
    Progress { current: usize, total: usize, name: String },
    ItemFailed { name: String, reason: String },
    Finished(Vec<CatalogItem>),
    Cancelled { fetched: usize },
    Failed(String),
}

/// Handle on a running fetch.
pub struct FetchHandle {
    pub events: mpsc::Receiver<FetchEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FetchHandle {
    /// Ask the worker to stop before its next item.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("Catalog fetch thread panicked");
        }
    }
}

/// Forwards fetch progress to the event channel.
struct ChannelProgress {
    tx: mpsc::Sender<FetchEvent>,
}

impl ImportProgress for ChannelProgress {
    fn on_start(&self, total: usize) {
        let _ = self.tx.send(FetchEvent::Started { total });
    }

    fn on_item(&self, current: usize, total: usize, name: &str) {
        let _ = self.tx.send(FetchEvent::Progress {
            current,
            total,
            name: name.to_string(),
        });
    }

    fn on_item_failed(&self, name: &str, reason: &str) {
        let _ = self.tx.send(FetchEvent::ItemFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn on_phase(&self, message: &str) {
        log::debug!("{message}");
    }

    fn on_complete(&self, _message: &str) {}
}

/// Start fetching every item matching `filter` on a new thread.
pub fn spawn_fetch(
    source: Arc<dyn CatalogSource + Send + Sync>,
    filter: BatchFilter,
) -> FetchHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let token = cancel.clone();

    let thread = std::thread::spawn(move || {
        let progress = ChannelProgress { tx };
        let event = match fetch_all(source.as_ref(), &filter, &token, &progress) {
            Ok(result) if result.cancelled => FetchEvent::Cancelled {
                fetched: result.items.len(),
            },
            Ok(result) => FetchEvent::Finished(result.items),
            Err(e) => FetchEvent::Failed(e.to_string()),
        };
        let _ = progress.tx.send(event);
    });

    FetchHandle {
        events: rx,
        cancel,
        thread: Some(thread),
    }
}
