//! Catalog-to-dataset pipeline.
//!
//! This crate fetches catalog items from a [`CatalogSource`], flattens them
//! into records, merges them with what a backend already stores and writes
//! the result back.
//!
//! [`CatalogSource`]: uevault_catalog::CatalogSource

pub mod batch;
pub mod list_import;
pub mod merge;
pub mod progress;
pub mod worker;

pub use batch::{TieBreak, build_incoming, item_engine_version, sort_items};
pub use list_import::{
    FetchResult, ImportError, ListOptions, ListOutcome, ListStats, fetch_all, merge_into,
    run_list,
};
pub use merge::{MergeOutcome, MergeStats, MergeWarning, merge_record, merge_records};
pub use progress::{ImportProgress, LogProgress, SilentProgress};
pub use worker::{FetchEvent, FetchHandle, spawn_fetch};
