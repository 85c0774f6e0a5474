//! Fetch progress reporting.

/// Trait for receiving progress updates from a catalog fetch.
pub trait ImportProgress {
    /// Called once the number of items to fetch is known.
    fn on_start(&self, _total: usize) {}

    /// Called when one item could not be fetched.
    fn on_item_failed(&self, _name: &str, _reason: &str) {}

    /// Called after each catalog item is fetched.
    fn on_item(&self, current: usize, total: usize, name: &str);

    /// Called when a phase starts (e.g., "Merging 120 assets").
    fn on_phase(&self, message: &str);

    /// Called when the run is complete.
    fn on_complete(&self, message: &str);
}

/// A no-op progress reporter that discards all updates.
pub struct SilentProgress;

impl ImportProgress for SilentProgress {
    fn on_item(&self, _current: usize, _total: usize, _name: &str) {}
    fn on_phase(&self, _message: &str) {}
    fn on_complete(&self, _message: &str) {}
}

/// A progress reporter that logs to the `log` crate.
pub struct LogProgress;

impl ImportProgress for LogProgress {
    fn on_item(&self, current: usize, total: usize, name: &str) {
        if current.is_multiple_of(50) || current == total {
            log::info!("  [{}/{}] {}", current, total, name);
        }
    }

    fn on_phase(&self, message: &str) {
        log::info!("{}", message);
    }

    fn on_complete(&self, message: &str) {
        log::info!("{}", message);
    }
}
