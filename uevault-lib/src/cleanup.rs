//! Purging derived data: logs, manifests, temporary files, backups and,
//! on request, cached catalog data and images.

use std::fs;
use std::io;
use std::path::Path;

use crate::settings::CacheSettings;

/// Marker inserted in the name of backup copies.
pub const BACKUP_MARKER: &str = ".BACKUP_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Also remove saved catalog items.
    pub delete_metadata: bool,
    /// Also remove scraped store-page data.
    pub delete_extra: bool,
    /// Also remove cached images.
    pub delete_images: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub bytes_freed: u64,
}

impl CleanupReport {
    fn add(&mut self, other: CleanupReport) {
        self.files_removed += other.files_removed;
        self.bytes_freed += other.bytes_freed;
    }
}

/// Remove the files directly inside `dir` accepted by `matches`. A missing
/// directory is not an error.
fn clean_dir(dir: &Path, matches: impl Fn(&Path) -> bool) -> io::Result<CleanupReport> {
    let mut report = CleanupReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_file() && matches(&path) {
            if let Ok(meta) = fs::metadata(&path) {
                report.bytes_freed += meta.len();
            }
            fs::remove_file(&path)?;
            report.files_removed += 1;
        }
    }
    log::debug!("Removed {} files from {}", report.files_removed, dir.display());
    Ok(report)
}

/// Backup copies of `data_source`, e.g. `assets.BACKUP_24-05-01_10-00-00.csv`.
fn is_backup_of(data_source: &Path, candidate: &Path) -> bool {
    let (Some(stem), Some(name)) = (data_source.file_stem(), candidate.file_name()) else {
        return false;
    };
    let prefix = format!("{}{}", stem.to_string_lossy(), BACKUP_MARKER);
    name.to_string_lossy().starts_with(&prefix)
}

/// Remove derived data. Logs, manifests, temporary files and backups of the
/// data source always go; the rest depends on `options`.
pub fn cleanup(
    cache: &CacheSettings,
    data_source: Option<&Path>,
    options: CleanupOptions,
) -> io::Result<CleanupReport> {
    let mut report = CleanupReport::default();
    let any = |_: &Path| true;

    if options.delete_metadata {
        log::info!("Removing saved catalog items...");
        report.add(clean_dir(&cache.metadata_dir, any)?);
    }
    if options.delete_extra {
        log::info!("Removing store-page data...");
        report.add(clean_dir(&cache.extra_dir, any)?);
    }
    if options.delete_images {
        log::info!("Removing cached images...");
        report.add(clean_dir(&cache.image_dir, any)?);
    }

    log::info!("Removing logs and backups...");
    report.add(clean_dir(&cache.log_dir, any)?);
    if let Some(source) = data_source
        && let Some(dir) = source.parent()
    {
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        report.add(clean_dir(dir, |p| is_backup_of(source, p))?);
    }

    log::info!("Removing manifests...");
    report.add(clean_dir(&cache.manifest_dir, any)?);

    log::info!("Removing temporary data...");
    report.add(clean_dir(&cache.tmp_dir, any)?);

    Ok(report)
}

/// Format a byte count as MiB with two decimals.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.02} MiB", bytes as f64 / 1024.0 / 1024.0)
}

#[cfg(test)]
#[path = "tests/cleanup_tests.rs"]
mod tests;
