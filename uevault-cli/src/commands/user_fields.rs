use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use uevault_catalog::BackendKind;
use uevault_db::{SqliteBackend, StorageBackend, kind_for_path};
use uevault_lib::VaultContext;

use crate::error::CliError;

/// Open and load the database, refusing flat files.
fn open_database(path: &Path) -> Result<SqliteBackend, CliError> {
    if kind_for_path(path) != BackendKind::Relational {
        return Err(CliError::invalid_argument(format!(
            "{} is not a SQLite database",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(CliError::storage(format!("{} does not exist", path.display())));
    }
    let mut backend = SqliteBackend::new(path);
    backend.load_all()?;
    Ok(backend)
}

pub(crate) fn run_export(
    ctx: &VaultContext,
    output: PathBuf,
    source: Option<PathBuf>,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source)?;
    let mut backend = open_database(&data_source)?;
    let written = backend.export_user_fields(&output)?;
    backend.close()?;

    log::info!(
        "{} User fields of {} assets written to {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        written.if_supports_color(Stdout, |t| t.bold()),
        output.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}

pub(crate) fn run_import(
    ctx: &VaultContext,
    input: PathBuf,
    source: Option<PathBuf>,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source)?;
    let mut backend = open_database(&data_source)?;
    let updated = backend.import_user_fields(&input)?;
    backend.close()?;

    log::info!(
        "{} {} assets updated from {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        updated.if_supports_color(Stdout, |t| t.bold()),
        input.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}
