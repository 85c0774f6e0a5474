//! CSV subsets: selected rows and columns, and the user-field file.

use std::fs;
use std::path::Path;

use uevault_catalog::codec;
use uevault_catalog::schema;
use uevault_catalog::{Record, field};

use crate::error::StorageError;
use crate::flat_file::delimiter_for;

/// Columns of the user-field file: the key followed by every user field.
pub fn user_field_columns() -> Vec<&'static str> {
    let mut columns = vec![field::ASSET_ID];
    columns.extend(schema::user_fields());
    columns
}

/// Write the given fields of the given records. Tab separated when the
/// destination ends in `.tsv`. Returns the number of rows written.
pub fn export_subset<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    fields: &[&str],
    destination: &Path,
) -> Result<usize, StorageError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::write(destination, e))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(destination))
        .from_path(destination)
        .map_err(|e| StorageError::write(destination, e))?;
    writer
        .write_record(fields)
        .map_err(|e| StorageError::write(destination, e))?;

    let mut count = 0;
    for record in records {
        writer
            .write_record(
                fields
                    .iter()
                    .map(|name| record.get(name).map(|v| v.to_cell()).unwrap_or_default()),
            )
            .map_err(|e| StorageError::write(destination, e))?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|e| StorageError::write(destination, e))?;
    log::info!("Exported {count} rows to {}", destination.display());
    Ok(count)
}

/// Write the user-field file for the given records.
pub fn export_user_fields<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    destination: &Path,
) -> Result<usize, StorageError> {
    export_subset(records, &user_field_columns(), destination)
}

/// Read a CSV subset back as partial records. Rows without an asset id are skipped.
pub fn read_subset(source: &Path) -> Result<Vec<Record>, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter_for(source))
        .from_path(source)
        .map_err(|e| StorageError::read(source, e))?;
    let headers = reader
        .headers()
        .map_err(|e| StorageError::read(source, e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| StorageError::read(source, e))?;
        let (record, errors) = codec::decode_cells(headers.iter().zip(row.iter()));
        for err in errors {
            log::warn!("{}: {err}", source.display());
        }
        if record.asset_id().is_some() {
            records.push(record);
        }
    }
    Ok(records)
}
