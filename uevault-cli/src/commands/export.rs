use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use uevault_catalog::schema;
use uevault_lib::VaultContext;

use crate::error::CliError;

/// Export the rows matching `filter`, or every row, to a CSV file.
pub(crate) fn run_export_selection(
    ctx: &VaultContext,
    output: PathBuf,
    source: Option<PathBuf>,
    filter: Option<String>,
    fields: Option<Vec<String>>,
) -> Result<(), CliError> {
    let data_source = ctx.data_source(source)?;

    let fields: Vec<&'static str> = match &fields {
        Some(names) => names
            .iter()
            .map(|name| {
                schema::find_field(name.trim())
                    .map(|spec| spec.name)
                    .ok_or_else(|| CliError::invalid_argument(format!("unknown column '{name}'")))
            })
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    let compiled = match &filter {
        Some(query) => Some(ctx.filter_engine().compile(query).map_err(|e| {
            CliError::invalid_argument(e.to_string())
        })?),
        None => None,
    };

    let mut view = ctx.open_view(&data_source)?;
    if view.is_placeholder_only() {
        log::warn!(
            "{} {} holds no assets",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            data_source.display(),
        );
        return view.close().map_err(Into::into);
    }
    view.apply_filter(compiled);
    view.paginate(0);

    let rows: Vec<usize> = (0..view.filtered_len()).collect();
    let written = view.export_rows(&rows, &fields, &output)?;
    view.close()?;

    log::info!(
        "{} {} rows written to {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        written.if_supports_color(Stdout, |t| t.bold()),
        output.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}
