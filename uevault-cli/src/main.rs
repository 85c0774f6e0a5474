//! uevault CLI
//!
//! Command-line interface for managing a local library of marketplace assets.

mod cli_types;
mod commands;
mod error;
mod logging;

use clap::Parser;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use uevault_lib::{CleanupOptions, VaultContext};

use cli_types::{Cli, Commands, UserFieldsAction};
use error::CliError;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.quiet, cli.verbose, cli.logfile.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        std::process::exit(1);
    }

    let ctx = VaultContext::load(cli.config.clone());
    if let Err(e) = run(&ctx, cli) {
        log::error!(
            "{} {}",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            e,
        );
        std::process::exit(1);
    }
}

fn run(ctx: &VaultContext, cli: Cli) -> Result<(), CliError> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::List {
            source,
            catalog,
            owned,
            backup,
        } => commands::list::run_list(ctx, source, catalog, owned, backup, quiet),
        Commands::Scrap {
            source,
            catalog,
            no_files,
        } => commands::list::run_scrap(ctx, source, catalog, no_files, quiet),
        Commands::ExportSelection {
            output,
            source,
            filter,
            fields,
        } => commands::export::run_export_selection(ctx, output, source, filter, fields),
        Commands::UserFields { action } => match action {
            UserFieldsAction::Export { output, source } => {
                commands::user_fields::run_export(ctx, output, source)
            }
            UserFieldsAction::Import { input, source } => {
                commands::user_fields::run_import(ctx, input, source)
            }
        },
        Commands::Cleanup {
            source,
            delete_metadata,
            delete_extra,
            delete_images,
        } => commands::cleanup::run_cleanup(
            ctx,
            source,
            CleanupOptions {
                delete_metadata,
                delete_extra,
                delete_images,
            },
        ),
    }
}
