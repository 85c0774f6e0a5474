//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use uevault_import::TieBreak;

#[derive(Parser)]
#[command(name = "uevault")]
#[command(about = "Manage a local library of marketplace assets", long_about = None)]
pub(crate) struct Cli {
    /// Settings file to use instead of the default one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where catalog items come from and which ones to keep.
#[derive(Args, Clone)]
pub(crate) struct CatalogArgs {
    /// Directory of saved catalog items (defaults to the metadata cache)
    #[arg(long)]
    pub catalog_dir: Option<PathBuf>,

    /// Only keep items whose category contains this text
    #[arg(long)]
    pub category: Option<String>,

    /// Stop after this many items
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Which variant to keep when several items share an asset id
    #[arg(long, value_enum)]
    pub tie_break: Option<TieBreakArg>,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum TieBreakArg {
    /// App name, descending
    Name,
    /// Highest supported engine version first
    EngineVersion,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Name => TieBreak::NameDescending,
            TieBreakArg::EngineVersion => TieBreak::HighestEngineVersion,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Fetch catalog items and merge them into the data source
    List {
        /// CSV/TSV file or SQLite database (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[command(flatten)]
        catalog: CatalogArgs,

        /// Only keep owned items
        #[arg(long)]
        owned: bool,

        /// Copy the data source aside before writing it
        #[arg(long)]
        backup: bool,
    },

    /// Scan the whole catalog, save every item to the metadata cache and
    /// merge the result into the data source
    Scrap {
        /// CSV/TSV file or SQLite database (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,

        #[command(flatten)]
        catalog: CatalogArgs,

        /// Do not write the fetched items to the metadata cache
        #[arg(long)]
        no_files: bool,
    },

    /// Write the rows matching a filter to a CSV file
    ExportSelection {
        /// Destination CSV file
        output: PathBuf,

        /// CSV/TSV file or SQLite database (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Filter expression or saved filter name (all rows when omitted)
        #[arg(short, long)]
        filter: Option<String>,

        /// Columns to export (e.g., "Asset_id,App title,Price"), all when omitted
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Move user-entered fields of a SQLite database in and out of CSV
    UserFields {
        #[command(subcommand)]
        action: UserFieldsAction,
    },

    /// Remove logs, manifests, temporary files and backups
    Cleanup {
        /// Data source whose backups are removed (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Also remove saved catalog items
        #[arg(long)]
        delete_metadata: bool,

        /// Also remove scraped store-page data
        #[arg(long)]
        delete_extra: bool,

        /// Also remove cached images
        #[arg(long)]
        delete_images: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum UserFieldsAction {
    /// Write the user fields of every asset to a CSV file
    Export {
        output: PathBuf,

        /// SQLite database (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// Apply a user-field CSV to the stored assets
    Import {
        input: PathBuf,

        /// SQLite database (defaults to the configured one)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}
