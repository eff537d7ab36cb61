pub mod config;
pub mod fields;
pub mod parse;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trade-ingest",
    about = "Normalize trade-history CSV exports into canonical trade records."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/trade-ingest/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log header resolution and skipped lines to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a CSV export and report valid and invalid rows.
    Parse {
        /// Path to the CSV file
        file: PathBuf,
        /// Print the full parse result as JSON
        #[arg(long)]
        json: bool,
        /// Timezone for timestamps without an offset (e.g. utc, EST, +02:00, Europe/London)
        #[arg(long)]
        timezone: Option<String>,
        /// Only list rows that failed validation
        #[arg(long = "errors-only")]
        errors_only: bool,
    },
    /// Show which canonical field each header resolves to.
    Match {
        /// Column headers to resolve
        #[arg(required = true)]
        headers: Vec<String>,
    },
    /// List canonical fields and their accepted header spellings.
    Fields,
    /// Show or update settings.
    Config {
        /// Set the default timezone for offset-less timestamps
        #[arg(long = "set-timezone")]
        set_timezone: Option<String>,
    },
}
