mod cli;
mod fmt;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use trade_ingest::settings::default_settings_path;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings_path = cli.config.unwrap_or_else(default_settings_path);
    let result = match cli.command {
        Commands::Parse {
            file,
            json,
            timezone,
            errors_only,
        } => cli::parse::run(&settings_path, &file, json, timezone.as_deref(), errors_only),
        Commands::Match { headers } => cli::fields::match_headers(&settings_path, &headers),
        Commands::Fields => cli::fields::list(&settings_path),
        Commands::Config { set_timezone } => cli::config::run(&settings_path, set_timezone.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
