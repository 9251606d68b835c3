mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use tabula_core::{TabulaConfig, logging};

use crate::cli::{Cli, Commands};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TabulaConfig::load_from_path(path)?,
        None => TabulaConfig::load()?,
    };

    let filter = cli.log.as_deref().unwrap_or(&config.log_level);
    let _log_guard = logging::init_logging(filter)?;
    info!("Starting tabula v{VERSION}");

    match &cli.command {
        Commands::Export(args) => {
            let out = commands::run_export(args, &config)?;
            println!("{}", out.display());
        }
        Commands::Describe(args) => {
            let described = commands::run_describe(args, &config)?;
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
    }
    Ok(())
}
