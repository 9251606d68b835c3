use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::TabulaConfig;

/// Log file prefix; files roll daily as `tabula.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "tabula";

/// Daily log file under `~/.tabula/logs` plus compact stderr output.
///
/// `RUST_LOG` overrides `default_filter`. Keep the returned guard alive until
/// exit or buffered lines are lost.
pub fn init_logging(default_filter: &str) -> Result<WorkerGuard> {
    install(&TabulaConfig::logs_dir()?, default_filter, true)
}

/// File-only logging into `logs_dir`, for tests and embedding.
pub fn init_logging_to_dir(logs_dir: &Path, filter: &str) -> Result<WorkerGuard> {
    install(logs_dir, filter, false)
}

fn install(logs_dir: &Path, default_filter: &str, console: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}
