//! Logging setup: file + stdout `tracing_subscriber` layers, writing under
//! the Windows `%LOCALAPPDATA%` convention via `dirs::data_local_dir()`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes a file + stdout tracing subscriber. Returns the log file path
/// for the caller to surface in `--help`/startup diagnostics if desired.
pub fn init_logging() -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .context("could not determine local app data directory")?
        .join("scrcap")
        .join("logs");

    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let log_file = log_dir.join("scrcap.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("failed to open log file: {}", log_file.display()))?;

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    tracing::info!(event = "logging_initialized", log_file = %log_file.display(), "logging initialized");

    Ok(log_file)
}
