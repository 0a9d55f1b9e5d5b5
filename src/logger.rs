//! Logging setup for buildtidy
//!
//! Normally only warnings are logged, to stderr. When debug logging is
//! enabled (config `[logging] debug = true` or `--debug`), every visited file,
//! pruned directory and conversion is logged to ~/.buildtidy/buildtidy.log.
//! `RUST_LOG` overrides the default filter in either mode.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

const LOG_FILE_NAME: &str = "buildtidy.log";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize logging
///
/// Returns the path to the log file when debug logging is enabled and the
/// file could be opened, otherwise None.
pub fn init_logging(debug_enabled: bool) -> Result<Option<PathBuf>> {
    if !debug_enabled {
        let subscriber = registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .with(filter("buildtidy=warn"));

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;
        return Ok(None);
    }

    let log_path = crate::config::config_dir()?.join(LOG_FILE_NAME);

    match open_log_file(&log_path) {
        Ok(log_file) => {
            let subscriber = registry()
                .with(
                    fmt::layer()
                        .with_writer(log_file)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .with(filter("buildtidy=debug"));

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

            Ok(Some(log_path))
        }
        Err(e) => {
            // A broken log file must not stop the tools from running
            eprintln!("Warning: Could not create log file: {:#}", e);
            Ok(None)
        }
    }
}

/// Open (creating if needed) a log file for appending
fn open_log_file(log_path: &Path) -> Result<fs::File> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))
}
