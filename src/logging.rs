//! Tracing setup.
//!
//! stderr always gets a layer filtered by `RUST_LOG` (default `warn`).
//! `--verbose` adds a daily-rolled debug log file in the log directory.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_PREFIX: &str = "sftp-mirror.log";

/// Install the global subscriber. Keep the returned guard alive until exit,
/// otherwise buffered file lines are lost.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose && log_dir.is_none() {
            EnvFilter::new("sftp_mirror=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match (verbose, log_dir) {
        (true, Some(dir)) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("sftp_mirror=debug"));
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    if let (Some(dir), true) = (log_dir, verbose) {
        tracing::info!("debug log directory: {}", dir.display());
    }
    Ok(guard)
}
