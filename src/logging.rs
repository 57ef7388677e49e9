//! Log output for the command-line tool.
//!
//! Console output goes to stderr, filtered by `RUST_LOG` (default `info`).
//! A copy of every event is appended to the log file when one is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::{ResolverError, Result};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for the whole run.
pub fn init(log_file: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ResolverError::Config(format!(
                        "cannot open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| ResolverError::Config(format!("logging already initialised: {}", e)))?;

    Ok(guard)
}
