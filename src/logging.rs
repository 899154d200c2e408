use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "analytics-dashboard.log";

/// `debug` lets `RUST_LOG` choose the level (defaulting to debug); otherwise
/// the level is fixed at info so a stray `RUST_LOG` does not flood the log.
fn filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

/// Log to stderr. Used by the one-shot subcommands.
pub fn init_stderr(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to a daily-rolling file, since the dashboard owns the terminal. Keep
/// the returned guard alive until exit or buffered lines are lost.
pub fn init_file(directory: &Path, debug: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}
