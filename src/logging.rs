// File-based logging
//
// The TUI owns the terminal, so tracing output goes to a log file instead of
// stdout/stderr. Level comes from RUST_LOG, defaulting to debug for this
// crate and warn for everything else.
//
// Writes go through a non-blocking appender. The returned guard flushes the
// background writer when dropped, so main keeps it alive until exit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "local_playlist_player=debug,warn";

pub fn init_logging(log_file: &Path) -> anyhow::Result<WorkerGuard> {
    let (log_dir, file_name) = split_log_path(log_file)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    // One file for the whole run, appended to across restarts
    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(path = %log_file.display(), "Logging initialized");
    Ok(guard)
}

// The appender wants a directory and a file name separately
fn split_log_path(log_file: &Path) -> anyhow::Result<(PathBuf, OsString)> {
    let file_name = log_file
        .file_name()
        .with_context(|| format!("Log path {} has no file name", log_file.display()))?
        .to_os_string();

    let log_dir = match log_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((log_dir, file_name))
}
