//! Logging setup for binaries embedding the retrying clients.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host process. These helpers cover the usual choices: a log file
//! under the XDG state dir, or stderr when that is not writable.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,retryhttp=debug,retryhttp_core=debug";
const LOG_FILE_NAME: &str = "retryhttp.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `~/.local/state/retryhttp/retryhttp.log` (or `$XDG_STATE_HOME/...`).
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryhttp")?;
    Ok(xdg_dirs.get_state_home().join(LOG_FILE_NAME))
}

/// Install a global subscriber appending to the default log file.
/// Returns the path written to.
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    init_logging_to(&path)?;
    Ok(path)
}

/// Install a global subscriber appending to `path`, creating parent dirs.
/// Fails if the file can't be opened or a subscriber is already installed.
pub fn init_logging_to(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    tracing::info!(path = %path.display(), "logging initialized");
    Ok(())
}

/// Log to stderr only. No-op if a global subscriber is already installed.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// File logging when possible, stderr otherwise. Returns the log file path
/// if file logging was installed.
pub fn init_logging_or_stderr() -> Option<PathBuf> {
    match init_logging() {
        Ok(path) => Some(path),
        Err(e) => {
            init_logging_stderr();
            tracing::warn!(error = %e, "file logging unavailable, using stderr");
            None
        }
    }
}
