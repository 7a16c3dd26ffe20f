use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

pub const DIAGNOSTICS_DIR: &str = "diagnostics";
pub const DIAGNOSTICS_FILE: &str = "runner.log";

pub fn diagnostics_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(DIAGNOSTICS_DIR).join(DIAGNOSTICS_FILE)
}

/// Route `tracing` output to `<log_dir>/diagnostics/runner.log`, apart from the run transcript.
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn setup_logging(log_dir: &Path, default_filter: &str) -> Result<PathBuf> {
    let dir = log_dir.join(DIAGNOSTICS_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create diagnostics directory {}", dir.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &dir, DIAGNOSTICS_FILE);

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_timer(SystemTime)
        .with_writer(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let path = diagnostics_log_path(log_dir);
    tracing::info!("Logging system initialized. Writing to {}", path.display());

    Ok(path)
}
