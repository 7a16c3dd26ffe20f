use crate::operator::Operator;
use crate::session::is_run_log;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, PartialEq)]
pub enum RetentionOutcome {
    UnderLimit { count: usize },
    Deleted(PathBuf),
    Kept { count: usize },
    /// The operator agreed but the file could not be removed. Not fatal to the run.
    DeleteFailed { path: PathBuf, error: String },
}

/// Run logs in `log_dir`, oldest first by modification time.
pub fn list_run_logs(log_dir: &Path) -> Result<Vec<PathBuf>> {
    if !log_dir.exists() {
        return Ok(Vec::new());
    }

    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)
        .with_context(|| format!("failed to read log directory {}", log_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_run_log(&entry.file_name().to_string_lossy()))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    logs.sort();
    Ok(logs.into_iter().map(|(_, path)| path).collect())
}

/// Once `max_files` logs have accumulated, offer to delete the oldest one.
pub fn enforce_log_limit(
    log_dir: &Path,
    max_files: usize,
    operator: &dyn Operator,
) -> Result<RetentionOutcome> {
    let logs = list_run_logs(log_dir)?;
    let count = logs.len();
    if count < max_files || count == 0 {
        return Ok(RetentionOutcome::UnderLimit { count });
    }

    let oldest = &logs[0];
    let oldest_name = oldest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let delete = operator.confirm(
        "Log Cleanup",
        &format!(
            "There are {} log files in {}.\nWould you like to delete the oldest log file ({})?",
            count,
            log_dir.display(),
            oldest_name
        ),
    );

    if !delete {
        return Ok(RetentionOutcome::Kept { count });
    }

    if let Err(e) = fs::remove_file(oldest) {
        tracing::warn!("failed to delete log file {}: {e}", oldest.display());
        return Ok(RetentionOutcome::DeleteFailed {
            path: oldest.clone(),
            error: e.to_string(),
        });
    }
    tracing::info!("deleted oldest run log {}", oldest.display());
    Ok(RetentionOutcome::Deleted(oldest.clone()))
}
