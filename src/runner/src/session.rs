use crate::tee::{Console, SharedLog};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const LOG_FILE_PREFIX: &str = "log_";
pub const LOG_FILE_SUFFIX: &str = ".txt";
const LOG_TIMESTAMP_FORMAT: &str = "%d%m%Y_%H%M%S";
const MAX_NAME_ATTEMPTS: usize = 100;

pub fn log_file_name(started_at: &DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        LOG_FILE_PREFIX,
        started_at.format(LOG_TIMESTAMP_FORMAT),
        LOG_FILE_SUFFIX
    )
}

pub fn is_run_log(file_name: &str) -> bool {
    file_name.starts_with(LOG_FILE_PREFIX) && file_name.ends_with(LOG_FILE_SUFFIX)
}

/// Owns the per-run log file for the duration of one pipeline run.
///
/// The transcript console is handed out from here rather than installed process-wide; dropping
/// the session flushes and closes the log on every exit path.
pub struct RunLogSession {
    path: PathBuf,
    started_at: DateTime<Local>,
    console: Console,
}

impl RunLogSession {
    pub fn open(log_dir: &Path) -> Result<Self> {
        Self::open_at(log_dir, Local::now())
    }

    pub fn open_at(log_dir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let (path, file) = Self::create_log_file(log_dir, &started_at)?;
        let console = Console::stdio(SharedLog::new(file));
        tracing::info!("run transcript opened at {}", path.display());

        Ok(Self {
            path,
            started_at,
            console,
        })
    }

    /// Session writing to an arbitrary console; the log path is informational only.
    pub fn with_console(path: PathBuf, started_at: DateTime<Local>, console: Console) -> Self {
        Self {
            path,
            started_at,
            console,
        }
    }

    /// Create a fresh log file, never reusing a name from an earlier run that started in the
    /// same second.
    fn create_log_file(log_dir: &Path, started_at: &DateTime<Local>) -> Result<(PathBuf, File)> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let base = log_file_name(started_at);
        let stem = base.trim_end_matches(LOG_FILE_SUFFIX);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{stem}_{attempt}{LOG_FILE_SUFFIX}")
            };
            let path = log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to create log file {}", path.display()))
                }
            }
        }
        bail!(
            "failed to create log file in {}: {} already taken",
            log_dir.display(),
            base
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Flush and release the log, returning its path.
    pub fn close(mut self) -> Result<PathBuf> {
        self.console.flush().context("failed to flush run log")?;
        Ok(self.path.clone())
    }
}

impl Drop for RunLogSession {
    fn drop(&mut self) {
        if let Err(e) = self.console.flush() {
            tracing::warn!("failed to flush run log {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_uses_day_first_timestamp() {
        let started_at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(log_file_name(&started_at), "log_07032025_090502.txt");
    }

    #[test]
    fn test_is_run_log() {
        assert!(is_run_log("log_07032025_090502.txt"));
        assert!(!is_run_log("runner.log"));
        assert!(!is_run_log("log_07032025_090502.txt.bak"));
    }

    #[test]
    fn test_open_creates_missing_log_dir() {
        let temp = tempfile::tempdir().unwrap();
        let log_dir = temp.path().join("nested").join("log");

        let session = RunLogSession::open(&log_dir).unwrap();
        let path = session.close().unwrap();

        assert!(path.exists());
        assert!(path.starts_with(&log_dir));
    }

    #[test]
    fn test_same_second_runs_keep_both_transcripts() {
        let temp = tempfile::tempdir().unwrap();
        let started_at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).unwrap();

        let mut first = RunLogSession::open_at(temp.path(), started_at).unwrap();
        first.console().println("first run");
        let first = first.close().unwrap();

        let mut second = RunLogSession::open_at(temp.path(), started_at).unwrap();
        second.console().println("second run");
        let second = second.close().unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "log_07032025_090502_1.txt");
        assert!(is_run_log("log_07032025_090502_1.txt"));
        assert_eq!(fs::read_to_string(first).unwrap(), "first run\n");
        assert_eq!(fs::read_to_string(second).unwrap(), "second run\n");
    }
}
