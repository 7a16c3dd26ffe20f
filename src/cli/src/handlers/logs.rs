use crate::{info_message, success_message, warning_message};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use pipeline_runner::config::Config;
use pipeline_runner::logging::diagnostics_log_path;
use pipeline_runner::retention::list_run_logs;
use std::fs;

pub fn logs(config: &Config, last: bool) -> Result<()> {
    let log_dir = config.log_dir_path();
    let run_logs = list_run_logs(&log_dir)?;

    if run_logs.is_empty() {
        warning_message!("No run logs found in {}", log_dir.display());
        return Ok(());
    }

    if last {
        if let Some(newest) = run_logs.last() {
            info_message!("Showing {}", newest.display());
            let contents = fs::read_to_string(newest)
                .with_context(|| format!("failed to read {}", newest.display()))?;
            print!("{contents}");
        }
        return Ok(());
    }

    success_message!(
        "{} run log(s) in {} (limit {})",
        run_logs.len(),
        log_dir.display(),
        config.max_log_files
    );
    for path in &run_logs {
        let metadata = fs::metadata(path)
            .with_context(|| format!("failed to read metadata for {}", path.display()))?;
        let modified = metadata
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("  {name:<28} {modified}  {:>8} bytes", metadata.len());
    }

    let diagnostics = diagnostics_log_path(&log_dir);
    if diagnostics.exists() {
        info_message!("Diagnostics log: {}", diagnostics.display());
    }
    Ok(())
}
