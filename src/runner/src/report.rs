use crate::sampler::ResourceAverages;
use crate::tee::Console;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const SECTION_RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    SkippedByUser { dependency: String },
    Failed { reason: String },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Completed => write!(f, "Completed"),
            StepOutcome::SkippedByUser { dependency } => {
                write!(f, "Skipped (missing '{dependency}' not installed)")
            }
            StepOutcome::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration: Duration,
    pub attempts: u32,
    pub resources: ResourceAverages,
    pub outcome: StepOutcome,
}

impl StepReport {
    /// Per-step block printed once the step reaches a terminal state.
    pub fn write_to(&self, console: &mut Console) {
        let resources = &self.resources;

        console.blank();
        console.println(format!("--- {} COMPLETED ---", self.name));
        console.println(format!("Outcome: {}", self.outcome));
        console.println(format!("Duration: {:.2} seconds", self.duration.as_secs_f64()));
        console.println(format!("Average CPU Usage: {:.1}%", resources.cpu_percent));
        console.println(format!(
            "Average RAM Usage: {:.1}% ({:.2} GB)",
            resources.ram_percent,
            resources.ram_used_gb()
        ));
        match &resources.gpu {
            Some(gpu) => {
                console.println(format!("Average GPU Usage: {:.1}%", gpu.utilization));
                console.println(format!(
                    "Average GPU Memory: {:.1}% ({:.0} MB)",
                    gpu.memory_percent, gpu.memory_used_mb
                ));
            }
            None => console.println("GPU Usage: Not available"),
        }
        console.println("=".repeat(SECTION_RULE_WIDTH));
        console.blank();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration: Duration,
    pub reports: Vec<StepReport>,
    pub log_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::SkippedByUser { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
            .count()
    }

    pub fn write_to(&self, console: &mut Console) {
        console.println("=== PIPELINE COMPLETED ===");
        console.println(format!(
            "Total execution time: {:.2} seconds",
            self.duration.as_secs_f64()
        ));
        console.println(format!(
            "Steps: {} completed, {} skipped, {} failed",
            self.completed(),
            self.skipped(),
            self.failed()
        ));
        for report in &self.reports {
            console.println(format!(
                "  {:<28} {:>8.2}s  {}",
                report.name,
                report.duration.as_secs_f64(),
                report.outcome
            ));
        }
        console.println(format!(
            "Log ended: {}",
            self.finished_at.format("%Y-%m-%d %H:%M:%S%.6f")
        ));
    }
}
