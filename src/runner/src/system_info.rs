use crate::preflight::interpreter_version;
use crate::report::SECTION_RULE_WIDTH;
use crate::sampler::gpu::{run_tool, wmi};
use crate::tee::Console;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;
use sysinfo::System;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Host facts printed at the top of a run log when the operator agrees to share them.
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub arch: String,
    pub cpu: String,
    pub gpus: Vec<String>,
    pub total_ram_gb: f64,
    pub interpreter: String,
    pub interpreter_version: Option<String>,
}

impl DebugInfo {
    pub fn collect(interpreter: &str, probe_timeout: Duration) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();

        let cpu = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            arch: std::env::consts::ARCH.to_string(),
            cpu,
            gpus: gpu_names(probe_timeout),
            total_ram_gb: system.total_memory() as f64 / BYTES_PER_GB,
            interpreter: interpreter.to_string(),
            interpreter_version: interpreter_version(interpreter),
        }
    }

    pub fn gpu_label(&self) -> String {
        if self.gpus.is_empty() {
            "Not detected".to_string()
        } else {
            self.gpus.join(", ")
        }
    }
}

/// Adapter names, best effort: `nvidia-smi` first, then WMI on Windows.
pub fn gpu_names(timeout: Duration) -> Vec<String> {
    if let Some(output) = run_tool("nvidia-smi", &["--query-gpu=name", "--format=csv,noheader"], timeout) {
        if output.success {
            let names: Vec<String> = output
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                return names;
            }
        }
    }

    if cfg!(windows) {
        if let Some(output) = run_tool("wmic", &["path", "Win32_VideoController", "get", "Name"], timeout) {
            if output.success {
                return wmi::adapter_names(&output.stdout);
            }
        }
    }

    Vec::new()
}

/// Opening block of the transcript. Without consent only the start time is recorded.
pub fn write_banner(console: &mut Console, info: Option<&DebugInfo>, started_at: DateTime<Local>) {
    match info {
        Some(info) => {
            console.println("=== DEBUGGING INFORMATION ===");
            console.println(format!("Operating System: {} {}", info.os_name, info.kernel_version));
            console.println(format!("OS Version: {}", info.os_version));
            console.println(format!("Machine: {}", info.arch));
            console.println(format!("CPU: {}", info.cpu));
            console.println(format!("GPU: {}", info.gpu_label()));
            console.println(format!("Total RAM: {:.2} GB", info.total_ram_gb));
            console.println(format!(
                "Interpreter: {} {}",
                info.interpreter,
                info.interpreter_version.as_deref().unwrap_or("(version unknown)")
            ));
        }
        None => console.println("User did not consent to collect debugging information."),
    }
    console.println(format!(
        "Log Started: {}",
        started_at.format("%Y-%m-%d %H:%M:%S%.6f")
    ));
    console.println("=".repeat(SECTION_RULE_WIDTH));
    console.blank();
}
