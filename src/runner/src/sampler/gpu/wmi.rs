use super::{run_tool, GpuProbe, GpuReading};
use std::time::Duration;

/// Detection-only probe for Windows adapters that expose no utilization counters.
///
/// Every AMD/Radeon or Intel adapter found contributes a zeroed reading, so the run still records
/// that a GPU was present.
pub struct WmiProbe {
    timeout: Duration,
}

impl WmiProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GpuProbe for WmiProbe {
    fn vendor(&self) -> &'static str {
        "wmi"
    }

    fn probe(&self) -> Option<Vec<GpuReading>> {
        if !cfg!(windows) {
            return None;
        }

        let output = run_tool(
            "wmic",
            &["path", "Win32_VideoController", "get", "Name"],
            self.timeout,
        )?;
        if !output.success || output.timed_out {
            return None;
        }

        parse_adapter_names(&output.stdout)
    }
}

/// Adapter names from `wmic ... get Name`: a `Name` header followed by one name per line.
pub fn adapter_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_adapter_names(stdout: &str) -> Option<Vec<GpuReading>> {
    let mut amd = 0;
    let mut intel = 0;
    let mut readings = Vec::new();

    for name in adapter_names(stdout) {
        if name.contains("AMD") || name.contains("Radeon") {
            readings.push(GpuReading::new(format!("AMD-{amd}"), 0.0, 0.0, 0.0));
            amd += 1;
        } else if name.contains("Intel") {
            readings.push(GpuReading::new(format!("Intel-{intel}"), 0.0, 0.0, 0.0));
            intel += 1;
        }
    }

    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}
