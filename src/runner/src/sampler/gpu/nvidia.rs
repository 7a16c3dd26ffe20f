use super::{run_tool, GpuProbe, GpuReading};
use std::time::Duration;

pub struct NvidiaProbe {
    timeout: Duration,
}

impl NvidiaProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GpuProbe for NvidiaProbe {
    fn vendor(&self) -> &'static str {
        "nvidia"
    }

    fn probe(&self) -> Option<Vec<GpuReading>> {
        let output = run_tool(
            "nvidia-smi",
            &[
                "--query-gpu=utilization.gpu,memory.used,memory.total",
                "--format=csv,noheader,nounits",
            ],
            self.timeout,
        )?;

        if !output.success || output.timed_out {
            return None;
        }

        parse_nvidia_smi(&output.stdout)
    }
}

/// Parse `utilization, memory.used, memory.total` CSV rows (MiB, no units).
///
/// Any row that fails to parse invalidates the whole answer.
pub fn parse_nvidia_smi(stdout: &str) -> Option<Vec<GpuReading>> {
    // nvidia-smi can exit 0 and still print a driver failure banner
    if stdout.contains("NVIDIA-SMI has failed")
        || stdout.contains("couldn't communicate with the NVIDIA driver")
    {
        return None;
    }

    let mut readings = Vec::new();
    for (index, line) in stdout.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            continue;
        }

        let utilization = parts[0].parse::<f64>().ok()?;
        let memory_used = parts[1].parse::<f64>().ok()?;
        let memory_total = parts[2].parse::<f64>().ok()?;
        let memory_percent = if memory_total > 0.0 {
            (memory_used / memory_total) * 100.0
        } else {
            0.0
        };

        readings.push(GpuReading::new(
            format!("NVIDIA-{index}"),
            utilization,
            memory_percent,
            memory_used,
        ));
    }

    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}
