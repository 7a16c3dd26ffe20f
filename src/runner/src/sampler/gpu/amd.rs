use super::{run_tool, GpuProbe, GpuReading};
use serde_json::Value;
use std::time::Duration;

const UTILIZATION_KEYS: &[&str] = &["GPU use (%)"];
const MEMORY_PERCENT_KEYS: &[&str] = &["GPU Memory Allocated (VRAM%)", "GPU memory use (%)"];

pub struct AmdProbe {
    timeout: Duration,
}

impl AmdProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GpuProbe for AmdProbe {
    fn vendor(&self) -> &'static str {
        "amd"
    }

    fn probe(&self) -> Option<Vec<GpuReading>> {
        let output = run_tool(
            "rocm-smi",
            &["--showuse", "--showmemuse", "--json"],
            self.timeout,
        )?;

        if !output.success || output.timed_out {
            return None;
        }

        parse_rocm_smi(&output.stdout)
    }
}

/// rocm-smi prints JSON when asked and supported; older builds fall back to a text table.
pub fn parse_rocm_smi(stdout: &str) -> Option<Vec<GpuReading>> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(json) => parse_rocm_smi_json(&json),
        Err(_) => parse_rocm_smi_table(stdout),
    }
}

fn parse_rocm_smi_json(json: &Value) -> Option<Vec<GpuReading>> {
    let cards = json.as_object()?;

    let mut readings = Vec::new();
    for (key, card) in cards.iter().filter(|(key, _)| key.starts_with("card")) {
        let index = key[4..].parse::<u32>().ok()?;
        let utilization = first_number(card, UTILIZATION_KEYS)?;
        let memory_percent = first_number(card, MEMORY_PERCENT_KEYS).unwrap_or(0.0);

        // memory in MB is not part of this query
        readings.push(GpuReading::new(
            format!("AMD-{index}"),
            utilization,
            memory_percent,
            0.0,
        ));
    }

    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}

fn first_number(card: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| card.get(*key))
        .filter_map(|v| v.as_str())
        .find_map(|s| s.trim().trim_end_matches('%').parse::<f64>().ok())
}

/// Table form: a header line, then one whitespace separated row per GPU where the third and
/// fourth columns hold utilization and memory use percentages.
fn parse_rocm_smi_table(stdout: &str) -> Option<Vec<GpuReading>> {
    let mut readings = Vec::new();

    for line in stdout.lines().skip(1).filter(|l| l.contains("GPU")) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let utilization = parts[2].trim_end_matches('%').parse::<f64>().ok()?;
        let memory_percent = parts[3].trim_end_matches('%').parse::<f64>().ok()?;

        readings.push(GpuReading::new(
            format!("AMD-{}", readings.len()),
            utilization,
            memory_percent,
            0.0,
        ));
    }

    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}
