use crate::{info_message, warning_message};
use anyhow::Result;
use colored::Colorize;
use pipeline_runner::config::Config;
use serde_json::json;

pub fn probe_gpu(config: &Config, json: bool) -> Result<()> {
    let probes = config.probe_set()?;
    let results = probes.probe_each();

    if json {
        let output: Vec<_> = results
            .iter()
            .map(|(vendor, readings)| json!({ "probe": vendor, "readings": readings }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if results.is_empty() {
        warning_message!("No GPU probes configured");
        return Ok(());
    }

    info_message!(
        "Probe order: {} (mode: {:?})",
        probes.vendors().join(", "),
        probes.mode()
    );
    for (vendor, readings) in &results {
        match readings {
            Some(readings) if !readings.is_empty() => {
                println!("  {}", vendor.green().bold());
                for r in readings {
                    println!(
                        "    {:<10} util {:>5.1}%  mem {:>5.1}%  ({:.0} MB)",
                        r.vendor, r.utilization, r.memory_percent, r.memory_used_mb
                    );
                }
            }
            _ => println!("  {} {}", vendor.dimmed(), "no data".dimmed()),
        }
    }
    Ok(())
}
