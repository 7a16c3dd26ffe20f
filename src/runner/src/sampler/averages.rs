use super::{ResourceSample, TickOutcome};
use serde::Serialize;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuAverages {
    pub utilization: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
}

/// Reduction of one sampling window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceAverages {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used_bytes: f64,
    /// Absent when no probe produced a reading during the window, which is distinct from a
    /// GPU that was present but idle.
    pub gpu: Option<GpuAverages>,
    pub samples: usize,
    pub failed_ticks: usize,
}

impl ResourceAverages {
    /// GPU readings are pooled across every vendor and every tick rather than averaged per
    /// vendor first.
    pub fn from_outcomes(outcomes: &[TickOutcome]) -> Self {
        let samples: Vec<&ResourceSample> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        let failed_ticks = outcomes.len() - samples.len();

        let cpu_percent = mean(samples.iter().map(|s| s.cpu_percent as f64));
        let ram_percent = mean(samples.iter().map(|s| s.ram.percent));
        let ram_used_bytes = mean(samples.iter().map(|s| s.ram.used_bytes as f64));

        let gpu_readings: Vec<_> = samples
            .iter()
            .filter_map(|s| s.gpu.as_ref())
            .flatten()
            .collect();

        let gpu = if gpu_readings.is_empty() {
            None
        } else {
            Some(GpuAverages {
                utilization: mean(gpu_readings.iter().map(|r| r.utilization)),
                memory_percent: mean(gpu_readings.iter().map(|r| r.memory_percent)),
                memory_used_mb: mean(gpu_readings.iter().map(|r| r.memory_used_mb)),
            })
        };

        Self {
            cpu_percent,
            ram_percent,
            ram_used_bytes,
            gpu,
            samples: samples.len(),
            failed_ticks,
        }
    }

    pub fn ram_used_gb(&self) -> f64 {
        self.ram_used_bytes / BYTES_PER_GB
    }
}

/// Arithmetic mean, 0 for an empty sequence.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SampleError;
    use crate::sampler::gpu::GpuReading;
    use crate::sampler::MemoryReading;
    use chrono::Local;

    fn sample(cpu: f32, ram_percent: f64, ram_used: u64, gpu: Option<Vec<GpuReading>>) -> TickOutcome {
        Ok(ResourceSample {
            taken_at: Local::now(),
            cpu_percent: cpu,
            ram: MemoryReading {
                percent: ram_percent,
                used_bytes: ram_used,
            },
            gpu,
        })
    }

    #[test]
    fn test_empty_window_defaults_to_zero_and_absent_gpu() {
        let averages = ResourceAverages::from_outcomes(&[]);

        assert_eq!(averages.cpu_percent, 0.0);
        assert_eq!(averages.ram_percent, 0.0);
        assert_eq!(averages.ram_used_bytes, 0.0);
        assert!(averages.gpu.is_none());
        assert_eq!(averages.samples, 0);
    }

    #[test]
    fn test_gpu_pooled_across_vendors_and_ticks() {
        let outcomes = vec![
            sample(10.0, 40.0, 100, Some(vec![GpuReading::new("vendorA", 10.0, 20.0, 100.0)])),
            sample(30.0, 60.0, 300, Some(vec![GpuReading::new("vendorB", 30.0, 40.0, 200.0)])),
        ];

        let averages = ResourceAverages::from_outcomes(&outcomes);

        assert_eq!(averages.cpu_percent, 20.0);
        assert_eq!(averages.ram_percent, 50.0);
        assert_eq!(averages.ram_used_bytes, 200.0);
        assert_eq!(
            averages.gpu,
            Some(GpuAverages {
                utilization: 20.0,
                memory_percent: 30.0,
                memory_used_mb: 150.0,
            })
        );
    }

    #[test]
    fn test_pooling_weights_each_reading_not_each_tick() {
        let outcomes = vec![
            sample(
                0.0,
                0.0,
                0,
                Some(vec![
                    GpuReading::new("NVIDIA-0", 90.0, 0.0, 0.0),
                    GpuReading::new("NVIDIA-1", 30.0, 0.0, 0.0),
                ]),
            ),
            sample(0.0, 0.0, 0, None),
            sample(0.0, 0.0, 0, Some(vec![GpuReading::new("NVIDIA-0", 0.0, 0.0, 0.0)])),
        ];

        let gpu = ResourceAverages::from_outcomes(&outcomes).gpu.unwrap();
        assert_eq!(gpu.utilization, 40.0);
    }

    #[test]
    fn test_idle_gpu_is_present_but_zero() {
        let outcomes = vec![sample(5.0, 5.0, 5, Some(vec![GpuReading::new("Intel-0", 0.0, 0.0, 0.0)]))];

        let gpu = ResourceAverages::from_outcomes(&outcomes).gpu;
        assert_eq!(
            gpu,
            Some(GpuAverages {
                utilization: 0.0,
                memory_percent: 0.0,
                memory_used_mb: 0.0,
            })
        );
    }

    #[test]
    fn test_failed_ticks_are_counted_not_averaged() {
        let outcomes = vec![
            sample(50.0, 10.0, 10, None),
            Err(SampleError::NoCpuData),
            Err(SampleError::Reader("boom".into())),
        ];

        let averages = ResourceAverages::from_outcomes(&outcomes);

        assert_eq!(averages.cpu_percent, 50.0);
        assert_eq!(averages.samples, 1);
        assert_eq!(averages.failed_ticks, 2);
    }
}
