use crate::errors::SampleError;
use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryReading {
    pub percent: f64,
    pub used_bytes: u64,
}

/// Source of host-wide CPU and memory utilization.
pub trait SystemReader: Send {
    fn cpu_percent(&mut self) -> Result<f32, SampleError>;
    fn memory(&mut self) -> Result<MemoryReading, SampleError>;
}

pub struct SysinfoReader {
    system: System,
}

impl SysinfoReader {
    pub fn new() -> Self {
        let mut system = System::new();
        // the first CPU reading is only meaningful relative to an earlier refresh
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self { system }
    }
}

impl Default for SysinfoReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemReader for SysinfoReader {
    fn cpu_percent(&mut self) -> Result<f32, SampleError> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return Err(SampleError::NoCpuData);
        }
        Ok(self.system.global_cpu_usage())
    }

    fn memory(&mut self) -> Result<MemoryReading, SampleError> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(SampleError::NoMemoryData);
        }
        let used = self.system.used_memory();

        Ok(MemoryReading {
            percent: (used as f64 / total as f64) * 100.0,
            used_bytes: used,
        })
    }
}
