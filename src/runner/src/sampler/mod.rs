//! Background CPU, RAM and GPU sampling scoped to one step's execution window.
//!
//! A dedicated thread takes one sample per interval while a window is open. Each tick yields a
//! [`TickOutcome`]; failed ticks are kept in the buffer as errors and only counted when the
//! window is reduced, so nothing inside the sampling loop can fail the caller.

use crate::errors::SampleError;
use chrono::{DateTime, Local};
use std::mem;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

mod averages;
pub mod gpu;
mod system;

pub use averages::{GpuAverages, ResourceAverages};
pub use gpu::{GpuProbe, GpuProbeSet, GpuReading, ProbeMode};
pub use system::{MemoryReading, SysinfoReader, SystemReader};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ResourceSample {
    pub taken_at: DateTime<Local>,
    pub cpu_percent: f32,
    pub ram: MemoryReading,
    pub gpu: Option<Vec<GpuReading>>,
}

pub type TickOutcome = Result<ResourceSample, SampleError>;

#[derive(Debug, Clone, Copy)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub stop_timeout: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

type SampleBuffer = Arc<Mutex<Vec<TickOutcome>>>;

/// An open sampling window.
struct Window {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
    buffer: SampleBuffer,
}

pub struct ResourceSampler {
    settings: SamplerSettings,
    reader: Arc<Mutex<Box<dyn SystemReader>>>,
    probes: Arc<GpuProbeSet>,
    window: Option<Window>,
    collected: Vec<TickOutcome>,
}

impl ResourceSampler {
    pub fn new(settings: SamplerSettings, reader: Box<dyn SystemReader>, probes: GpuProbeSet) -> Self {
        Self {
            settings,
            reader: Arc::new(Mutex::new(reader)),
            probes: Arc::new(probes),
            window: None,
            collected: Vec::new(),
        }
    }

    /// Sampler reading the host through sysinfo.
    pub fn with_system(settings: SamplerSettings, probes: GpuProbeSet) -> Self {
        Self::new(settings, Box::new(SysinfoReader::new()), probes)
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// Open a new window, discarding samples from the previous one. A window that is still open
    /// is closed first so that no two windows ever overlap.
    pub fn start(&mut self) {
        if self.window.is_some() {
            tracing::warn!("sampler started while a window was open; closing the previous window");
            self.stop();
        }
        self.collected.clear();

        let buffer: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let reader = Arc::clone(&self.reader);
        let probes = Arc::clone(&self.probes);
        let thread_buffer = Arc::clone(&buffer);
        let interval = self.settings.interval;

        let spawned = thread::Builder::new()
            .name("resource-sampler".to_string())
            .spawn(move || loop {
                let outcome = sample_once(&reader, &probes);
                if let Err(e) = &outcome {
                    tracing::warn!("error in resource sampling: {e}");
                }
                if let Ok(mut samples) = thread_buffer.lock() {
                    samples.push(outcome);
                }

                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => {
                self.window = Some(Window {
                    stop_tx,
                    handle,
                    buffer,
                });
            }
            Err(e) => tracing::error!("failed to spawn resource sampler thread: {e}"),
        }
    }

    /// Close the window, waiting up to the configured stop timeout for the sampling thread.
    ///
    /// The samples gathered so far are moved out of the shared buffer before returning, so a
    /// thread that outlives the wait cannot add to them.
    pub fn stop(&mut self) {
        let Some(window) = self.window.take() else {
            return;
        };

        let _ = window.stop_tx.send(());

        let deadline = Instant::now() + self.settings.stop_timeout;
        while !window.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if window.handle.is_finished() {
            if window.handle.join().is_err() {
                tracing::error!("resource sampler thread panicked");
            }
        } else {
            tracing::warn!(
                "resource sampler did not stop within {:?}; detaching it",
                self.settings.stop_timeout
            );
        }

        self.collected = match window.buffer.lock() {
            Ok(mut samples) => mem::take(&mut *samples),
            Err(poisoned) => mem::take(&mut *poisoned.into_inner()),
        };
    }

    /// Outcomes of the last closed window.
    pub fn outcomes(&self) -> &[TickOutcome] {
        &self.collected
    }

    /// Averages over the last closed window.
    pub fn averages(&self) -> ResourceAverages {
        ResourceAverages::from_outcomes(&self.collected)
    }
}

impl Drop for ResourceSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_once(reader: &Mutex<Box<dyn SystemReader>>, probes: &GpuProbeSet) -> TickOutcome {
    let (cpu_percent, ram) = {
        let mut reader = reader
            .lock()
            .map_err(|_| SampleError::Reader("system reader lock poisoned".to_string()))?;
        (reader.cpu_percent()?, reader.memory()?)
    };

    Ok(ResourceSample {
        taken_at: Local::now(),
        cpu_percent,
        ram,
        gpu: probes.collect(),
    })
}
