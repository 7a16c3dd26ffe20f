use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub mod amd;
pub mod intel;
pub mod nvidia;
pub mod wmi;

use amd::AmdProbe;
use intel::IntelProbe;
use nvidia::NvidiaProbe;
use wmi::WmiProbe;

/// Default probe order: the first vendor tool that answers wins.
pub const DEFAULT_PROBE_ORDER: &[&str] = &["nvidia", "amd", "intel"];

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Utilization of one GPU at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuReading {
    pub vendor: String,
    pub utilization: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
}

impl GpuReading {
    pub fn new(
        vendor: impl Into<String>,
        utilization: f64,
        memory_percent: f64,
        memory_used_mb: f64,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            utilization,
            memory_percent,
            memory_used_mb,
        }
    }
}

/// One vendor-specific way of reading GPU utilization.
///
/// `None` means "no data from this vendor": the tool is absent, timed out, failed, or printed
/// something that did not parse.
pub trait GpuProbe: Send + Sync {
    fn vendor(&self) -> &'static str;
    fn probe(&self) -> Option<Vec<GpuReading>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMode {
    /// Only the first probe (in priority order) that returns readings contributes.
    #[default]
    FirstMatch,
    /// Every probe that returns readings contributes.
    All,
}

/// Ranked list of probes consulted once per sampling tick.
pub struct GpuProbeSet {
    probes: Vec<Box<dyn GpuProbe>>,
    mode: ProbeMode,
}

impl GpuProbeSet {
    pub fn new(probes: Vec<Box<dyn GpuProbe>>, mode: ProbeMode) -> Self {
        Self { probes, mode }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), ProbeMode::FirstMatch)
    }

    /// Build the built-in probes named in `order`, keeping that order.
    pub fn from_names<S: AsRef<str>>(order: &[S], mode: ProbeMode, timeout: Duration) -> Result<Self> {
        let mut probes: Vec<Box<dyn GpuProbe>> = Vec::with_capacity(order.len());
        for name in order {
            let probe: Box<dyn GpuProbe> = match name.as_ref() {
                "nvidia" => Box::new(NvidiaProbe::new(timeout)),
                "amd" => Box::new(AmdProbe::new(timeout)),
                "intel" => Box::new(IntelProbe::new(timeout)),
                "wmi" => Box::new(WmiProbe::new(timeout)),
                other => bail!(
                    "unknown GPU probe '{}' (expected one of: nvidia, amd, intel, wmi)",
                    other
                ),
            };
            probes.push(probe);
        }
        Ok(Self::new(probes, mode))
    }

    pub fn vendors(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.vendor()).collect()
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    /// Ask every probe regardless of mode, for diagnosing which tools answer on this host.
    pub fn probe_each(&self) -> Vec<(&'static str, Option<Vec<GpuReading>>)> {
        self.probes
            .iter()
            .map(|probe| (probe.vendor(), probe.probe()))
            .collect()
    }

    /// Readings for this instant, or `None` when no probe produced any.
    pub fn collect(&self) -> Option<Vec<GpuReading>> {
        let mut readings = Vec::new();

        for probe in &self.probes {
            match probe.probe() {
                Some(found) if !found.is_empty() => {
                    readings.extend(found);
                    if self.mode == ProbeMode::FirstMatch {
                        break;
                    }
                }
                _ => tracing::trace!("GPU probe {} returned no data", probe.vendor()),
            }
        }

        if readings.is_empty() {
            None
        } else {
            Some(readings)
        }
    }
}

/// What an external probe tool printed before it exited or was killed.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub success: bool,
    pub timed_out: bool,
}

/// Run `program` with a bounded wait. Returns `None` when the tool is not installed or cannot be
/// started; a tool still running at the deadline is killed and reported as timed out.
pub(crate) fn run_tool(program: &str, args: &[&str], timeout: Duration) -> Option<ToolOutput> {
    let path = which::which(program).ok()?;

    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let (success, timed_out) = loop {
        match child.try_wait() {
            Ok(Some(status)) => break (status.success(), false),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                break (false, true);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::debug!("failed waiting on {}: {e}", program);
                let _ = child.kill();
                return None;
            }
        }
    };

    let stdout = reader.join().ok()?;
    Some(ToolOutput {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        success,
        timed_out,
    })
}
