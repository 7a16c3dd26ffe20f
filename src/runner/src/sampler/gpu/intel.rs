use super::{run_tool, GpuProbe, GpuReading};
use serde_json::Value;
use std::time::Duration;

/// intel_gpu_top streams samples until killed, so it is only given this long to print one.
const CAPTURE_WINDOW: Duration = Duration::from_millis(1200);

pub struct IntelProbe {
    timeout: Duration,
}

impl IntelProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl GpuProbe for IntelProbe {
    fn vendor(&self) -> &'static str {
        "intel"
    }

    fn probe(&self) -> Option<Vec<GpuReading>> {
        let window = self.timeout.min(CAPTURE_WINDOW);
        let output = run_tool("intel_gpu_top", &["-J", "-s", "500"], window)?;
        parse_intel_gpu_top(&output.stdout)
    }
}

/// Parse the first complete JSON sample from `intel_gpu_top -J` output.
///
/// The render engine is keyed `Render/3D` on older releases and `Render/3D/0` on newer ones.
/// Memory figures are not exposed and are reported as zero.
pub fn parse_intel_gpu_top(stdout: &str) -> Option<Vec<GpuReading>> {
    let start = stdout.find('{')?;
    let sample: Value = serde_json::Deserializer::from_str(&stdout[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;

    let engines = sample.get("engines")?.as_object()?;
    let busy = engines
        .iter()
        .find(|(name, _)| name.starts_with("Render/3D"))
        .and_then(|(_, engine)| engine.get("busy"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Some(vec![GpuReading::new("Intel-0", busy, 0.0, 0.0)])
}
