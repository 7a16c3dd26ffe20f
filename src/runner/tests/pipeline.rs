use pipeline_runner::errors::{InstallError, SampleError, StepError};
use pipeline_runner::operator::FixedAnswer;
use pipeline_runner::installer::Installer;
use pipeline_runner::sampler::{
    GpuProbe, GpuProbeSet, GpuReading, MemoryReading, ProbeMode, ResourceSampler, SamplerSettings,
    SystemReader,
};
use pipeline_runner::session::RunLogSession;
use pipeline_runner::tee::{Console, SharedLog};
use pipeline_runner::{PipelineRunner, PipelineStep, RecoveryPolicy, StepExecutor, StepOutcome};
use std::fs::{self, File};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

struct SteadyReader;

impl SystemReader for SteadyReader {
    fn cpu_percent(&mut self) -> Result<f32, SampleError> {
        Ok(20.0)
    }

    fn memory(&mut self) -> Result<MemoryReading, SampleError> {
        Ok(MemoryReading {
            percent: 40.0,
            used_bytes: 1 << 30,
        })
    }
}

struct StaticGpu {
    vendor: &'static str,
    reading: Option<GpuReading>,
}

impl GpuProbe for StaticGpu {
    fn vendor(&self) -> &'static str {
        self.vendor
    }

    fn probe(&self) -> Option<Vec<GpuReading>> {
        self.reading.clone().map(|r| vec![r])
    }
}

/// Records every install request and answers with a fixed result.
#[derive(Clone, Default)]
struct RecordingInstaller {
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl Installer for RecordingInstaller {
    fn install(&self, dependency: &str, _console: &mut Console) -> Result<(), InstallError> {
        self.calls.lock().unwrap().push(dependency.to_string());
        if self.fail {
            Err(InstallError::InvalidName(dependency.to_string()))
        } else {
            Ok(())
        }
    }
}

fn sampler(probes: GpuProbeSet) -> ResourceSampler {
    ResourceSampler::new(
        SamplerSettings {
            interval: Duration::from_millis(5),
            stop_timeout: Duration::from_secs(2),
        },
        Box::new(SteadyReader),
        probes,
    )
}

fn runner(answer: bool, installer: RecordingInstaller, probes: GpuProbeSet) -> PipelineRunner {
    PipelineRunner::new(StepExecutor::new(
        Box::new(FixedAnswer(answer)),
        Box::new(installer),
        sampler(probes),
        RecoveryPolicy::default(),
    ))
}

fn quiet_console() -> Console {
    Console::new(Box::new(io::sink()), Box::new(io::sink()), SharedLog::new(io::sink()))
}

#[test]
fn completed_failed_completed() {
    let mut steps = vec![
        PipelineStep::from_fn("A", |_| Ok(())),
        PipelineStep::from_fn("B", |_| Err(StepError::failed("chart rendering broke"))),
        PipelineStep::from_fn("C", |_| Ok(())),
    ];
    let mut console = quiet_console();

    let summary = runner(false, RecordingInstaller::default(), GpuProbeSet::empty())
        .run(&mut steps, &mut console);

    let outcomes: Vec<_> = summary.reports.iter().map(|r| r.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Completed,
            StepOutcome::Failed {
                reason: "chart rendering broke".into()
            },
            StepOutcome::Completed,
        ]
    );
    assert!(summary.reports.iter().all(|r| r.attempts == 1));
}

#[test]
fn declined_install_is_skipped_without_installing() {
    let installer = RecordingInstaller::default();
    let mut steps = vec![PipelineStep::from_fn("needs_foo", |_| {
        Err(StepError::missing_dependency("foo"))
    })];
    let mut console = quiet_console();

    let summary = runner(false, installer.clone(), GpuProbeSet::empty()).run(&mut steps, &mut console);

    assert_eq!(
        summary.reports[0].outcome,
        StepOutcome::SkippedByUser {
            dependency: "foo".into()
        }
    );
    assert_eq!(summary.reports[0].attempts, 1);
    assert!(installer.calls.lock().unwrap().is_empty());
}

#[test]
fn install_then_retry_spans_both_attempts() {
    let installer = RecordingInstaller::default();
    let delay = Duration::from_millis(30);
    let mut first = true;
    let mut steps = vec![PipelineStep::from_fn("needs_foo", move |_| {
        thread::sleep(delay);
        if first {
            first = false;
            Err(StepError::missing_dependency("foo"))
        } else {
            Ok(())
        }
    })];
    let mut console = quiet_console();

    let summary = runner(true, installer.clone(), GpuProbeSet::empty()).run(&mut steps, &mut console);

    let report = &summary.reports[0];
    assert_eq!(report.outcome, StepOutcome::Completed);
    assert_eq!(report.attempts, 2);
    assert!(report.duration >= delay * 2);
    assert_eq!(*installer.calls.lock().unwrap(), vec!["foo".to_string()]);
}

#[test]
fn install_failure_fails_the_step_and_the_pipeline_continues() {
    let installer = RecordingInstaller {
        fail: true,
        ..Default::default()
    };
    let mut steps = vec![
        PipelineStep::from_fn("needs_foo", |_| Err(StepError::missing_dependency("foo"))),
        PipelineStep::from_fn("after", |_| Ok(())),
    ];
    let mut console = quiet_console();

    let summary = runner(true, installer, GpuProbeSet::empty()).run(&mut steps, &mut console);

    assert!(matches!(summary.reports[0].outcome, StepOutcome::Failed { .. }));
    assert_eq!(summary.reports[1].outcome, StepOutcome::Completed);
}

#[test]
fn gpu_readings_are_pooled_across_vendors() {
    let probes = GpuProbeSet::new(
        vec![
            Box::new(StaticGpu {
                vendor: "vendorA",
                reading: Some(GpuReading::new("vendorA-0", 10.0, 20.0, 100.0)),
            }),
            Box::new(StaticGpu {
                vendor: "vendorB",
                reading: Some(GpuReading::new("vendorB-0", 30.0, 40.0, 200.0)),
            }),
        ],
        ProbeMode::All,
    );
    let mut steps = vec![PipelineStep::from_fn("render", |_| {
        thread::sleep(Duration::from_millis(20));
        Ok(())
    })];
    let mut console = quiet_console();

    let summary = runner(false, RecordingInstaller::default(), probes).run(&mut steps, &mut console);

    let resources = &summary.reports[0].resources;
    let gpu = resources.gpu.as_ref().unwrap();
    assert_eq!(gpu.utilization, 20.0);
    assert_eq!(gpu.memory_percent, 30.0);
    assert_eq!(gpu.memory_used_mb, 150.0);
    assert_eq!(resources.cpu_percent, 20.0);
    assert_eq!(resources.ram_percent, 40.0);
}

#[test]
fn first_match_ignores_lower_ranked_vendors() {
    let probes = GpuProbeSet::new(
        vec![
            Box::new(StaticGpu {
                vendor: "absent",
                reading: None,
            }),
            Box::new(StaticGpu {
                vendor: "vendorA",
                reading: Some(GpuReading::new("vendorA-0", 10.0, 20.0, 100.0)),
            }),
            Box::new(StaticGpu {
                vendor: "vendorB",
                reading: Some(GpuReading::new("vendorB-0", 30.0, 40.0, 200.0)),
            }),
        ],
        ProbeMode::FirstMatch,
    );
    let mut steps = vec![PipelineStep::from_fn("render", |_| Ok(()))];
    let mut console = quiet_console();

    let summary = runner(false, RecordingInstaller::default(), probes).run(&mut steps, &mut console);

    let gpu = summary.reports[0].resources.gpu.clone().unwrap();
    assert_eq!(gpu.utilization, 10.0);
}

#[test]
fn transcript_lands_in_the_session_log() {
    let temp = tempfile::tempdir().unwrap();
    let log_path = temp.path().join("log_01012025_120000.txt");
    let file = File::create(&log_path).unwrap();
    let console = Console::new(Box::new(io::sink()), Box::new(io::sink()), SharedLog::new(file));
    let mut session = RunLogSession::with_console(log_path.clone(), chrono::Local::now(), console);

    let mut steps = vec![
        PipelineStep::from_fn("clean.py", |console: &mut Console| {
            console.println("rows cleaned: 42");
            Ok(())
        }),
        PipelineStep::from_fn("age.py", |_| Err(StepError::failed("bad column"))),
    ];
    runner(false, RecordingInstaller::default(), GpuProbeSet::empty())
        .run(&mut steps, session.console());
    let closed = session.close().unwrap();

    let transcript = fs::read_to_string(closed).unwrap();
    assert!(transcript.contains("=== RUNNING clean.py ==="));
    assert!(transcript.contains("rows cleaned: 42"));
    assert!(transcript.contains("--- clean.py COMPLETED ---"));
    assert!(transcript.contains("ERROR in age.py: bad column"));
    assert!(transcript.contains("=== PIPELINE COMPLETED ==="));
}
