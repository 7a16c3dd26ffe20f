use crate::config::Config;
use crate::errors::StepError;
use crate::project::{validate_script_path, ProjectLayout};
use crate::step::{PipelineStep, StepWork};
use crate::tee::{Console, Stream};
use anyhow::Context;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

static MISSING_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:ModuleNotFoundError|ImportError): No module named '([^']+)'")
        .expect("valid missing module pattern")
});

const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Top-level package of the last "No module named" error in a script's stderr.
pub fn missing_module(stderr: &str) -> Option<String> {
    MISSING_MODULE
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().split('.').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Runs `<interpreter> <script>` from the project root, streaming its output into the console.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    interpreter: String,
    script: PathBuf,
    scripts_dir: PathBuf,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptStep {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            scripts_dir: scripts_dir.into(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn kill_if_expired(&self, child: &mut Child, deadline: Option<Instant>) -> Option<StepError> {
        let (deadline, timeout) = (deadline?, self.timeout?);
        if Instant::now() < deadline {
            return None;
        }
        tracing::warn!("{} exceeded {:?}; killing it", self.script_name(), timeout);
        let _ = child.kill();
        let _ = child.wait();
        Some(StepError::Timeout(timeout))
    }

    fn script_name(&self) -> String {
        self.script
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.script.display().to_string())
    }
}

impl StepWork for ScriptStep {
    fn run(&mut self, console: &mut Console) -> Result<(), StepError> {
        let script = validate_script_path(&self.script, &self.scripts_dir)?;

        tracing::debug!("launching {} {}", self.interpreter, script.display());

        let mut child = Command::new(&self.interpreter)
            .arg(&script)
            .current_dir(&self.working_dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.interpreter))?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut stderr_text = String::new();

        loop {
            match rx.recv_timeout(OUTPUT_POLL_INTERVAL) {
                Ok((stream, line)) => {
                    if stream == Stream::Stderr {
                        stderr_text.push_str(&line);
                        stderr_text.push('\n');
                    }
                    console.line(stream, &line);
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Some(err) = self.kill_if_expired(&mut child, deadline) {
                return Err(err);
            }
        }

        // Output closed; the child may still be running with its pipes redirected.
        let status = loop {
            let exited = child
                .try_wait()
                .with_context(|| format!("failed to wait for {}", self.script_name()))?;
            if let Some(status) = exited {
                break status;
            }
            if let Some(err) = self.kill_if_expired(&mut child, deadline) {
                return Err(err);
            }
            thread::sleep(OUTPUT_POLL_INTERVAL);
        };

        if status.success() {
            return Ok(());
        }

        if let Some(name) = missing_module(&stderr_text) {
            return Err(StepError::missing_dependency(name));
        }

        Err(StepError::failed(format!(
            "{} exited with {}",
            self.script_name(),
            status
        )))
    }
}

/// One script step per configured entry, run from the project root.
pub fn script_steps(config: &Config, layout: &ProjectLayout) -> Vec<PipelineStep> {
    let scripts_dir = layout.scripts_dir();
    config
        .steps
        .iter()
        .map(|step| {
            let work = ScriptStep::new(
                config.interpreter.clone(),
                scripts_dir.join(&step.script),
                scripts_dir.clone(),
                layout.root(),
            )
            .with_timeout(config.step_timeout());
            PipelineStep::new(step.display_name(), work)
        })
        .collect()
}

/// Read `pipe` line by line on its own thread and hand each line to the foreground.
pub(crate) fn forward_lines<R: Read + Send + 'static>(
    pipe: R,
    stream: Stream,
    tx: Sender<(Stream, String)>,
) {
    let spawned = thread::Builder::new()
        .name(format!("{stream:?}-reader").to_lowercase())
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx.send((stream, line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("failed to read child {stream:?}: {e}");
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        tracing::error!("failed to spawn output reader thread: {e}");
    }
}
