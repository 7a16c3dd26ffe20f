use crate::operator::Operator;
use anyhow::{bail, Result};
use regex::Regex;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use sysinfo::{ProcessesToUpdate, System};

static VERSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+(?:\.\d+)?").expect("valid version pattern"));

/// A check run before the pipeline starts.
pub trait PreflightCheck {
    fn name(&self) -> &'static str;
    fn check(&self) -> bool;
    fn success_message(&self) -> String;
    fn error_message(&self) -> String;

    /// A failed required check aborts the run; anything else only warns.
    fn required(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub required: bool,
    pub message: String,
}

/// External tools the later pipeline steps shell out to.
pub struct ToolCheck {
    tools: Vec<String>,
}

impl ToolCheck {
    pub fn new(tools: Vec<String>) -> Self {
        Self { tools }
    }

    pub fn missing_tools(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|tool| which::which(tool.as_str()).is_err())
            .cloned()
            .collect()
    }
}

impl PreflightCheck for ToolCheck {
    fn name(&self) -> &'static str {
        "Required Tools"
    }

    fn check(&self) -> bool {
        self.missing_tools().is_empty()
    }

    fn success_message(&self) -> String {
        if self.tools.is_empty() {
            format!("{}: none configured", self.name())
        } else {
            format!("{}: {} found", self.name(), self.tools.join(", "))
        }
    }

    fn error_message(&self) -> String {
        format!(
            "{} missing from PATH: {}",
            self.name(),
            self.missing_tools().join(", ")
        )
    }
}

/// Compares the interpreter's version with the one the scripts were written against.
pub struct InterpreterVersionCheck {
    interpreter: String,
    recommended: Option<String>,
}

impl InterpreterVersionCheck {
    pub fn new(interpreter: impl Into<String>, recommended: Option<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            recommended,
        }
    }
}

impl PreflightCheck for InterpreterVersionCheck {
    fn name(&self) -> &'static str {
        "Interpreter Version"
    }

    fn check(&self) -> bool {
        let Some(recommended) = &self.recommended else {
            return interpreter_version(&self.interpreter).is_some();
        };
        interpreter_version(&self.interpreter).as_deref() == Some(recommended.as_str())
    }

    fn success_message(&self) -> String {
        format!(
            "{}: {} {}",
            self.name(),
            self.interpreter,
            interpreter_version(&self.interpreter).unwrap_or_default()
        )
    }

    fn error_message(&self) -> String {
        match (interpreter_version(&self.interpreter), &self.recommended) {
            (None, _) => format!("{}: could not run {} --version", self.name(), self.interpreter),
            (Some(current), Some(recommended)) => format!(
                "{}: {} does not match the recommended version ({})",
                self.name(),
                current,
                recommended
            ),
            (Some(current), None) => format!("{}: {}", self.name(), current),
        }
    }

    fn required(&self) -> bool {
        false
    }
}

pub struct CheckManager {
    checks: Vec<Box<dyn PreflightCheck>>,
}

impl CheckManager {
    pub fn new(checks: Vec<Box<dyn PreflightCheck>>) -> Self {
        Self { checks }
    }

    pub fn register(&mut self, check: Box<dyn PreflightCheck>) {
        self.checks.push(check);
    }

    pub fn run_all(&self) -> Vec<CheckResult> {
        self.checks
            .iter()
            .map(|check| {
                let passed = check.check();
                let message = if passed {
                    check.success_message()
                } else {
                    check.error_message()
                };
                tracing::info!("preflight {}: passed={} {}", check.name(), passed, message);
                CheckResult {
                    name: check.name(),
                    passed,
                    required: check.required(),
                    message,
                }
            })
            .collect()
    }
}

/// Fails when any required check did not pass.
pub fn ensure_required_passed(results: &[CheckResult]) -> Result<()> {
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.required && !r.passed)
        .map(|r| r.message.as_str())
        .collect();

    if !failed.is_empty() {
        bail!("preflight checks failed: {}", failed.join("; "));
    }
    Ok(())
}

/// Version printed by `<interpreter> --version`, read from stdout or stderr.
pub fn interpreter_version(interpreter: &str) -> Option<String> {
    let output = Command::new(interpreter)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_version(&text)
}

pub fn parse_version(text: &str) -> Option<String> {
    VERSION_NUMBER.find(text).map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub name: String,
}

fn matches_process(process_name: &str, wanted: &[String]) -> bool {
    let process_name = process_name.to_lowercase();
    let process_name = process_name.strip_suffix(".exe").unwrap_or(&process_name);
    wanted.iter().any(|w| w.to_lowercase() == process_name)
}

/// Processes whose executable name matches one of `names`.
pub fn find_processes(system: &mut System, names: &[String]) -> Vec<RunningProcess> {
    system.refresh_processes(ProcessesToUpdate::All, true);
    let mut found: Vec<RunningProcess> = system
        .processes()
        .iter()
        .filter(|(_, process)| matches_process(&process.name().to_string_lossy(), names))
        .map(|(pid, process)| RunningProcess {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().to_string(),
        })
        .collect();
    found.sort_by_key(|p| p.pid);
    found
}

/// Offer to terminate leftover processes that would hold report files open. Returns how many
/// processes were killed.
pub fn terminate_stale_processes(names: &[String], operator: &dyn Operator) -> usize {
    if names.is_empty() {
        return 0;
    }

    let mut system = System::new();
    let found = find_processes(&mut system, names);
    if found.is_empty() {
        return 0;
    }

    let listing = found
        .iter()
        .map(|p| format!("{} (pid {})", p.name, p.pid))
        .collect::<Vec<_>>()
        .join(", ");
    let kill = operator.confirm(
        "Running Processes",
        &format!("Found running processes: {listing}.\nDo you want to terminate them?"),
    );
    if !kill {
        tracing::info!("leaving {} running", listing);
        return 0;
    }

    found
        .iter()
        .filter(|p| {
            let killed = system
                .process(sysinfo::Pid::from_u32(p.pid))
                .map(|process| process.kill())
                .unwrap_or(false);
            if !killed {
                tracing::warn!("failed to terminate {} (pid {})", p.name, p.pid);
            }
            killed
        })
        .count()
}
