use crate::errors::InstallError;
use crate::script::forward_lines;
use crate::tee::{Console, Stream};
use regex::Regex;
use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::LazyLock;

#[cfg(test)]
use mockall::automock;

static DEPENDENCY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid dependency name pattern"));

const STDERR_TAIL_LINES: usize = 5;

/// Installs a missing dependency by identifier. Installer output goes through the console so it
/// lands in the run log.
#[cfg_attr(test, automock)]
pub trait Installer {
    fn install(&self, dependency: &str, console: &mut Console) -> Result<(), InstallError>;
}

pub fn validate_dependency_name(name: &str) -> Result<(), InstallError> {
    if DEPENDENCY_NAME.is_match(name) {
        Ok(())
    } else {
        Err(InstallError::InvalidName(name.to_string()))
    }
}

/// Installs Python packages into the user site with `<interpreter> -m pip install --user`.
pub struct PipInstaller {
    interpreter: String,
    /// Import name → distribution name, for modules whose package is published under another
    /// name (`sklearn` → `scikit-learn`). Keys are lowercase.
    package_aliases: HashMap<String, String>,
}

impl PipInstaller {
    pub fn new(interpreter: impl Into<String>, package_aliases: HashMap<String, String>) -> Self {
        let package_aliases = package_aliases
            .into_iter()
            .map(|(module, package)| (module.to_lowercase(), package))
            .collect();
        Self {
            interpreter: interpreter.into(),
            package_aliases,
        }
    }

    pub fn package_for<'a>(&'a self, dependency: &'a str) -> &'a str {
        self.package_aliases
            .get(&dependency.to_lowercase())
            .map(String::as_str)
            .unwrap_or(dependency)
    }
}

impl Installer for PipInstaller {
    fn install(&self, dependency: &str, console: &mut Console) -> Result<(), InstallError> {
        validate_dependency_name(dependency)?;
        let package = self.package_for(dependency);
        validate_dependency_name(package)?;

        tracing::info!("installing {} (package {}) with pip", dependency, package);

        let mut child = Command::new(&self.interpreter)
            .args(["-m", "pip", "install", "--user", package])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let mut stderr_lines = Vec::new();
        for (stream, line) in rx {
            if stream == Stream::Stderr && !line.trim().is_empty() {
                stderr_lines.push(line.clone());
            }
            console.line(stream, &line);
        }

        let status = child.wait()?;
        if status.success() {
            return Ok(());
        }

        let tail = stderr_lines[stderr_lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(InstallError::ExitStatus {
            status,
            stderr: tail,
        })
    }
}
