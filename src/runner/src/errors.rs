use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Why one attempt at a step's work did not complete.
#[derive(Debug, Error)]
pub enum StepError {
    /// A named runtime component is absent. The executor may offer to install it and retry.
    #[error("missing dependency '{name}'")]
    MissingDependency { name: String },

    #[error("step timed out after {0:?}")]
    Timeout(Duration),

    #[error("{message}")]
    Failed { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    pub fn missing_dependency(name: impl Into<String>) -> Self {
        StepError::MissingDependency { name: name.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid dependency name '{0}'")]
    InvalidName(String),

    #[error("failed to launch installer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("installer exited with {status}: {stderr}")]
    ExitStatus { status: ExitStatus, stderr: String },
}

/// Failure of a single sampling tick. Recorded in the sample buffer, never propagated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    #[error("system reported no CPUs")]
    NoCpuData,

    #[error("system reported zero total memory")]
    NoMemoryData,

    #[error("{0}")]
    Reader(String),
}
