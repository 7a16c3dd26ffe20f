pub mod config;
pub mod errors;
pub mod executor;
pub mod installer;
pub mod logging;
pub mod operator;
pub mod pipeline;
pub mod preflight;
pub mod project;
pub mod report;
pub mod retention;
pub mod sampler;
pub mod script;
pub mod session;
pub mod step;
pub mod system_info;
pub mod tee;

pub use errors::{InstallError, SampleError, StepError};
pub use executor::{RecoveryPolicy, StepExecutor};
pub use pipeline::PipelineRunner;
pub use report::{RunSummary, StepOutcome, StepReport};
pub use step::{PipelineStep, StepWork};
pub use tee::{Console, OutputTee};
