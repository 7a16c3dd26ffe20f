use crate::errors::StepError;
use crate::installer::Installer;
use crate::operator::Operator;
use crate::report::{StepOutcome, StepReport};
use crate::sampler::ResourceSampler;
use crate::step::PipelineStep;
use crate::tee::Console;
use chrono::Local;
use std::collections::HashMap;
use std::time::Instant;

pub const DEFAULT_RESERVED_MODULES: &[&str] = &["path_utils"];
pub const DEFAULT_MAX_INSTALL_ATTEMPTS: u32 = 1;

/// Which missing dependencies may be installed, and how often.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    /// Project-internal modules. Reported missing, they fail the step without a prompt.
    pub reserved: Vec<String>,
    /// Installs allowed per distinct dependency within one step.
    pub max_install_attempts: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            reserved: DEFAULT_RESERVED_MODULES.iter().map(|s| s.to_string()).collect(),
            max_install_attempts: DEFAULT_MAX_INSTALL_ATTEMPTS,
        }
    }
}

impl RecoveryPolicy {
    pub fn is_reserved(&self, dependency: &str) -> bool {
        self.reserved.iter().any(|r| r == dependency)
    }
}

#[derive(Debug)]
enum StepState {
    Attempting,
    RecoveryPrompt { dependency: String },
    Completed,
    SkippedByUser { dependency: String },
    Failed { reason: String },
}

/// Runs one step to a terminal outcome, recovering from missing dependencies through the
/// operator and the installer.
///
/// The sampler window is opened once before the first attempt and closed once after the
/// terminal state, so the averages cover every retry of the step.
pub struct StepExecutor {
    operator: Box<dyn Operator>,
    installer: Box<dyn Installer>,
    sampler: ResourceSampler,
    policy: RecoveryPolicy,
}

impl StepExecutor {
    pub fn new(
        operator: Box<dyn Operator>,
        installer: Box<dyn Installer>,
        sampler: ResourceSampler,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            operator,
            installer,
            sampler,
            policy,
        }
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn sampler(&self) -> &ResourceSampler {
        &self.sampler
    }

    pub fn run(&mut self, step: &mut PipelineStep, console: &mut Console) -> StepReport {
        console.println(format!("=== RUNNING {} ===", step.name()));
        tracing::info!("starting step {}", step.name());

        let started_at = Local::now();
        let clock = Instant::now();
        self.sampler.start();

        let mut attempts = 0u32;
        let mut installs: HashMap<String, u32> = HashMap::new();
        let mut state = StepState::Attempting;

        let outcome = loop {
            state = match state {
                StepState::Attempting => {
                    attempts += 1;
                    match step.attempt(console) {
                        Ok(()) => StepState::Completed,
                        Err(StepError::MissingDependency { name }) => {
                            tracing::info!("{} is missing dependency {}", step.name(), name);
                            StepState::RecoveryPrompt { dependency: name }
                        }
                        Err(e) => {
                            report_failure(step.name(), &e, console);
                            StepState::Failed {
                                reason: e.to_string(),
                            }
                        }
                    }
                }
                StepState::RecoveryPrompt { dependency } => {
                    self.recover(step.name(), dependency, &mut installs, console)
                }
                StepState::Completed => break StepOutcome::Completed,
                StepState::SkippedByUser { dependency } => {
                    break StepOutcome::SkippedByUser { dependency }
                }
                StepState::Failed { reason } => break StepOutcome::Failed { reason },
            };
        };

        let duration = clock.elapsed();
        let finished_at = Local::now();
        self.sampler.stop();

        tracing::info!(
            "step {} finished after {} attempt(s) in {:?}: {}",
            step.name(),
            attempts,
            duration,
            outcome
        );

        StepReport {
            name: step.name().to_string(),
            started_at,
            finished_at,
            duration,
            attempts,
            resources: self.sampler.averages(),
            outcome,
        }
    }

    fn recover(
        &self,
        step: &str,
        dependency: String,
        installs: &mut HashMap<String, u32>,
        console: &mut Console,
    ) -> StepState {
        if self.policy.is_reserved(&dependency) {
            console.eprintln(format!("ERROR: {step} cannot find {dependency}"));
            console.eprintln(format!(
                "Please ensure {dependency} exists in the scripts directory"
            ));
            return StepState::Failed {
                reason: format!("project module '{dependency}' is missing"),
            };
        }

        let used = installs.entry(dependency.clone()).or_insert(0);
        if *used >= self.policy.max_install_attempts {
            console.eprintln(format!(
                "ERROR in {step}: module '{dependency}' is still missing after installation"
            ));
            return StepState::Failed {
                reason: format!("'{dependency}' still missing after install"),
            };
        }

        let accepted = self.operator.confirm(
            "Missing Dependency",
            &format!("Module '{dependency}' is missing when running {step}.\nWould you like to install it?"),
        );
        if !accepted {
            console.println("Skipping installation and continuing.");
            return StepState::SkippedByUser { dependency };
        }

        console.println(format!("Installing module '{dependency}'..."));
        *used += 1;
        match self.installer.install(&dependency, console) {
            Ok(()) => {
                console.println(format!("Module '{dependency}' installed. Retrying {step}..."));
                StepState::Attempting
            }
            Err(e) => {
                console.eprintln(format!("Error installing '{dependency}': {e}"));
                tracing::error!("failed to install {}: {}", dependency, e);
                StepState::Failed {
                    reason: format!("failed to install '{dependency}': {e}"),
                }
            }
        }
    }
}

/// Diagnostic line for an unrecoverable attempt, followed by the error chain when there is one.
fn report_failure(step: &str, error: &StepError, console: &mut Console) {
    console.eprintln(format!("ERROR in {step}: {error}"));
    tracing::error!("step {} failed: {}", step, error);

    if let StepError::Other(inner) = error {
        if inner.chain().count() > 1 {
            console.eprintln(format!("{inner:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InstallError;
    use crate::installer::MockInstaller;
    use crate::operator::MockOperator;
    use crate::sampler::testing::fixed_sampler;
    use crate::tee::testing::capture_console;
    use anyhow::anyhow;
    use std::thread;
    use std::time::Duration;

    fn executor(operator: MockOperator, installer: MockInstaller) -> StepExecutor {
        StepExecutor::new(
            Box::new(operator),
            Box::new(installer),
            fixed_sampler(30.0),
            RecoveryPolicy::default(),
        )
    }

    /// Work that reports each name in `missing` in turn, then succeeds.
    fn missing_then_ok(missing: &'static [&'static str], delay: Duration) -> PipelineStep {
        let mut calls = 0usize;
        PipelineStep::from_fn("analysis.py", move |_| {
            thread::sleep(delay);
            calls += 1;
            match missing.get(calls - 1) {
                Some(name) => Err(StepError::missing_dependency(*name)),
                None => Ok(()),
            }
        })
    }

    #[test]
    fn test_success_completes_in_one_attempt() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().never();
        let mut installer = MockInstaller::new();
        installer.expect_install().never();
        let mut executor = executor(operator, installer);
        let (mut console, out, ..) = capture_console();

        let mut step = PipelineStep::from_fn("clean.py", |_| Ok(()));
        let report = executor.run(&mut step, &mut console);

        assert_eq!(report.outcome, StepOutcome::Completed);
        assert_eq!(report.attempts, 1);
        assert!(report.resources.samples >= 1);
        assert!(!executor.sampler().is_active());
        assert!(out.contents().starts_with("=== RUNNING clean.py ===\n"));
    }

    #[test]
    fn test_declined_install_skips_after_one_attempt() {
        let mut operator = MockOperator::new();
        operator
            .expect_confirm()
            .withf(|title, message| title == "Missing Dependency" && message.contains("'foo'"))
            .times(1)
            .return_const(false);
        let mut installer = MockInstaller::new();
        installer.expect_install().never();
        let mut executor = executor(operator, installer);
        let (mut console, out, ..) = capture_console();

        let mut step = PipelineStep::from_fn("x.py", |_| {
            Err(StepError::missing_dependency("foo"))
        });
        let report = executor.run(&mut step, &mut console);

        assert_eq!(
            report.outcome,
            StepOutcome::SkippedByUser {
                dependency: "foo".into()
            }
        );
        assert_eq!(report.attempts, 1);
        assert!(out.contents().contains("Skipping installation and continuing."));
    }

    #[test]
    fn test_install_then_retry_completes_in_two_attempts() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().times(1).return_const(true);
        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .withf(|dependency, _| dependency == "foo")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut executor = executor(operator, installer);
        let (mut console, out, ..) = capture_console();

        let delay = Duration::from_millis(25);
        let mut step = missing_then_ok(&["foo"], delay);
        let report = executor.run(&mut step, &mut console);

        assert_eq!(report.outcome, StepOutcome::Completed);
        assert_eq!(report.attempts, 2);
        assert!(report.duration >= delay * 2);
        assert!(out
            .contents()
            .contains("Module 'foo' installed. Retrying analysis.py..."));
    }

    #[test]
    fn test_reserved_module_fails_without_prompt() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().never();
        let mut installer = MockInstaller::new();
        installer.expect_install().never();
        let mut executor = executor(operator, installer);
        let (mut console, _, err, _) = capture_console();

        let mut step = PipelineStep::from_fn("age.py", |_| {
            Err(StepError::missing_dependency("path_utils"))
        });
        let report = executor.run(&mut step, &mut console);

        assert!(matches!(report.outcome, StepOutcome::Failed { .. }));
        assert!(err.contents().contains("ERROR: age.py cannot find path_utils"));
    }

    #[test]
    fn test_same_dependency_after_install_fails_once_budget_is_used() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().times(1).return_const(true);
        let mut installer = MockInstaller::new();
        installer.expect_install().times(1).returning(|_, _| Ok(()));
        let mut executor = executor(operator, installer);
        let (mut console, ..) = capture_console();

        let mut step = PipelineStep::from_fn("x.py", |_| {
            Err(StepError::missing_dependency("stubborn"))
        });
        let report = executor.run(&mut step, &mut console);

        assert_eq!(
            report.outcome,
            StepOutcome::Failed {
                reason: "'stubborn' still missing after install".into()
            }
        );
        assert_eq!(report.attempts, 2);
    }

    #[test]
    fn test_distinct_dependencies_each_get_a_budget() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().times(2).return_const(true);
        let mut installer = MockInstaller::new();
        installer.expect_install().times(2).returning(|_, _| Ok(()));
        let mut executor = executor(operator, installer);
        let (mut console, ..) = capture_console();

        let mut step = missing_then_ok(&["pandas", "seaborn"], Duration::ZERO);
        let report = executor.run(&mut step, &mut console);

        assert_eq!(report.outcome, StepOutcome::Completed);
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn test_install_failure_fails_without_retry() {
        let mut operator = MockOperator::new();
        operator.expect_confirm().times(1).return_const(true);
        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .times(1)
            .returning(|name, _| Err(InstallError::InvalidName(name.to_string())));
        let mut executor = executor(operator, installer);
        let (mut console, _, err, _) = capture_console();

        let mut step = PipelineStep::from_fn("x.py", |_| {
            Err(StepError::missing_dependency("foo"))
        });
        let report = executor.run(&mut step, &mut console);

        assert!(matches!(report.outcome, StepOutcome::Failed { .. }));
        assert_eq!(report.attempts, 1);
        assert!(err.contents().contains("Error installing 'foo'"));
    }

    #[test]
    fn test_other_failure_prints_error_chain() {
        let operator = MockOperator::new();
        let installer = MockInstaller::new();
        let mut executor = executor(operator, installer);
        let (mut console, _, err, log) = capture_console();

        let mut step = PipelineStep::from_fn("chart.py", |_| {
            Err(StepError::Other(
                anyhow!("disk full").context("failed to save chart"),
            ))
        });
        let report = executor.run(&mut step, &mut console);

        assert_eq!(
            report.outcome,
            StepOutcome::Failed {
                reason: "failed to save chart".into()
            }
        );
        let stderr = err.contents();
        assert!(stderr.contains("ERROR in chart.py: failed to save chart"));
        assert!(stderr.contains("Caused by:"));
        assert!(stderr.contains("disk full"));
        assert!(log.contents().contains("disk full"));
    }
}
