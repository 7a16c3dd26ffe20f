use crate::executor::StepExecutor;
use crate::report::{RunSummary, StepReport};
use crate::step::PipelineStep;
use crate::tee::Console;
use chrono::Local;
use std::time::Instant;

/// Drives the executor over an ordered step list.
///
/// Steps run strictly in order and a failed or skipped step never stops the ones after it.
pub struct PipelineRunner {
    executor: StepExecutor,
}

impl PipelineRunner {
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Returns one report per step, in step order, and writes the closing summary.
    pub fn run(&mut self, steps: &mut [PipelineStep], console: &mut Console) -> RunSummary {
        self.run_with_observer(steps, console, |_| {})
    }

    /// Like [`PipelineRunner::run`], calling `on_report` after each step's block is written.
    pub fn run_with_observer<F>(
        &mut self,
        steps: &mut [PipelineStep],
        console: &mut Console,
        mut on_report: F,
    ) -> RunSummary
    where
        F: FnMut(&StepReport),
    {
        let started_at = Local::now();
        let clock = Instant::now();
        tracing::info!("running pipeline with {} steps", steps.len());

        let mut reports = Vec::with_capacity(steps.len());
        for step in steps.iter_mut() {
            let report = self.executor.run(step, console);
            report.write_to(console);
            on_report(&report);
            reports.push(report);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Local::now(),
            duration: clock.elapsed(),
            reports,
            log_path: None,
        };
        summary.write_to(console);

        tracing::info!(
            "pipeline finished: {} completed, {} skipped, {} failed",
            summary.completed(),
            summary.skipped(),
            summary.failed()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepError;
    use crate::executor::RecoveryPolicy;
    use crate::installer::MockInstaller;
    use crate::operator::FixedAnswer;
    use crate::report::StepOutcome;
    use crate::sampler::testing::fixed_sampler;
    use crate::tee::testing::capture_console;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn runner() -> PipelineRunner {
        let mut installer = MockInstaller::new();
        installer.expect_install().never();
        PipelineRunner::new(StepExecutor::new(
            Box::new(FixedAnswer(false)),
            Box::new(installer),
            fixed_sampler(10.0),
            RecoveryPolicy::default(),
        ))
    }

    #[test]
    fn test_failure_in_the_middle_does_not_stop_the_pipeline() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let record = |name: &'static str, fail: bool| {
            let order = Rc::clone(&order);
            PipelineStep::from_fn(name, move |_| {
                order.borrow_mut().push(name);
                if fail {
                    Err(StepError::failed("boom"))
                } else {
                    Ok(())
                }
            })
        };
        let mut steps = vec![record("A", false), record("B", true), record("C", false)];
        let (mut console, out, ..) = capture_console();

        let summary = runner().run(&mut steps, &mut console);

        let outcomes: Vec<_> = summary.reports.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                StepOutcome::Completed,
                StepOutcome::Failed {
                    reason: "boom".into()
                },
                StepOutcome::Completed,
            ]
        );
        assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
        assert!(out.contents().ends_with(&format!(
            "Log ended: {}\n",
            summary.finished_at.format("%Y-%m-%d %H:%M:%S%.6f")
        )));
    }

    #[test]
    fn test_every_step_failing_still_yields_one_report_each() {
        let mut steps: Vec<_> = (0..5)
            .map(|i| {
                PipelineStep::from_fn(format!("step{i}"), |_| {
                    Err(StepError::missing_dependency("absent"))
                })
            })
            .collect();
        let (mut console, ..) = capture_console();

        let summary = runner().run(&mut steps, &mut console);

        assert_eq!(summary.reports.len(), 5);
        assert_eq!(summary.skipped(), 5);
        let names: Vec<_> = summary.reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["step0", "step1", "step2", "step3", "step4"]);
    }

    #[test]
    fn test_empty_pipeline() {
        let (mut console, out, ..) = capture_console();

        let summary = runner().run(&mut [], &mut console);

        assert!(summary.reports.is_empty());
        assert!(out.contents().starts_with("=== PIPELINE COMPLETED ==="));
    }

    #[test]
    fn test_observer_sees_each_report_after_it_is_written() {
        let mut steps = vec![
            PipelineStep::from_fn("clean.py", |_| Ok(())),
            PipelineStep::from_fn("age.py", |_| Err(StepError::failed("bad column"))),
        ];
        let (mut console, out, ..) = capture_console();
        let mut seen = Vec::new();

        let summary = runner().run_with_observer(&mut steps, &mut console, |report| {
            seen.push((report.name.clone(), report.outcome.is_completed()));
            assert!(out.contents().contains(&format!("--- {} COMPLETED ---", report.name)));
        });

        assert_eq!(
            seen,
            vec![("clean.py".to_string(), true), ("age.py".to_string(), false)]
        );
        assert_eq!(summary.reports.len(), 2);
    }
}
