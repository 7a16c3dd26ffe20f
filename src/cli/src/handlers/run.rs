use crate::commands::RunArgs;
use crate::progress::RunProgress;
use crate::prompts::operator_for;
use crate::{error_message, info_message, success_message, warning_message};
use anyhow::{Context, Result};
use console::Emoji;
use pipeline_runner::config::Config;
use pipeline_runner::installer::PipInstaller;
use pipeline_runner::logging::setup_logging;
use pipeline_runner::operator::Operator;
use pipeline_runner::preflight::{
    ensure_required_passed, terminate_stale_processes, CheckManager, CheckResult,
    InterpreterVersionCheck, ToolCheck,
};
use pipeline_runner::project::ProjectLayout;
use pipeline_runner::retention::{enforce_log_limit, RetentionOutcome};
use pipeline_runner::sampler::ResourceSampler;
use pipeline_runner::script::script_steps;
use pipeline_runner::session::RunLogSession;
use pipeline_runner::system_info::{write_banner, DebugInfo};
use pipeline_runner::{PipelineRunner, StepExecutor};

const PASS: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
const FAIL: Emoji<'_, '_> = Emoji("❌ ", "[X] ");
const WARN: Emoji<'_, '_> = Emoji("⚠️ ", "[!] ");

pub fn run(config: Config, args: RunArgs) -> Result<()> {
    let operator = operator_for(args.yes, args.no_input);

    let layout = ProjectLayout::discover(
        &config.project_root,
        &config.log_dir,
        config.datasets.clone(),
    )
    .context("Project root is not usable")?;
    let log_dir = layout.log_dir();

    let diagnostics = setup_logging(&log_dir, &config.diagnostics_filter)?;
    tracing::info!(
        "starting run in {} with config sources {:?}",
        layout.root().display(),
        config.config_sources
    );

    let consent = !args.no_debug_info
        && operator.confirm(
            "Debug Information",
            "Would you like to include debugging information (OS, CPU, GPU, RAM, interpreter) in the log?",
        );

    success_message!("Project structure validated");
    let path_config = layout.export_paths_config()?;
    success_message!("Path configuration exported to: {}", path_config.display());
    print_datasets(&layout);

    let progress = RunProgress::new(config.steps.len());

    let results = CheckManager::new(vec![
        Box::new(ToolCheck::new(config.preflight.required_tools.clone())),
        Box::new(InterpreterVersionCheck::new(
            config.interpreter.clone(),
            config.recommended_interpreter_version.clone(),
        )),
    ])
    .run_all();
    progress.suspend(|| print_checks(&results));
    ensure_required_passed(&results)?;

    progress.suspend(|| {
        let killed = terminate_stale_processes(&config.preflight.stale_processes, operator.as_ref());
        if killed > 0 {
            info_message!("Terminated {} stale process(es)", killed);
        }
    });
    progress.advance("Preflight checks");

    progress.suspend(|| apply_log_retention(&config, &layout, operator.as_ref()))?;
    progress.advance("Log retention");

    let probes = config.probe_set()?;
    let debug_info = consent.then(|| DebugInfo::collect(&config.interpreter, config.probe_timeout()));

    let mut session = RunLogSession::open(&log_dir)?;
    let started_at = session.started_at();
    write_banner(session.console(), debug_info.as_ref(), started_at);
    progress.advance("Run log");

    let mut steps = script_steps(&config, &layout);
    let installer = PipInstaller::new(
        config.interpreter.clone(),
        config.recovery.package_aliases.clone(),
    );
    let sampler = ResourceSampler::with_system(config.sampler_settings(), probes);
    let executor = StepExecutor::new(
        operator,
        Box::new(installer),
        sampler,
        config.recovery_policy(),
    );

    let mut summary = PipelineRunner::new(executor).run_with_observer(
        &mut steps,
        session.console(),
        |report| progress.advance(&report.name),
    );
    let log_path = session.close()?;
    progress.advance("Pipeline complete");
    progress.finish();
    summary.log_path = Some(log_path.clone());

    if summary.failed() > 0 {
        error_message!("{} of {} steps failed", summary.failed(), summary.reports.len());
    }
    if summary.skipped() > 0 {
        warning_message!("{} step(s) skipped", summary.skipped());
    }
    success_message!("All steps executed. Full log saved to: {}", log_path.display());
    info_message!("Diagnostics written to {}", diagnostics.display());

    Ok(())
}

fn print_datasets(layout: &ProjectLayout) {
    info_message!("Available datasets:");
    for dataset in layout.list_datasets() {
        let status = if dataset.exists { PASS } else { FAIL };
        println!("  {status} {}: {}", dataset.key, dataset.filename);
    }
    println!();
}

fn print_checks(results: &[CheckResult]) {
    for result in results {
        let status = match (result.passed, result.required) {
            (true, _) => PASS,
            (false, true) => FAIL,
            (false, false) => WARN,
        };
        let label = format!("{:<22}", result.name);
        println!("{status} {label} {}", result.message);
    }
    println!();
}

fn apply_log_retention(config: &Config, layout: &ProjectLayout, operator: &dyn Operator) -> Result<()> {
    match enforce_log_limit(&layout.log_dir(), config.max_log_files, operator)? {
        RetentionOutcome::Deleted(path) => {
            info_message!("Deleted oldest log file: {}", path.display())
        }
        RetentionOutcome::Kept { count } => {
            info_message!("No log files were deleted ({} kept)", count)
        }
        RetentionOutcome::DeleteFailed { path, error } => {
            warning_message!("Error deleting log file {}: {}", path.display(), error)
        }
        RetentionOutcome::UnderLimit { .. } => {}
    }
    Ok(())
}
