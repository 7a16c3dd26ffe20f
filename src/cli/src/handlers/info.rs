use crate::box_formatter::{BoxFormatter, Status};
use crate::error_message;
use anyhow::Result;
use pipeline_runner::config::Config;
use pipeline_runner::preflight::{interpreter_version, ToolCheck};
use pipeline_runner::project::ProjectLayout;
use pipeline_runner::retention::list_run_logs;
use serde_json::json;

pub fn info(config: &Config, json: bool) -> Result<()> {
    let layout = ProjectLayout::discover(
        &config.project_root,
        &config.log_dir,
        config.datasets.clone(),
    );
    let version = interpreter_version(&config.interpreter);
    let missing_tools = ToolCheck::new(config.preflight.required_tools.clone()).missing_tools();
    let run_logs = list_run_logs(&config.log_dir_path()).unwrap_or_default();

    if json {
        let project = match &layout {
            Ok(layout) => json!({
                "root": layout.root(),
                "valid": true,
                "datasets": layout.list_datasets(),
            }),
            Err(e) => json!({
                "root": &config.project_root,
                "valid": false,
                "error": e.to_string(),
            }),
        };
        let steps: Vec<_> = config
            .steps
            .iter()
            .map(|s| json!({ "name": s.display_name(), "script": &s.script }))
            .collect();
        let output = json!({
            "project": project,
            "interpreter": {
                "command": &config.interpreter,
                "version": version,
                "recommended": &config.recommended_interpreter_version,
            },
            "steps": steps,
            "sampler": &config.sampler,
            "required_tools": &config.preflight.required_tools,
            "missing_tools": missing_tools,
            "log_dir": config.log_dir_path(),
            "run_logs": run_logs.len(),
            "config_sources": &config.config_sources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut formatter = BoxFormatter::new(90);
    formatter.add_header("Analytics Pipeline");

    formatter.add_section_header("Project");
    match &layout {
        Ok(layout) => {
            formatter.add_status_field("Project Root", &layout.root().display().to_string(), Status::Ok);
            for dataset in layout.list_datasets() {
                let status = if dataset.exists {
                    Status::Ok
                } else {
                    Status::Missing
                };
                formatter.add_status_field(&dataset.key, &dataset.filename, status);
            }
        }
        Err(e) => {
            formatter.add_status_field(
                "Project Root",
                &config.project_root.display().to_string(),
                Status::Missing,
            );
            error_message!("{:#}", e);
        }
    }

    formatter.add_section_header("Environment");
    let version_status = match (&version, &config.recommended_interpreter_version) {
        (None, _) => Status::Missing,
        (Some(current), Some(recommended)) if current != recommended => Status::Warning,
        _ => Status::Ok,
    };
    formatter.add_status_field(
        "Interpreter",
        &format!(
            "{} {}",
            config.interpreter,
            version.as_deref().unwrap_or("(not found)")
        ),
        version_status,
    );
    for tool in &config.preflight.required_tools {
        let status = if missing_tools.contains(tool) {
            Status::Missing
        } else {
            Status::Ok
        };
        formatter.add_status_field(tool, if status == Status::Ok { "found" } else { "missing" }, status);
    }

    formatter.add_section_header("Steps");
    for (index, step) in config.steps.iter().enumerate() {
        formatter.add_field(
            &format!("{}. {}", index + 1, step.display_name()),
            &step.script.display().to_string(),
        );
    }

    formatter.add_section_header("Monitoring");
    formatter.add_field("Sample Interval", &format!("{} ms", config.sampler.interval_ms));
    formatter.add_field("GPU Probes", &config.sampler.gpu_probes.join(", "));
    formatter.add_field("Probe Mode", &format!("{:?}", config.sampler.probe_mode));
    formatter.add_field(
        "Step Timeout",
        &config
            .step_timeout_secs
            .map(|s| format!("{s} s"))
            .unwrap_or_else(|| "none".to_string()),
    );

    formatter.add_section_header("Logs");
    formatter.add_field("Log Directory", &config.log_dir_path().display().to_string());
    formatter.add_field(
        "Run Logs",
        &format!("{} of {} kept", run_logs.len(), config.max_log_files),
    );

    formatter.add_footer();
    println!("{}", formatter.get_output());
    Ok(())
}
