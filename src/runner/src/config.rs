use crate::executor::{RecoveryPolicy, DEFAULT_MAX_INSTALL_ATTEMPTS, DEFAULT_RESERVED_MODULES};
use crate::sampler::gpu::DEFAULT_PROBE_ORDER;
use crate::sampler::{GpuProbeSet, ProbeMode, SamplerSettings};
use anyhow::{Context, Result};
use config::{Config as RConfig, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PIPELINE";
pub const DEFAULT_INTERPRETER: &str = "python3";
pub const RECOMMENDED_INTERPRETER_VERSION: &str = "3.13.4";
pub const DEFAULT_LOG_DIR: &str = "log";
pub const DEFAULT_MAX_LOG_FILES: i64 = 10;
pub const SAMPLE_INTERVAL_MS: i64 = 1000;
pub const SAMPLER_STOP_TIMEOUT_MS: i64 = 2000;
pub const PROBE_TIMEOUT_SECS: i64 = 5;
pub const DIAGNOSTICS_FILTER: &str = "info";

const DEFAULT_STEPS: &[&str] = &[
    "clean.py",
    "averageengagement.py",
    "mediareach.py",
    "feedvsreel.py",
    "age.py",
    "reportgeneration.py",
    "dashboardgeneration.py",
];

const DEFAULT_DATASETS: &[(&str, &str)] = &[
    (
        "instagram_analytics_excel",
        "Copy of Instagram_Analytics - DO NOT DELETE (for interview purposes).xlsx",
    ),
    ("instagram_age_gender", "Instagram Age Gender Demographi.csv"),
    ("instagram_post_engagement", "Instagram Post Engagement.csv"),
    ("instagram_profile_overview", "Instagram Profile Overview.csv"),
    ("instagram_top_cities", "Instagram Top Cities Regions.csv"),
];

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StepConfig {
    /// Shown in progress lines and reports. Defaults to the script file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Path relative to the project's `scripts/` directory.
    pub script: PathBuf,
}

impl StepConfig {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.script
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.script.display().to_string())
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RecoveryConfig {
    pub reserved_modules: Vec<String>,
    pub max_install_attempts: u32,
    /// Import name → package name for `pip install`.
    #[serde(default)]
    pub package_aliases: HashMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SamplerConfig {
    pub interval_ms: u64,
    pub stop_timeout_ms: u64,
    pub gpu_probes: Vec<String>,
    pub probe_mode: ProbeMode,
    pub probe_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PreflightConfig {
    pub required_tools: Vec<String>,
    pub stale_processes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub project_root: PathBuf,
    pub interpreter: String,
    pub recommended_interpreter_version: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    pub log_dir: PathBuf,
    pub max_log_files: usize,
    pub step_timeout_secs: Option<u64>,
    pub recovery: RecoveryConfig,
    pub sampler: SamplerConfig,
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub datasets: BTreeMap<String, String>,
    pub diagnostics_filter: String,
    #[serde(default)]
    pub config_sources: Vec<String>,
}

impl Config {
    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_millis(self.sampler.interval_ms),
            stop_timeout: Duration::from_millis(self.sampler.stop_timeout_ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.sampler.probe_timeout_secs)
    }

    pub fn probe_set(&self) -> Result<GpuProbeSet> {
        GpuProbeSet::from_names(&self.sampler.gpu_probes, self.sampler.probe_mode, self.probe_timeout())
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            reserved: self.recovery.reserved_modules.clone(),
            max_install_attempts: self.recovery.max_install_attempts,
        }
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Log directory, resolved against the project root when relative.
    pub fn log_dir_path(&self) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            self.project_root.join(&self.log_dir)
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the optional TOML file, then `PIPELINE_*` environment variables
    /// (`__` separates nested keys, e.g. `PIPELINE_SAMPLER__PROBE_MODE=all`).
    pub fn load(config_file: Option<&Path>) -> Result<Config> {
        let mut builder = RConfig::builder();

        builder = builder
            .set_default("project_root", ".")?
            .set_default("interpreter", DEFAULT_INTERPRETER)?
            .set_default("recommended_interpreter_version", RECOMMENDED_INTERPRETER_VERSION)?
            .set_default("log_dir", DEFAULT_LOG_DIR)?
            .set_default("max_log_files", DEFAULT_MAX_LOG_FILES)?
            .set_default("diagnostics_filter", DIAGNOSTICS_FILTER)?
            .set_default("recovery.reserved_modules", DEFAULT_RESERVED_MODULES.to_vec())?
            .set_default("recovery.max_install_attempts", DEFAULT_MAX_INSTALL_ATTEMPTS as i64)?
            .set_default("sampler.interval_ms", SAMPLE_INTERVAL_MS)?
            .set_default("sampler.stop_timeout_ms", SAMPLER_STOP_TIMEOUT_MS)?
            .set_default("sampler.gpu_probes", DEFAULT_PROBE_ORDER.to_vec())?
            .set_default("sampler.probe_mode", "first-match")?
            .set_default("sampler.probe_timeout_secs", PROBE_TIMEOUT_SECS)?
            .set_default("preflight.required_tools", vec!["quarto", "R"])?
            .set_default("preflight.stale_processes", vec!["quarto"])?;

        let mut sources = Vec::new();
        if let Some(path) = config_file {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            sources.push(path.display().to_string());
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder.set_override("config_sources", sources)?;

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .context("failed to parse config file")?;

        if config.steps.is_empty() {
            config.steps = DEFAULT_STEPS
                .iter()
                .map(|script| StepConfig {
                    name: None,
                    script: PathBuf::from(script),
                })
                .collect();
        }

        if config.datasets.is_empty() {
            config.datasets = DEFAULT_DATASETS
                .iter()
                .map(|(key, file)| (key.to_string(), file.to_string()))
                .collect();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::load(None).unwrap();

        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.recommended_interpreter_version.as_deref(), Some("3.13.4"));
        assert_eq!(config.max_log_files, 10);
        assert_eq!(config.steps.len(), 7);
        assert_eq!(config.steps[0].display_name(), "clean.py");
        assert_eq!(config.datasets.len(), 5);
        assert_eq!(config.sampler.probe_mode, ProbeMode::FirstMatch);
        assert_eq!(config.sampler.gpu_probes, vec!["nvidia", "amd", "intel"]);
        assert_eq!(config.recovery.reserved_modules, vec!["path_utils"]);
        assert_eq!(config.recovery.max_install_attempts, 1);
        assert!(config.step_timeout().is_none());
        assert!(config.config_sources.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
interpreter = "sh"
step_timeout_secs = 30
max_log_files = 3

[[steps]]
name = "Cleaning"
script = "clean.sh"

[sampler]
probe_mode = "all"
gpu_probes = ["amd"]

[recovery.package_aliases]
sklearn = "scikit-learn"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&path)).unwrap();

        assert_eq!(config.interpreter, "sh");
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_log_files, 3);
        assert_eq!(
            config.steps,
            vec![StepConfig {
                name: Some("Cleaning".into()),
                script: "clean.sh".into()
            }]
        );
        assert_eq!(config.sampler.probe_mode, ProbeMode::All);
        assert_eq!(config.sampler.gpu_probes, vec!["amd"]);
        assert_eq!(config.sampler.interval_ms, 1000);
        assert_eq!(
            config.recovery.package_aliases.get("sklearn").map(String::as_str),
            Some("scikit-learn")
        );
        assert_eq!(config.config_sources, vec![path.display().to_string()]);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = ConfigLoader::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_unknown_probe_name_fails_probe_set() {
        let mut config = ConfigLoader::load(None).unwrap();
        config.sampler.gpu_probes = vec!["voodoo".into()];

        assert!(config.probe_set().is_err());
    }

    #[test]
    fn test_relative_log_dir_resolves_against_project_root() {
        let mut config = ConfigLoader::load(None).unwrap();
        config.project_root = PathBuf::from("/srv/analytics");

        assert_eq!(config.log_dir_path(), PathBuf::from("/srv/analytics/log"));
    }
}
