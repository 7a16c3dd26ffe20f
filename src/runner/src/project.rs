use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PATH_CONFIG_FILE: &str = "path_config.json";
const REQUIRED_DIRECTORIES: &[&str] = &["dataset", "scripts"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatus {
    pub key: String,
    pub filename: String,
    pub exists: bool,
}

/// The shape of `path_config.json`, which the analysis scripts read to find their inputs and
/// output directories.
#[derive(Debug, Serialize)]
pub struct PathConfig {
    pub project_root: PathBuf,
    pub datasets: BTreeMap<String, PathBuf>,
    pub directories: BTreeMap<String, PathBuf>,
}

/// Validated project directory layout.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    directories: BTreeMap<String, PathBuf>,
    datasets: BTreeMap<String, String>,
}

impl ProjectLayout {
    /// Resolve `root` and check that the directories every run needs are present.
    pub fn discover(root: &Path, log_dir: &Path, datasets: BTreeMap<String, String>) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("project root {} does not exist", root.display()))?;

        for item in REQUIRED_DIRECTORIES {
            if !root.join(item).is_dir() {
                bail!("invalid project structure: missing {} directory", item);
            }
        }

        let directories = BTreeMap::from([
            ("dataset".to_string(), root.join("dataset")),
            ("scripts".to_string(), root.join("scripts")),
            ("graphs".to_string(), root.join("graphs")),
            ("log".to_string(), root.join(log_dir)),
        ]);

        Ok(Self {
            root,
            directories,
            datasets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directory(&self, key: &str) -> Option<&Path> {
        self.directories.get(key).map(PathBuf::as_path)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.directories
            .get("log")
            .cloned()
            .unwrap_or_else(|| self.root.join("log"))
    }

    pub fn list_datasets(&self) -> Vec<DatasetStatus> {
        let dataset_dir = self.root.join("dataset");
        self.datasets
            .iter()
            .map(|(key, filename)| DatasetStatus {
                key: key.clone(),
                filename: filename.clone(),
                exists: dataset_dir.join(filename).is_file(),
            })
            .collect()
    }

    /// Absolute path of a known dataset; unknown keys and files outside `dataset/` are refused.
    pub fn dataset_path(&self, key: &str) -> Result<PathBuf> {
        let filename = self.datasets.get(key).ok_or_else(|| {
            anyhow!(
                "dataset key '{}' not allowed. Valid keys: {:?}",
                key,
                self.datasets.keys().collect::<Vec<_>>()
            )
        })?;

        let dataset_dir = self.root.join("dataset");
        let path = dataset_dir.join(filename);
        let path = fs::canonicalize(&path)
            .with_context(|| format!("dataset file not found: {}", path.display()))?;

        if !path.starts_with(&dataset_dir) {
            bail!("dataset '{}' resolves outside the dataset directory", key);
        }
        Ok(path)
    }

    pub fn path_config(&self) -> PathConfig {
        let datasets = self
            .datasets
            .keys()
            .filter_map(|key| self.dataset_path(key).ok().map(|path| (key.clone(), path)))
            .collect();

        PathConfig {
            project_root: self.root.clone(),
            datasets,
            directories: self.directories.clone(),
        }
    }

    /// Write `path_config.json` to the project root for the scripts to consume.
    pub fn export_paths_config(&self) -> Result<PathBuf> {
        let path = self.root.join(PATH_CONFIG_FILE);
        let contents = serde_json::to_string_pretty(&self.path_config())
            .context("failed to serialize path configuration")?;
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Resolve `script` and require it to exist inside `allowed_dir`.
pub fn validate_script_path(script: &Path, allowed_dir: &Path) -> Result<PathBuf> {
    let allowed_dir = fs::canonicalize(allowed_dir)
        .with_context(|| format!("scripts directory not found: {}", allowed_dir.display()))?;
    let script = fs::canonicalize(script)
        .with_context(|| format!("script not found: {}", script.display()))?;

    if !script.starts_with(&allowed_dir) {
        bail!(
            "script {} is outside the allowed directory {}",
            script.display(),
            allowed_dir.display()
        );
    }
    if !script.is_file() {
        bail!("script {} is not a file", script.display());
    }
    Ok(script)
}
