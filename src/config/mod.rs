//! Configuration types and loading of plan files, Cargo.toml metadata and env overrides.

use crate::core::error::{Error, Result};
use crate::plan::{BuildPlan, BuildStep};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod env;
mod loader;
pub use loader::ConfigLoader;

/// Complete configuration: run settings plus the step list.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Run-wide settings.
    #[serde(default)]
    pub settings: Settings,

    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Project root, relative to the file that declared it.
    pub root: Option<PathBuf>,

    /// Default per-step timeout in seconds.
    pub timeout: Option<u64>,

    /// Enable verbose output (log each step).
    #[serde(default)]
    pub verbose: bool,
}

/// One step as written in a plan file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepConfig {
    /// Step name, used by `--only`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Working directory relative to the project root.
    #[serde(default = "default_dir", alias = "working-dir")]
    pub dir: PathBuf,

    /// Executable name or path.
    pub command: String,

    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Whether the step runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout in seconds, overriding `settings.timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Extra environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Parse a TOML plan.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a plan file. `.toml` files are parsed as TOML, anything else as
    /// the tab-separated line format.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;

        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            Self::from_toml_str(&content)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
        } else {
            let steps = crate::plan::tsv::parse(&content)?;
            Ok(Self {
                settings: Settings::default(),
                steps: steps.iter().map(StepConfig::from).collect(),
            })
        }
    }

    /// Default timeout as a duration.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.settings.timeout.map(Duration::from_secs)
    }

    /// Build the immutable plan from the configured steps.
    pub fn to_plan(&self) -> Result<BuildPlan> {
        BuildPlan::new(self.steps.iter().map(BuildStep::from).collect())
    }
}

impl From<&StepConfig> for BuildStep {
    fn from(cfg: &StepConfig) -> Self {
        BuildStep {
            name: cfg.name.clone(),
            working_dir: cfg.dir.clone(),
            command: cfg.command.clone(),
            args: cfg.args.clone(),
            enabled: cfg.enabled,
            timeout: cfg.timeout.map(Duration::from_secs),
            env: cfg.env.clone(),
        }
    }
}

impl From<&BuildStep> for StepConfig {
    fn from(step: &BuildStep) -> Self {
        StepConfig {
            name: step.name.clone(),
            dir: step.working_dir.clone(),
            command: step.command.clone(),
            args: step.args.clone(),
            enabled: step.enabled,
            timeout: step.timeout.map(|t| t.as_secs()),
            env: step.env.clone(),
        }
    }
}
