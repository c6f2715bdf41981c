use crate::config::Config;
use crate::plan::BuildStep;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read-only state shared by every step of a run.
#[derive(Debug, Clone)]
pub struct Context {
    /// Project root; step directories are resolved against it.
    pub project_root: PathBuf,

    /// Timeout for steps that do not set their own.
    pub default_timeout: Option<Duration>,

    /// Validate and report steps without spawning anything.
    pub dry_run: bool,
}

impl Context {
    /// Create a context rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            default_timeout: None,
            dry_run: false,
        }
    }

    /// Create a context from loaded configuration.
    pub fn from_config(config: &Config, project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            default_timeout: config.default_timeout(),
            dry_run: false,
        }
    }

    /// Working directory for a step. Always relative to the project root,
    /// never to a previous step's directory.
    pub fn working_dir(&self, step: &BuildStep) -> PathBuf {
        self.project_root.join(&step.working_dir)
    }

    /// Resolve a step's working directory, returning `None` if it is missing.
    pub fn resolve_working_dir(&self, step: &BuildStep) -> Option<PathBuf> {
        let dir = self.working_dir(step);
        is_existing_dir(&dir).then_some(dir)
    }

    /// Effective timeout for a step.
    pub fn step_timeout(&self, step: &BuildStep) -> Option<Duration> {
        step.timeout.or(self.default_timeout)
    }
}

fn is_existing_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
