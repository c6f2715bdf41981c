//! Build plan model: ordered, immutable lists of external build steps.

use crate::core::error::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

pub mod tsv;

/// One external command invocation with its working directory and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Step name. Filled in with the 1-based plan position when a plan is built.
    pub name: Option<String>,

    /// Working directory, resolved against the project root at run time.
    pub working_dir: PathBuf,

    /// Executable name or path.
    pub command: String,

    /// Arguments passed to the command.
    pub args: Vec<String>,

    /// Disabled steps are skipped.
    pub enabled: bool,

    /// Maximum time the step may run.
    pub timeout: Option<Duration>,

    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
}

impl BuildStep {
    /// Create an enabled step with no arguments.
    pub fn new(working_dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            name: None,
            working_dir: working_dir.into(),
            command: command.into(),
            args: Vec::new(),
            enabled: true,
            timeout: None,
            env: BTreeMap::new(),
        }
    }

    /// Set the step name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set whether the step runs.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Mark the step as disabled.
    pub fn disabled(self) -> Self {
        self.enabled(false)
    }

    /// Set a timeout for this step.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Name used in logs and errors.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }

    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Ordered list of steps for one run. Insertion order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildPlan {
    steps: Vec<BuildStep>,
}

impl BuildPlan {
    /// Build a plan, assigning positional names to unnamed steps.
    ///
    /// Fails if a step has an empty command or two steps share a name.
    pub fn new(steps: Vec<BuildStep>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut named = Vec::with_capacity(steps.len());

        for (index, mut step) in steps.into_iter().enumerate() {
            let position = index + 1;
            if step.command.trim().is_empty() {
                return Err(Error::invalid_step(position, "command is empty"));
            }

            let name = step
                .name
                .take()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| position.to_string());
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateStep(name));
            }
            step.name = Some(name);
            named.push(step);
        }

        Ok(Self { steps: named })
    }

    /// A plan with no steps.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All steps in execution order, including disabled ones.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Number of steps, including disabled ones.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps at all.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Enabled steps in order.
    pub fn enabled_steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(|s| s.enabled)
    }

    /// Find a step by name.
    pub fn find(&self, name: &str) -> Option<&BuildStep> {
        self.steps.iter().find(|s| s.name.as_deref() == Some(name))
    }

    /// Narrow the plan to a single named step.
    ///
    /// The enabled flag is respected: selecting a disabled step is an error.
    pub fn only(self, name: &str) -> Result<Self> {
        let step = self
            .steps
            .into_iter()
            .find(|s| s.name.as_deref() == Some(name))
            .ok_or_else(|| Error::StepNotFound(name.to_string()))?;

        if !step.enabled {
            return Err(Error::StepDisabled(name.to_string()));
        }

        Ok(Self { steps: vec![step] })
    }
}

impl IntoIterator for BuildPlan {
    type Item = BuildStep;
    type IntoIter = std::vec::IntoIter<BuildStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
