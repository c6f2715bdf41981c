use crate::config::{Config, ConfigLoader};
use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::plan::BuildPlan;
use crate::runner::{ProcessExecutor, RunReport, StepExecutor, StepRecord};
use std::path::PathBuf;
use std::time::Duration;

/// Builder for assembling a plan, its context and an executor.
pub struct RunBuilder {
    config: Option<Config>,
    plan: Option<BuildPlan>,
    project_root: Option<PathBuf>,
    executor: Option<Box<dyn StepExecutor>>,
    only: Option<String>,
    dry_run: bool,
    default_timeout: Option<Duration>,
}

impl RunBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            plan: None,
            project_root: None,
            executor: None,
            only: None,
            dry_run: false,
            default_timeout: None,
        }
    }

    /// Set the configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a plan file (`.toml` or tab-separated).
    pub fn from_plan_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let mut loader = ConfigLoader::new().plan_file(path);
        if let Some(root) = &self.project_root {
            loader = loader.project_root(root);
        }
        let (config, project_root) = loader.load()?;
        self.config = Some(config);
        self.project_root = Some(project_root);
        Ok(self)
    }

    /// Discover the plan from the project root or current directory.
    pub fn from_project(mut self) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(root) = &self.project_root {
            loader = loader.project_root(root);
        }
        let (config, project_root) = loader.load()?;
        self.config = Some(config);
        self.project_root = Some(project_root);
        Ok(self)
    }

    /// Use an explicit plan instead of the configured steps.
    pub fn plan(mut self, plan: BuildPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Set the project root.
    pub fn project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Run a single named step.
    pub fn only(mut self, name: impl Into<String>) -> Self {
        self.only = Some(name.into());
        self
    }

    /// Validate and list steps without executing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Override the default per-step timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set a custom step executor.
    pub fn executor<E: StepExecutor + 'static>(mut self, executor: E) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Build the runner and the plan it will consume.
    pub fn build(self) -> Result<PlannedRun> {
        let project_root = self.project_root.ok_or_else(|| {
            Error::config("project root not set (call from_plan_file, from_project or project_root)")
        })?;

        let (plan, mut ctx) = match (self.plan, self.config) {
            (Some(plan), Some(config)) => (plan, Context::from_config(&config, project_root)),
            (Some(plan), None) => (plan, Context::new(project_root)),
            (None, Some(config)) => (config.to_plan()?, Context::from_config(&config, project_root)),
            (None, None) => return Err(Error::config("no build plan provided")),
        };

        ctx.dry_run = self.dry_run;
        if let Some(timeout) = self.default_timeout {
            ctx.default_timeout = Some(timeout);
        }

        let plan = match self.only {
            Some(name) => plan.only(&name)?,
            None => plan,
        };

        let executor = self
            .executor
            .unwrap_or_else(|| Box::new(ProcessExecutor::new()));

        Ok(PlannedRun {
            runner: StepRunner { ctx, executor },
            plan,
        })
    }

    /// Build and immediately run.
    pub fn run(self) -> Result<RunReport> {
        self.build()?.run()
    }
}

impl Default for RunBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A runner paired with the plan it will execute.
pub struct PlannedRun {
    runner: StepRunner,
    plan: BuildPlan,
}

impl PlannedRun {
    /// The plan that will run.
    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// The runner's context.
    pub fn context(&self) -> &Context {
        self.runner.context()
    }

    /// Execute the plan.
    pub fn run(self) -> Result<RunReport> {
        self.runner.run(self.plan)
    }
}

/// Executes a plan's enabled steps in order, stopping at the first failure.
pub struct StepRunner {
    ctx: Context,
    executor: Box<dyn StepExecutor>,
}

impl StepRunner {
    /// Create a runner that spawns real processes.
    pub fn new(ctx: Context) -> Self {
        Self::with_executor(ctx, ProcessExecutor::new())
    }

    /// Create a runner with a custom executor.
    pub fn with_executor<E: StepExecutor + 'static>(ctx: Context, executor: E) -> Self {
        Self {
            ctx,
            executor: Box::new(executor),
        }
    }

    /// The runner's context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run every enabled step of `plan` in order.
    ///
    /// Disabled steps are skipped. The first missing directory, launch
    /// failure, timeout or non-zero exit aborts the run; later steps are
    /// never started.
    pub fn run(&self, plan: BuildPlan) -> Result<RunReport> {
        let mut report = RunReport {
            dry_run: self.ctx.dry_run,
            ..RunReport::default()
        };
        let mut ordinal = 0;

        for step in plan {
            let name = step.label().to_string();
            if !step.enabled {
                tracing::debug!(name = %name, "skipping disabled step");
                report.skipped.push(name);
                continue;
            }
            ordinal += 1;

            let working_dir =
                self.ctx
                    .resolve_working_dir(&step)
                    .ok_or_else(|| Error::DirectoryNotFound {
                        step: ordinal,
                        name: name.clone(),
                        path: self.ctx.working_dir(&step),
                    })?;

            if self.ctx.dry_run {
                tracing::info!(
                    step = ordinal,
                    name = %name,
                    dir = %working_dir.display(),
                    "would run: {}",
                    step.command_line()
                );
                report.steps.push(StepRecord {
                    step: ordinal,
                    name,
                    outcome: None,
                });
                continue;
            }

            let timeout = self.ctx.step_timeout(&step);
            tracing::info!(
                step = ordinal,
                name = %name,
                dir = %working_dir.display(),
                executor = self.executor.name(),
                "running: {}",
                step.command_line()
            );

            let outcome = self
                .executor
                .execute(&step, &working_dir, timeout)
                .map_err(|source| Error::LaunchFailed {
                    step: ordinal,
                    name: name.clone(),
                    command: step.command.clone(),
                    source,
                })?;

            if outcome.timed_out {
                let timeout = timeout.unwrap_or_default();
                tracing::warn!(step = ordinal, name = %name, ?timeout, "step timed out");
                return Err(Error::TimedOut {
                    step: ordinal,
                    name,
                    timeout,
                });
            }

            if !outcome.success {
                return Err(Error::StepFailed {
                    step: ordinal,
                    name,
                    exit_code: outcome.exit_code,
                });
            }

            tracing::info!(
                step = ordinal,
                name = %name,
                elapsed = ?outcome.duration,
                "step finished"
            );
            report.steps.push(StepRecord {
                step: ordinal,
                name,
                outcome: Some(outcome),
            });
        }

        Ok(report)
    }
}
