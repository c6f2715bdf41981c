//! Step executor trait and the process-backed implementation.

use crate::plan::BuildStep;
use std::path::Path;
use std::time::Duration;

pub mod process;

pub use process::ProcessExecutor;

/// Executes a single build step.
pub trait StepExecutor: Send + Sync {
    /// Run `step` in `working_dir` and wait for it to finish.
    ///
    /// An `Err` means the command could not be started or waited on.
    fn execute(
        &self,
        step: &BuildStep,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> std::io::Result<StepOutcome>;

    /// Get a human-readable name for this executor.
    fn name(&self) -> &str;
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Exit code of the child. Signal-terminated children report 128 + signal.
    pub exit_code: i32,

    /// Whether the step exited successfully.
    pub success: bool,

    /// Whether the step was killed after exceeding its timeout.
    pub timed_out: bool,

    /// Wall-clock time the step took.
    pub duration: Duration,
}

impl StepOutcome {
    /// Create a new outcome.
    pub fn new(exit_code: i32, success: bool) -> Self {
        Self {
            exit_code,
            success,
            timed_out: false,
            duration: Duration::ZERO,
        }
    }

    /// Create a successful outcome with exit code 0.
    pub fn success() -> Self {
        Self::new(0, true)
    }

    /// Create a failed outcome with the given exit code.
    pub fn failed(exit_code: i32) -> Self {
        Self::new(exit_code, false)
    }

    /// Mark the outcome as timed out.
    pub fn with_timeout(mut self) -> Self {
        self.timed_out = true;
        self.success = false;
        self
    }

    /// Record how long the step ran.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Record of one enabled step in a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// 1-based ordinal among enabled steps.
    pub step: usize,

    /// Step name.
    pub name: String,

    /// Outcome, or `None` for a dry run.
    pub outcome: Option<StepOutcome>,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Enabled steps in execution order.
    pub steps: Vec<StepRecord>,

    /// Names of disabled steps that were skipped.
    pub skipped: Vec<String>,

    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl RunReport {
    /// Number of steps that actually spawned a process.
    pub fn executed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_some()).count()
    }

    /// Total time spent in executed steps.
    pub fn total_duration(&self) -> Duration {
        self.steps
            .iter()
            .filter_map(|s| s.outcome.as_ref())
            .map(|o| o.duration)
            .sum()
    }
}
