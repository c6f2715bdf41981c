//! run-build-plan: a fail-fast runner for ordered build and deploy steps.
//!
//! A [`BuildPlan`] is an ordered list of [`BuildStep`]s, each an external
//! command with a working directory and arguments. [`StepRunner`] executes the
//! enabled steps one at a time, resolving every working directory against a
//! fixed project root, and stops at the first step that fails.
//!
//! # Quick Start
//!
//! ```no_run
//! use run_build_plan::{BuildPlan, BuildStep, Context, StepRunner};
//!
//! # fn main() -> run_build_plan::Result<()> {
//! let plan = BuildPlan::new(vec![
//!     BuildStep::new("contracts/staking", "sh").arg("build.sh"),
//!     BuildStep::new("contracts/pair", "sh").arg("build.sh").disabled(),
//!     BuildStep::new("scripts", "./deploy.sh").name("deploy"),
//! ])?;
//!
//! let report = StepRunner::new(Context::new(".")).run(plan)?;
//! println!("{} steps completed", report.executed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Plan files
//!
//! ```toml
//! [settings]
//! timeout = 600
//!
//! [[steps]]
//! name = "staking"
//! dir = "contracts/tokenomics/staking"
//! command = "sh"
//! args = ["build.sh"]
//!
//! [[steps]]
//! name = "deploy"
//! dir = "scripts"
//! command = "./deploy.sh"
//! enabled = false
//! ```
//!
//! Tab-separated files hold one step per line:
//! `directory<TAB>command<TAB>arg...<TAB>enabled`.
//!
//! ```no_run
//! # fn main() -> run_build_plan::Result<()> {
//! run_build_plan::builder()
//!     .from_plan_file("build-plan.toml")?
//!     .only("deploy")
//!     .run()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `default` - Enables `cli` and `cargo-metadata`
//! - `cli` - The `run-build-plan` binary
//! - `cargo-metadata` - Read plans from `[package.metadata.build-plan]`

pub mod config;
pub mod core;
pub mod plan;
pub mod runner;

// Re-export commonly used types
pub use crate::core::{Context, Error, PlannedRun, Result, RunBuilder, StepRunner};
pub use config::{Config, ConfigLoader};
pub use plan::{BuildPlan, BuildStep};
pub use runner::{RunReport, StepExecutor, StepOutcome};

/// Create a new run builder.
///
/// # Example
///
/// ```no_run
/// # fn main() -> run_build_plan::Result<()> {
/// run_build_plan::builder().from_project()?.dry_run(true).run()?;
/// # Ok(())
/// # }
/// ```
pub fn builder() -> RunBuilder {
    RunBuilder::new()
}
