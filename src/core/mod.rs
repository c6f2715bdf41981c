//! Core types for running a plan: runner, builder, context, and error handling.

pub mod builder;
pub mod context;
pub mod error;

pub use builder::{PlannedRun, RunBuilder, StepRunner};
pub use context::Context;
pub use error::{Error, Result};
