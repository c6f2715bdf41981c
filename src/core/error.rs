use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for run-build-plan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for errors raised before any step runs.
pub const EXIT_CONFIG: i32 = 2;

/// Exit code for a step whose working directory is missing.
pub const EXIT_DIRECTORY_NOT_FOUND: i32 = 1;

/// Exit code for a step that exceeded its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Main error type for run-build-plan.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed line in a tab-separated plan file.
    #[error("Plan parse error at line {line}: {message}")]
    PlanParse { line: usize, message: String },

    /// A step definition that cannot be executed.
    #[error("Invalid step at position {position}: {reason}")]
    InvalidStep { position: usize, reason: String },

    /// Two steps share the same name.
    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    /// No step with the requested name.
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// The requested step exists but is disabled.
    #[error("Step '{0}' is disabled")]
    StepDisabled(String),

    /// A step's working directory does not exist.
    #[error("Step {step} ({name}): working directory not found: {}", .path.display())]
    DirectoryNotFound {
        step: usize,
        name: String,
        path: PathBuf,
    },

    /// The step's command could not be started.
    #[error("Step {step} ({name}): failed to launch `{command}`: {source}")]
    LaunchFailed {
        step: usize,
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The step's process exited non-zero.
    #[error("Step {step} ({name}) failed with exit code {exit_code}")]
    StepFailed {
        step: usize,
        name: String,
        exit_code: i32,
    },

    /// The step's process was killed after exceeding its timeout.
    #[error("Step {step} ({name}) timed out after {timeout:?}")]
    TimedOut {
        step: usize,
        name: String,
        timeout: Duration,
    },

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cargo metadata error.
    #[cfg(feature = "cargo-metadata")]
    #[error("Cargo metadata error: {0}")]
    CargoMetadata(#[from] cargo_metadata::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a plan parse error for a 1-based line number.
    pub fn plan_parse(line: usize, msg: impl Into<String>) -> Self {
        Error::PlanParse {
            line,
            message: msg.into(),
        }
    }

    /// Create an invalid step error for a 1-based plan position.
    pub fn invalid_step(position: usize, reason: impl Into<String>) -> Self {
        Error::InvalidStep {
            position,
            reason: reason.into(),
        }
    }

    /// The 1-based ordinal (among enabled steps) of the step that failed, if
    /// this error aborted a run.
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            Error::DirectoryNotFound { step, .. }
            | Error::LaunchFailed { step, .. }
            | Error::StepFailed { step, .. }
            | Error::TimedOut { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Process exit code to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StepFailed { exit_code, .. } => {
                if (1..=255).contains(exit_code) {
                    *exit_code
                } else {
                    1
                }
            }
            Error::LaunchFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => 127,
                std::io::ErrorKind::PermissionDenied => 126,
                _ => 1,
            },
            Error::DirectoryNotFound { .. } => EXIT_DIRECTORY_NOT_FOUND,
            Error::TimedOut { .. } => EXIT_TIMED_OUT,
            _ => EXIT_CONFIG,
        }
    }
}
