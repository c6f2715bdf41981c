//! Environment variable processing for runtime configuration overrides.
//!
//! Env var prefix: `RUN_BUILD_PLAN_`
//!
//! - `RUN_BUILD_PLAN_FILE`: plan file to load when `--plan` is not given
//! - `RUN_BUILD_PLAN_ROOT`: override the project root
//! - `RUN_BUILD_PLAN_TIMEOUT`: override the default step timeout (seconds)
//! - `RUN_BUILD_PLAN_VERBOSE`: enable verbose output (1/true/yes)

use super::Config;
use std::path::PathBuf;

const PREFIX: &str = "RUN_BUILD_PLAN_";

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Plan file from `RUN_BUILD_PLAN_FILE`.
pub fn get_plan_file() -> Option<PathBuf> {
    env_str("FILE").map(PathBuf::from)
}

/// Project root from `RUN_BUILD_PLAN_ROOT`.
pub fn get_root() -> Option<PathBuf> {
    env_str("ROOT").map(PathBuf::from)
}

/// Apply individual env var overrides to a config.
///
/// Invalid values are silently ignored.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(val) = env_parse::<u64>("TIMEOUT") {
        config.settings.timeout = Some(val);
    }

    if let Some(val) = env_bool("VERBOSE") {
        config.settings.verbose = val;
    }
}

/// Summarize which env var overrides are currently active.
pub fn detect_active_overrides() -> Vec<(String, String)> {
    let keys = ["FILE", "ROOT", "TIMEOUT", "VERBOSE"];

    let mut active = Vec::new();
    for key in keys {
        let full = format!("{PREFIX}{key}");
        if let Ok(val) = std::env::var(&full) {
            if !val.is_empty() {
                active.push((full, val));
            }
        }
    }
    active
}

// --- helpers ---

fn env_str(suffix: &str) -> Option<String> {
    std::env::var(format!("{PREFIX}{suffix}"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    env_str(suffix).and_then(|s| s.parse().ok())
}

fn env_bool(suffix: &str) -> Option<bool> {
    env_str(suffix).map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
}
