//! Tab-separated plan format.
//!
//! One step per line: `directory<TAB>command<TAB>arg...<TAB>enabled`.
//! Blank lines and lines starting with `#` are ignored. A line with only
//! `directory<TAB>command` is an enabled step without arguments; otherwise the
//! last field must be a boolean.

use super::BuildStep;
use crate::core::error::{Error, Result};

/// Parse a tab-separated plan into steps, in file order.
pub fn parse(content: &str) -> Result<Vec<BuildStep>> {
    let mut steps = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            return Err(Error::plan_parse(
                line_no,
                "expected at least a directory and a command separated by a tab",
            ));
        }

        let directory = fields[0].trim();
        let command = fields[1].trim();
        if directory.is_empty() {
            return Err(Error::plan_parse(line_no, "directory is empty"));
        }
        if command.is_empty() {
            return Err(Error::plan_parse(line_no, "command is empty"));
        }

        let mut step = BuildStep::new(directory, command);
        if fields.len() > 2 {
            let last = fields[fields.len() - 1];
            let enabled = parse_bool(last).ok_or_else(|| {
                Error::plan_parse(
                    line_no,
                    format!("last field must be an enabled flag (true/false), got '{}'", last),
                )
            })?;
            step = step
                .args(fields[2..fields.len() - 1].iter().copied())
                .enabled(enabled);
        }

        steps.push(step);
    }

    Ok(steps)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
