//! Env-file parsing
//!
//! Turns a `.env` file into shell `export` statements that can be prepended
//! to a remote command line.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Convert env-file content into `export KEY=VALUE` statements.
///
/// Blank lines and lines starting with `#` are skipped. Values are passed
/// through verbatim; quoting is whatever the file already uses.
pub fn parse_env(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| format!("export {}", line))
        .collect()
}

/// Read an env file from disk and parse it
pub fn load_env_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    Ok(parse_env(&content))
}

/// Join export statements into a script fragment, one per line
pub fn export_script(exports: &[String]) -> String {
    exports.join("\n")
}
