//! External Tool Integration for Security Scans
//!
//! This crate wraps third-party analysis tools that run as separate
//! processes. Every invocation is bounded by a timeout so a hung tool can
//! never block the request that triggered it.

pub mod checkov;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use checkov::{Checkov, CheckovCheck, CheckovOutput, CheckovReport};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timeout after {0} seconds")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Trait for external tool integrations
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Get tool name
    fn name(&self) -> &str;

    /// Check if tool is available
    async fn is_available(&self) -> bool;

    /// Get tool version
    async fn version(&self) -> ToolResult<String>;

    /// Get tool executable path
    fn executable_path(&self) -> Option<&Path>;
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Custom tool paths (if not in PATH)
    pub tool_paths: HashMap<String, PathBuf>,

    /// Timeout for each tool invocation (seconds)
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool_paths: HashMap::new(),
            timeout_secs: 30,
        }
    }
}

impl ToolConfig {
    /// Pin a tool to an explicit executable instead of searching PATH
    pub fn with_tool_path(mut self, tool: &str, path: impl Into<PathBuf>) -> Self {
        self.tool_paths.insert(tool.to_string(), path.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Resolve a tool executable: explicit path first, then PATH
    pub fn resolve(&self, tool: &str) -> Option<PathBuf> {
        self.tool_paths
            .get(tool)
            .cloned()
            .or_else(|| get_command_path(tool))
    }
}

/// Run a command with timeout, returning `(stdout, stderr, exit_code)`.
///
/// A process killed by a signal reports exit code `-1`. On timeout the child
/// is killed.
pub async fn run_command<I, S>(
    cmd: &Path,
    args: I,
    timeout_secs: u64,
) -> ToolResult<(String, String, i32)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    use tokio::process::Command;
    use tokio::time::{timeout, Duration};

    let result = timeout(
        Duration::from_secs(timeout_secs),
        Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let code = output.status.code().unwrap_or(-1);
            Ok((stdout, stderr, code))
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::NotFound(cmd.display().to_string()))
        }
        Ok(Err(e)) => Err(ToolError::ExecutionFailed(e.to_string())),
        Err(_) => Err(ToolError::Timeout(timeout_secs)),
    }
}

/// Get command path
pub fn get_command_path(cmd: &str) -> Option<PathBuf> {
    which::which(cmd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_tool_path_wins() {
        let config = ToolConfig::default().with_tool_path("checkov", "/opt/checkov/bin/checkov");
        assert_eq!(
            config.resolve("checkov"),
            Some(PathBuf::from("/opt/checkov/bin/checkov"))
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(get_command_path("ct-definitely-not-a-real-tool").is_none());
    }

    #[tokio::test]
    async fn test_run_missing_command() {
        let err = run_command(Path::new("/nonexistent/ct-tool"), ["--version"], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
