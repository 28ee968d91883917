//! Checkov integration for infrastructure-as-code checks
//!
//! Checkov is an open source static analyzer for Terraform, CloudFormation,
//! Kubernetes and similar configuration files.

use crate::{run_command, ExternalTool, ToolConfig, ToolError, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Checkov runner
pub struct Checkov {
    config: ToolConfig,
    executable: Option<PathBuf>,
}

impl Checkov {
    pub fn new(config: ToolConfig) -> Self {
        let executable = config.resolve("checkov");
        Self { config, executable }
    }

    /// Run `--version` and report whether the tool answered with exit code 0.
    pub async fn probe(&self) -> bool {
        match self.version().await {
            Ok(version) => {
                debug!(
                    "Checkov available at {}: {}",
                    self.executable_path().map(|p| p.display().to_string()).unwrap_or_default(),
                    version
                );
                true
            }
            Err(e) => {
                warn!("Checkov not found, using mock implementation: {}", e);
                false
            }
        }
    }

    /// Scan a single file.
    ///
    /// Checkov exits non-zero when at least one check failed. A zero exit
    /// code or empty output yields `Ok(None)`.
    pub async fn scan(&self, file_path: &Path) -> ToolResult<Option<CheckovOutput>> {
        let exe = self
            .executable
            .as_ref()
            .ok_or_else(|| ToolError::NotFound("checkov".to_string()))?;

        let (stdout, stderr, code) = run_command(
            exe,
            [
                OsStr::new("--file"),
                file_path.as_os_str(),
                OsStr::new("--output"),
                OsStr::new("json"),
                OsStr::new("--quiet"),
            ],
            self.config.timeout_secs,
        )
        .await?;

        if code == 0 || stdout.trim().is_empty() {
            debug!(
                "Checkov reported no failed checks for {} (exit {}, stderr: {})",
                file_path.display(),
                code,
                stderr.trim()
            );
            return Ok(None);
        }

        CheckovOutput::parse(&stdout).map(Some)
    }
}

#[async_trait]
impl ExternalTool for Checkov {
    fn name(&self) -> &str {
        "checkov"
    }

    /// True when the executable answers `--version` with exit code 0
    async fn is_available(&self) -> bool {
        self.version().await.is_ok()
    }

    async fn version(&self) -> ToolResult<String> {
        let exe = self
            .executable
            .as_ref()
            .ok_or_else(|| ToolError::NotFound("checkov".to_string()))?;

        let (stdout, stderr, code) =
            run_command(exe, ["--version"], self.config.timeout_secs).await?;

        if code != 0 {
            return Err(ToolError::ExecutionFailed(stderr));
        }

        Ok(stdout.lines().next().unwrap_or("unknown").trim().to_string())
    }

    fn executable_path(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}

/// JSON printed by `checkov --output json`.
///
/// A single framework produces one report object; several frameworks
/// produce an array of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckovOutput {
    Single(CheckovReport),
    Multiple(Vec<CheckovReport>),
}

impl CheckovOutput {
    pub fn parse(raw: &str) -> ToolResult<Self> {
        serde_json::from_str(raw).map_err(|e| ToolError::ParseError(e.to_string()))
    }

    /// Failed checks across all reports, in output order
    pub fn failed_checks(&self) -> Vec<&CheckovCheck> {
        match self {
            CheckovOutput::Single(report) => report.results.failed_checks.iter().collect(),
            CheckovOutput::Multiple(reports) => reports
                .iter()
                .flat_map(|r| r.results.failed_checks.iter())
                .collect(),
        }
    }
}

/// One framework's report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckovReport {
    #[serde(default)]
    pub check_type: Option<String>,
    #[serde(default)]
    pub results: CheckovResults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckovResults {
    #[serde(default)]
    pub failed_checks: Vec<CheckovCheck>,
}

/// A failed check as emitted by Checkov. Any field may be missing or null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckovCheck {
    pub check_id: Option<String>,
    pub check_name: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub file_line_range: Option<Vec<u32>>,
    pub resource: Option<String>,
    pub guideline: Option<String>,
}
