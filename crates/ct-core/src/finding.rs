//! Normalized finding schema shared by every scanner
//!
//! Both scanners emit [`ScanResult`]s whose summary is always derived from
//! the items it describes, never stored separately.

use crate::{ScanType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Map a free-form severity label from an external tool onto the canonical
/// levels. Case-insensitive; `INFO` counts as `Low` and anything
/// unrecognized becomes `Medium`.
pub fn map_severity(raw: &str) -> Severity {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" | "INFO" => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Anything that can be counted into a [`ScanSummary`]
pub trait Classified {
    fn severity(&self) -> Severity;
}

/// Web application finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub confidence: String,
    pub risk: String,
    pub cwe: String,
    pub solution: String,
}

impl Classified for Finding {
    fn severity(&self) -> Severity {
        self.severity
    }
}

/// Infrastructure-as-code issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub check_id: String,
    pub check_name: String,
    pub severity: Severity,
    pub description: String,
    pub file_path: String,
    pub line_range: Vec<u32>,
    pub resource: String,
    pub guideline: String,
    pub remediation: String,
}

impl Classified for Issue {
    fn severity(&self) -> Severity {
        self.severity
    }
}

/// Counts per severity bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanSummary {
    pub fn from_items<T: Classified>(items: &[T]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };

        for item in items {
            match item.severity() {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }

        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// The per-scanner item list. Serialized as a `findings` or `issues` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanItems {
    Findings(Vec<Finding>),
    Issues(Vec<Issue>),
}

impl ScanItems {
    pub fn len(&self) -> usize {
        match self {
            ScanItems::Findings(f) => f.len(),
            ScanItems::Issues(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute the summary from the items themselves
    pub fn summarize(&self) -> ScanSummary {
        match self {
            ScanItems::Findings(f) => ScanSummary::from_items(f),
            ScanItems::Issues(i) => ScanSummary::from_items(i),
        }
    }
}

/// Normalized output of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub scan_type: ScanType,
    pub timestamp: DateTime<Utc>,
    pub summary: ScanSummary,
    #[serde(flatten)]
    pub items: ScanItems,
}

impl ScanResult {
    pub fn web(target: &str, findings: Vec<Finding>) -> Self {
        Self::build(target, ScanType::WebApplication, ScanItems::Findings(findings))
    }

    pub fn iac(target: &str, issues: Vec<Issue>) -> Self {
        Self::build(target, ScanType::InfrastructureAsCode, ScanItems::Issues(issues))
    }

    fn build(target: &str, scan_type: ScanType, items: ScanItems) -> Self {
        Self {
            target: target.to_string(),
            scan_type,
            timestamp: Utc::now(),
            summary: items.summarize(),
            items,
        }
    }
}

/// What a scan record carries once the scan has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanPayload {
    Result(ScanResult),
    Error { error: String },
}

impl ScanPayload {
    pub fn as_result(&self) -> Option<&ScanResult> {
        match self {
            ScanPayload::Result(result) => Some(result),
            ScanPayload::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ScanPayload::Result(_) => None,
            ScanPayload::Error { error } => Some(error),
        }
    }
}
