//! CyferTrace Core Scan Engine
//!
//! This crate turns a scan request into a persisted, normalized result:
//! the web-application and infrastructure-as-code scanners, the shared
//! finding schema, the scan record lifecycle and report export.

pub mod finding;
pub mod lifecycle;
pub mod report;
pub mod scanners;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use finding::{map_severity, Classified, Finding, Issue, ScanItems, ScanPayload, ScanResult, ScanSummary};
pub use lifecycle::store::{MemoryScanStore, ScanStats, ScanStore};
pub use lifecycle::{Principal, Role, ScanManager, ScanRecord, ScanStatus, StoredScan};
pub use report::{ReportError, ReportFormat};
pub use scanners::iac::{Fallback, IacOutcome, IacScanner};
pub use scanners::was::{Alert, AlertReport, WasScanner};
pub use scanners::Scanner;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Scan not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: ScanStatus, to: ScanStatus },

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Kind of scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    #[serde(rename = "web_application_security")]
    WebApplication,
    #[serde(rename = "infrastructure_as_code")]
    InfrastructureAsCode,
}

impl ScanType {
    /// Short code used by the request layer and the database
    pub fn code(&self) -> &'static str {
        match self {
            ScanType::WebApplication => "was",
            ScanType::InfrastructureAsCode => "iac",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "was" => Some(ScanType::WebApplication),
            "iac" => Some(ScanType::InfrastructureAsCode),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::WebApplication => write!(f, "Web Application Security"),
            ScanType::InfrastructureAsCode => write!(f, "Infrastructure as Code"),
        }
    }
}

/// Severity levels for findings and issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}
