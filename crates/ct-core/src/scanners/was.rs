//! Web application scanner
//!
//! Produces demonstration findings for a URL without contacting it. Alert
//! records from a real dynamic scanner can be normalized into the same
//! shape with [`WasScanner::from_alerts`].

use super::{sample_subset, Scanner};
use crate::finding::{map_severity, Finding, ScanResult};
use crate::{CoreResult, ScanType, Severity};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

/// A catalog entry; `suffix` is appended to the target URL
#[derive(Debug, Clone)]
pub struct FindingTemplate {
    pub name: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub suffix: &'static str,
    pub confidence: &'static str,
    pub cwe: &'static str,
    pub solution: &'static str,
}

impl FindingTemplate {
    fn instantiate(&self, target_url: &str) -> Finding {
        Finding {
            name: self.name.to_string(),
            severity: self.severity,
            description: self.description.to_string(),
            location: format!("{}{}", target_url, self.suffix),
            confidence: self.confidence.to_string(),
            risk: self.severity.to_string(),
            cwe: self.cwe.to_string(),
            solution: self.solution.to_string(),
        }
    }
}

/// Findings the mock scan draws from, in catalog order
pub const CATALOG: [FindingTemplate; 4] = [
    FindingTemplate {
        name: "Cross-Site Scripting (XSS)",
        severity: Severity::High,
        description: "Potential XSS vulnerability detected in input fields",
        suffix: "/search",
        confidence: "Medium",
        cwe: "CWE-79",
        solution: "Implement proper input validation and output encoding",
    },
    FindingTemplate {
        name: "SQL Injection",
        severity: Severity::Critical,
        description: "Possible SQL injection vulnerability in login form",
        suffix: "/login",
        confidence: "High",
        cwe: "CWE-89",
        solution: "Use parameterized queries and input validation",
    },
    FindingTemplate {
        name: "Missing Security Headers",
        severity: Severity::Medium,
        description: "Security headers are missing or misconfigured",
        suffix: "",
        confidence: "High",
        cwe: "CWE-16",
        solution: "Implement security headers like CSP, HSTS, X-Frame-Options",
    },
    FindingTemplate {
        name: "Insecure Direct Object Reference",
        severity: Severity::High,
        description: "Direct object references without proper authorization",
        suffix: "/user/profile",
        confidence: "Medium",
        cwe: "CWE-639",
        solution: "Implement proper access controls and authorization checks",
    },
];

/// Draw a non-empty random subset of `catalog` for `target_url`
pub fn mock_findings<R: Rng + ?Sized>(
    catalog: &[FindingTemplate],
    target_url: &str,
    rng: &mut R,
) -> Vec<Finding> {
    sample_subset(catalog, 1, rng)
        .into_iter()
        .map(|template| template.instantiate(target_url))
        .collect()
}

/// Web application security scanner (mock)
pub struct WasScanner {
    catalog: Vec<FindingTemplate>,
    rng: Mutex<StdRng>,
}

impl WasScanner {
    /// Scanner seeded from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Scanner with a caller-supplied random source
    pub fn with_rng(rng: StdRng) -> Self {
        Self::with_catalog(CATALOG.to_vec(), rng)
    }

    pub fn with_catalog(catalog: Vec<FindingTemplate>, rng: StdRng) -> Self {
        Self {
            catalog,
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &[FindingTemplate] {
        &self.catalog
    }

    /// Produce a mock result for `target_url`. Never fails.
    pub async fn scan_url(&self, target_url: &str) -> ScanResult {
        let findings = {
            let mut rng = self.rng.lock().await;
            mock_findings(&self.catalog, target_url, &mut *rng)
        };

        info!("WAS scan of {} produced {} findings", target_url, findings.len());
        ScanResult::web(target_url, findings)
    }

    /// Normalize alerts from an external dynamic scanner.
    ///
    /// Uses the same finding shape and summary as the mock path. Not wired
    /// to a live scanner.
    pub fn from_alerts(target_url: &str, report: &AlertReport) -> ScanResult {
        let findings = report
            .alerts
            .iter()
            .map(|alert| alert.to_finding(target_url))
            .collect();

        ScanResult::web(target_url, findings)
    }
}

impl Default for WasScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for WasScanner {
    fn scan_type(&self) -> ScanType {
        ScanType::WebApplication
    }

    async fn scan(&self, target: &str) -> CoreResult<ScanResult> {
        Ok(self.scan_url(target).await)
    }
}

/// Alert list as exported by a dynamic scanner such as OWASP ZAP
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertReport {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub alert: Option<String>,
    pub risk: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub confidence: Option<String>,
    pub cweid: Option<String>,
    pub solution: Option<String>,
}

impl Alert {
    fn to_finding(&self, target_url: &str) -> Finding {
        let risk = self.risk.clone().unwrap_or_else(|| "Unknown".to_string());

        Finding {
            name: self.alert.clone().unwrap_or_else(|| "Unknown".to_string()),
            severity: map_severity(&risk),
            description: self.description.clone().unwrap_or_default(),
            location: self.url.clone().unwrap_or_else(|| target_url.to_string()),
            confidence: self.confidence.clone().unwrap_or_else(|| "Unknown".to_string()),
            risk,
            cwe: self.cweid.clone().unwrap_or_default(),
            solution: self.solution.clone().unwrap_or_default(),
        }
    }
}
