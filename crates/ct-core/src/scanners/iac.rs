//! Infrastructure-as-code scanner
//!
//! Runs Checkov when it is installed and normalizes its failed checks.
//! Whenever Checkov is missing, finds nothing, or misbehaves, the scanner
//! degrades to demonstration issues instead of failing the scan.

use super::{sample_subset, Scanner};
use crate::finding::{map_severity, Issue, ScanResult};
use crate::{CoreResult, ScanType, Severity};
use async_trait::async_trait;
use ct_tools::{Checkov, CheckovOutput, ToolConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A catalog entry; the file path is filled in at scan time
#[derive(Debug, Clone)]
pub struct IssueTemplate {
    pub check_id: &'static str,
    pub check_name: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub line_range: [u32; 2],
    pub resource: &'static str,
    pub guideline: &'static str,
    pub remediation: &'static str,
}

impl IssueTemplate {
    fn instantiate(&self, file_path: &str) -> Issue {
        Issue {
            check_id: self.check_id.to_string(),
            check_name: self.check_name.to_string(),
            severity: self.severity,
            description: self.description.to_string(),
            file_path: file_path.to_string(),
            line_range: self.line_range.to_vec(),
            resource: self.resource.to_string(),
            guideline: self.guideline.to_string(),
            remediation: self.remediation.to_string(),
        }
    }
}

/// Issues the mock scan draws from, in catalog order
pub const CATALOG: [IssueTemplate; 5] = [
    IssueTemplate {
        check_id: "CKV_AWS_20",
        check_name: "S3 Bucket public read acl",
        severity: Severity::High,
        description: "S3 bucket should not have public read access",
        line_range: [15, 25],
        resource: "aws_s3_bucket.example",
        guideline: "Remove public read access from S3 bucket ACL",
        remediation: "Set bucket ACL to private and use bucket policies for controlled access",
    },
    IssueTemplate {
        check_id: "CKV_AWS_21",
        check_name: "S3 Bucket versioning",
        severity: Severity::Medium,
        description: "S3 bucket should have versioning enabled",
        line_range: [30, 35],
        resource: "aws_s3_bucket.example",
        guideline: "Enable versioning on S3 bucket",
        remediation: "Add versioning configuration to S3 bucket resource",
    },
    IssueTemplate {
        check_id: "CKV_AWS_8",
        check_name: "Launch configuration security group",
        severity: Severity::Critical,
        description: "Launch configuration should not have security group with 0.0.0.0/0",
        line_range: [45, 55],
        resource: "aws_launch_configuration.example",
        guideline: "Restrict security group access",
        remediation: "Replace 0.0.0.0/0 with specific IP ranges or security groups",
    },
    IssueTemplate {
        check_id: "CKV_AWS_2",
        check_name: "ALB listener HTTPS",
        severity: Severity::High,
        description: "ALB listener should use HTTPS",
        line_range: [60, 70],
        resource: "aws_lb_listener.example",
        guideline: "Use HTTPS protocol for ALB listener",
        remediation: "Change protocol from HTTP to HTTPS and add SSL certificate",
    },
    IssueTemplate {
        check_id: "CKV_AWS_23",
        check_name: "Security group SSH access",
        severity: Severity::High,
        description: "Security group should not allow SSH access from 0.0.0.0/0",
        line_range: [75, 85],
        resource: "aws_security_group.example",
        guideline: "Restrict SSH access to specific IP ranges",
        remediation: "Replace 0.0.0.0/0 with specific IP addresses or ranges for SSH access",
    },
];

/// Mock issues are drawn in batches of at least this many
pub const MIN_MOCK_ISSUES: usize = 2;

/// Draw a random subset of `catalog` (at least two issues) for `file_path`
pub fn mock_issues<R: Rng + ?Sized>(
    catalog: &[IssueTemplate],
    file_path: &str,
    rng: &mut R,
) -> Vec<Issue> {
    sample_subset(catalog, MIN_MOCK_ISSUES, rng)
        .into_iter()
        .map(|template| template.instantiate(file_path))
        .collect()
}

/// Convert Checkov's failed checks into issues.
///
/// `remediation` repeats the check description; Checkov's own remediation
/// fields are not used.
pub fn normalize_checkov(output: &CheckovOutput, file_path: &str) -> ScanResult {
    let issues = output
        .failed_checks()
        .into_iter()
        .map(|check| {
            let description = check.description.clone().unwrap_or_default();
            Issue {
                check_id: check.check_id.clone().unwrap_or_default(),
                check_name: check.check_name.clone().unwrap_or_default(),
                severity: check
                    .severity
                    .as_deref()
                    .map_or(Severity::Medium, map_severity),
                remediation: description.clone(),
                description,
                file_path: check
                    .file_path
                    .clone()
                    .unwrap_or_else(|| file_path.to_string()),
                line_range: check.file_line_range.clone().unwrap_or_default(),
                resource: check.resource.clone().unwrap_or_default(),
                guideline: check.guideline.clone().unwrap_or_default(),
            }
        })
        .collect();

    ScanResult::iac(file_path, issues)
}

/// Why a scan used mock issues instead of Checkov output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The availability probe failed when the scanner was built
    ToolUnavailable,
    /// Checkov ran and reported no failed checks
    NoFailedChecks,
    /// Checkov could not be run or its output could not be parsed
    Tool(String),
}

/// Result of an IaC scan, keeping track of where the issues came from
#[derive(Debug, Clone)]
pub enum IacOutcome {
    External(ScanResult),
    Degraded { reason: Fallback, result: ScanResult },
}

impl IacOutcome {
    pub fn result(&self) -> &ScanResult {
        match self {
            IacOutcome::External(result) => result,
            IacOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> ScanResult {
        match self {
            IacOutcome::External(result) => result,
            IacOutcome::Degraded { result, .. } => result,
        }
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        match self {
            IacOutcome::External(_) => None,
            IacOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Infrastructure-as-code scanner backed by Checkov
pub struct IacScanner {
    checkov: Checkov,
    available: bool,
    catalog: Vec<IssueTemplate>,
    rng: Mutex<StdRng>,
}

impl IacScanner {
    /// Build a scanner and probe Checkov once. The probe result is kept for
    /// the lifetime of this scanner.
    pub async fn new(config: ToolConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy()).await
    }

    pub async fn with_rng(config: ToolConfig, rng: StdRng) -> Self {
        let checkov = Checkov::new(config);
        let available = checkov.probe().await;

        Self {
            checkov,
            available,
            catalog: CATALOG.to_vec(),
            rng: Mutex::new(rng),
        }
    }

    pub fn checkov_available(&self) -> bool {
        self.available
    }

    /// Scan a file. Never fails.
    pub async fn scan_file(&self, file_path: &str) -> ScanResult {
        self.scan_outcome(file_path).await.into_result()
    }

    /// Scan a file and report whether Checkov output or mock issues were used
    pub async fn scan_outcome(&self, file_path: &str) -> IacOutcome {
        if !self.available {
            return self.degrade(file_path, Fallback::ToolUnavailable).await;
        }

        match self.checkov.scan(Path::new(file_path)).await {
            Ok(Some(output)) => {
                let result = normalize_checkov(&output, file_path);
                info!(
                    "Checkov reported {} failed checks for {}",
                    result.summary.total, file_path
                );
                IacOutcome::External(result)
            }
            Ok(None) => self.degrade(file_path, Fallback::NoFailedChecks).await,
            Err(e) => {
                warn!("IaC scan failed: {}", e);
                self.degrade(file_path, Fallback::Tool(e.to_string())).await
            }
        }
    }

    async fn degrade(&self, file_path: &str, reason: Fallback) -> IacOutcome {
        let issues = {
            let mut rng = self.rng.lock().await;
            mock_issues(&self.catalog, file_path, &mut *rng)
        };

        info!(
            "IaC scan of {} using mock issues ({:?}): {} issues",
            file_path,
            reason,
            issues.len()
        );

        IacOutcome::Degraded {
            reason,
            result: ScanResult::iac(file_path, issues),
        }
    }
}

#[async_trait]
impl Scanner for IacScanner {
    fn scan_type(&self) -> ScanType {
        ScanType::InfrastructureAsCode
    }

    async fn scan(&self, target: &str) -> CoreResult<ScanResult> {
        Ok(self.scan_file(target).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScanItems;
    use std::collections::HashSet;

    fn offline_config() -> ToolConfig {
        ToolConfig::default().with_tool_path("checkov", "/nonexistent/checkov")
    }

    fn issues(result: &ScanResult) -> &[Issue] {
        match &result.items {
            ScanItems::Issues(i) => i,
            ScanItems::Findings(_) => panic!("IaC scan produced findings"),
        }
    }

    #[tokio::test]
    async fn test_mock_scan_without_checkov() {
        let scanner = IacScanner::with_rng(offline_config(), StdRng::seed_from_u64(5)).await;
        assert!(!scanner.checkov_available());

        let ids: HashSet<&str> = CATALOG.iter().map(|t| t.check_id).collect();

        for _ in 0..200 {
            let outcome = scanner.scan_outcome("uploads/main.tf").await;
            assert_eq!(outcome.fallback(), Some(&Fallback::ToolUnavailable));

            let result = outcome.result();
            assert_eq!(result.target, "uploads/main.tf");
            assert_eq!(result.scan_type, ScanType::InfrastructureAsCode);

            let found = issues(result);
            assert!((2..=5).contains(&found.len()));
            let distinct: HashSet<&str> = found.iter().map(|i| i.check_id.as_str()).collect();
            assert_eq!(distinct.len(), found.len());
            assert!(distinct.is_subset(&ids));
            assert!(found.iter().all(|i| i.file_path == "uploads/main.tf"));
            assert_eq!(result.items.summarize(), result.summary);
        }
    }

    #[test]
    fn test_mock_issue_fields() {
        let mut rng = StdRng::seed_from_u64(0);
        for issue in mock_issues(&CATALOG, "main.tf", &mut rng) {
            let template = CATALOG.iter().find(|t| t.check_id == issue.check_id).unwrap();
            assert_eq!(issue.line_range, template.line_range.to_vec());
            assert_eq!(issue.remediation, template.remediation);
            assert_eq!(issue.severity, template.severity);
        }
    }

    #[test]
    fn test_normalize_checkov() {
        let output = CheckovOutput::parse(
            r#"{
                "check_type": "terraform",
                "results": {
                    "failed_checks": [
                        {
                            "check_id": "CKV_AWS_20",
                            "check_name": "S3 Bucket has an ACL defined which allows public READ access.",
                            "severity": "critical",
                            "description": "Bucket is world readable",
                            "file_path": "/main.tf",
                            "file_line_range": [4, 11],
                            "resource": "aws_s3_bucket.data",
                            "guideline": "https://docs.example.com/ckv-aws-20"
                        },
                        {
                            "check_id": "CKV_AWS_144",
                            "check_name": "Ensure that S3 bucket has cross-region replication enabled",
                            "severity": null
                        },
                        {
                            "check_id": "CKV2_AWS_6",
                            "severity": "INFO",
                            "description": "Public access block missing"
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let result = normalize_checkov(&output, "uploads/main.tf");
        let found = issues(&result);

        assert_eq!(result.target, "uploads/main.tf");
        assert_eq!(found.len(), 3);

        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[0].file_path, "/main.tf");
        assert_eq!(found[0].line_range, vec![4, 11]);
        assert_eq!(found[0].remediation, "Bucket is world readable");
        assert_eq!(found[0].remediation, found[0].description);

        assert_eq!(found[1].severity, Severity::Medium);
        assert_eq!(found[1].file_path, "uploads/main.tf");
        assert!(found[1].line_range.is_empty());
        assert_eq!(found[1].guideline, "");

        assert_eq!(found[2].severity, Severity::Low);
        assert_eq!(found[2].remediation, "Public access block missing");

        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.summary.medium, 1);
        assert_eq!(result.summary.low, 1);
    }

    #[test]
    fn test_normalize_multiple_reports() {
        let output = CheckovOutput::parse(
            r#"[
                {"check_type": "terraform", "results": {"failed_checks": [{"check_id": "CKV_AWS_1", "severity": "HIGH"}]}},
                {"check_type": "secrets", "results": {"failed_checks": [{"check_id": "CKV_SECRET_2", "severity": "LOW"}]}}
            ]"#,
        )
        .unwrap();

        let result = normalize_checkov(&output, "stack.yaml");
        let ids: Vec<&str> = issues(&result).iter().map(|i| i.check_id.as_str()).collect();
        assert_eq!(ids, vec!["CKV_AWS_1", "CKV_SECRET_2"]);
        assert_eq!(result.summary.high, 1);
        assert_eq!(result.summary.low, 1);
    }
}
