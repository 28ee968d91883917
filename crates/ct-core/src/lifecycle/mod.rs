//! Scan record lifecycle
//!
//! `Pending -> Running -> Completed | Failed`. A record is persisted as
//! `Running` before its scanner is invoked, so a crash mid-scan leaves a
//! durable `Running` record behind for inspection. Nothing retries those.

pub mod store;

use crate::finding::{ScanPayload, ScanResult};
use crate::scanners::iac::IacScanner;
use crate::scanners::was::WasScanner;
use crate::scanners::Scanner;
use crate::{CoreError, CoreResult, ScanType};
use chrono::{DateTime, Utc};
use ct_tools::ToolConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use store::ScanStore;
use tracing::{error, info};
use uuid::Uuid;

/// Status of a scan record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScanStatus::Pending),
            "running" => Some(ScanStatus::Running),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of the principal reading a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The caller a scan is created for or read by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::User }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One scan request and its outcome.
///
/// `completed_at` and `results` are set together, exactly when the status
/// becomes terminal. Deserialization goes through [`StoredScan`] and
/// rejects records that break this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredScan")]
pub struct ScanRecord {
    id: Uuid,
    scan_type: ScanType,
    target: String,
    status: ScanStatus,
    results: Option<ScanPayload>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    owner_id: String,
}

impl ScanRecord {
    pub fn new(scan_type: ScanType, target: &str, owner_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_type,
            target: target.to_string(),
            status: ScanStatus::Pending,
            results: None,
            created_at: Utc::now(),
            completed_at: None,
            owner_id: owner_id.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn results(&self) -> Option<&ScanPayload> {
        self.results.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Error message of a failed scan
    pub fn error(&self) -> Option<&str> {
        self.results.as_ref().and_then(ScanPayload::error)
    }

    /// Owners and admins may read a scan
    pub fn readable_by(&self, principal: &Principal) -> bool {
        principal.is_admin() || principal.id == self.owner_id
    }

    pub(crate) fn mark_running(&mut self) -> CoreResult<()> {
        self.transition(ScanStatus::Pending, ScanStatus::Running)
    }

    pub(crate) fn complete(&mut self, result: ScanResult) -> CoreResult<()> {
        self.transition(ScanStatus::Running, ScanStatus::Completed)?;
        self.finish(ScanPayload::Result(result));
        Ok(())
    }

    pub(crate) fn fail(&mut self, message: String) -> CoreResult<()> {
        self.transition(ScanStatus::Running, ScanStatus::Failed)?;
        self.finish(ScanPayload::Error { error: message });
        Ok(())
    }

    fn transition(&mut self, from: ScanStatus, to: ScanStatus) -> CoreResult<()> {
        if self.status != from {
            return Err(CoreError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    fn finish(&mut self, payload: ScanPayload) {
        self.results = Some(payload);
        self.completed_at = Some(Utc::now());
    }
}

/// Flat view of a persisted record, used by stores to rebuild a
/// [`ScanRecord`]
#[derive(Debug, Clone, Deserialize)]
pub struct StoredScan {
    pub id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    pub status: ScanStatus,
    pub results: Option<ScanPayload>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub owner_id: String,
}

impl TryFrom<StoredScan> for ScanRecord {
    type Error = CoreError;

    fn try_from(stored: StoredScan) -> CoreResult<Self> {
        let terminal = stored.status.is_terminal();
        if terminal != stored.completed_at.is_some() || terminal != stored.results.is_some() {
            return Err(CoreError::Store(format!(
                "scan {} is {} but completed_at/results disagree",
                stored.id, stored.status
            )));
        }

        Ok(Self {
            id: stored.id,
            scan_type: stored.scan_type,
            target: stored.target,
            status: stored.status,
            results: stored.results,
            created_at: stored.created_at,
            completed_at: stored.completed_at,
            owner_id: stored.owner_id,
        })
    }
}

/// Runs scans and records their outcome
pub struct ScanManager {
    store: Arc<dyn ScanStore>,
    scanners: HashMap<ScanType, Box<dyn Scanner>>,
}

impl ScanManager {
    /// Manager with no scanners registered
    pub fn new(store: Arc<dyn ScanStore>) -> Self {
        Self {
            store,
            scanners: HashMap::new(),
        }
    }

    /// Manager with the web application and IaC scanners. Probes for
    /// Checkov once.
    pub async fn with_default_scanners(store: Arc<dyn ScanStore>, tools: ToolConfig) -> Self {
        let mut manager = Self::new(store);
        manager.register(Box::new(WasScanner::new()));
        manager.register(Box::new(IacScanner::new(tools).await));
        manager
    }

    /// Register a scanner, replacing any previous one for its scan type
    pub fn register(&mut self, scanner: Box<dyn Scanner>) {
        self.scanners.insert(scanner.scan_type(), scanner);
    }

    pub fn store(&self) -> &Arc<dyn ScanStore> {
        &self.store
    }

    /// Create a record and persist it as `Running`
    pub async fn start(
        &self,
        scan_type: ScanType,
        target: &str,
        owner_id: &str,
    ) -> CoreResult<ScanRecord> {
        let mut record = ScanRecord::new(scan_type, target, owner_id);
        record.mark_running()?;
        self.store.insert(&record).await?;

        info!("Starting {} scan {} for {}", scan_type.code(), record.id(), target);
        Ok(record)
    }

    /// Run a scan to completion and persist the outcome.
    ///
    /// Scanner and persistence errors end in a `Failed` record carrying the
    /// error message. Errors creating the record are returned.
    pub async fn run(
        &self,
        scan_type: ScanType,
        target: &str,
        owner_id: &str,
    ) -> CoreResult<ScanRecord> {
        let mut record = self.start(scan_type, target, owner_id).await?;

        let err = match self.invoke(scan_type, target).await {
            Ok(result) => {
                let mut done = record.clone();
                done.complete(result)?;

                match self.store.update(&done).await {
                    Ok(()) => {
                        info!("Scan {} completed", done.id());
                        return Ok(done);
                    }
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        error!("Scan {} failed: {}", record.id(), err);
        record.fail(err.to_string())?;
        self.store.update(&record).await?;
        Ok(record)
    }

    /// Load a record by id
    pub async fn load(&self, id: Uuid) -> CoreResult<ScanRecord> {
        self.store.get(id).await?.ok_or(CoreError::NotFound(id))
    }

    async fn invoke(&self, scan_type: ScanType, target: &str) -> CoreResult<ScanResult> {
        let scanner = self.scanners.get(&scan_type).ok_or_else(|| {
            CoreError::Scanner(format!("no scanner registered for {}", scan_type.code()))
        })?;
        scanner.scan(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::ScanItems;
    use crate::lifecycle::store::MemoryScanStore;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct BrokenScanner;

    #[async_trait]
    impl Scanner for BrokenScanner {
        fn scan_type(&self) -> ScanType {
            ScanType::WebApplication
        }

        async fn scan(&self, _target: &str) -> CoreResult<ScanResult> {
            Err(CoreError::Scanner("connection refused".to_string()))
        }
    }

    fn check_invariant(record: &ScanRecord) {
        let terminal = record.status().is_terminal();
        assert_eq!(record.completed_at().is_some(), terminal);
        assert_eq!(record.results().is_some(), terminal);
    }

    #[test]
    fn test_record_transitions() {
        let mut record = ScanRecord::new(ScanType::WebApplication, "http://example.com", "7");
        assert_eq!(record.status(), ScanStatus::Pending);
        check_invariant(&record);

        // Cannot finish a scan that never started
        let err = record
            .complete(ScanResult::web("http://example.com", vec![]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        check_invariant(&record);

        record.mark_running().unwrap();
        assert_eq!(record.status(), ScanStatus::Running);
        check_invariant(&record);

        record.complete(ScanResult::web("http://example.com", vec![])).unwrap();
        assert_eq!(record.status(), ScanStatus::Completed);
        check_invariant(&record);
        let completed_at = record.completed_at();

        // Terminal states are final
        assert!(record.fail("late".to_string()).is_err());
        assert!(record.mark_running().is_err());
        assert_eq!(record.completed_at(), completed_at);
        assert_eq!(record.status(), ScanStatus::Completed);
    }

    #[test]
    fn test_access_control() {
        let record = ScanRecord::new(ScanType::WebApplication, "http://example.com", "alice");
        assert!(record.readable_by(&Principal::user("alice")));
        assert!(!record.readable_by(&Principal::user("bob")));
        assert!(record.readable_by(&Principal::admin("root")));
    }

    #[test]
    fn test_stored_scan_rejects_inconsistent_rows() {
        let stored = StoredScan {
            id: Uuid::new_v4(),
            scan_type: ScanType::InfrastructureAsCode,
            target: "main.tf".to_string(),
            status: ScanStatus::Running,
            results: Some(ScanPayload::Error { error: "x".to_string() }),
            created_at: Utc::now(),
            completed_at: None,
            owner_id: "1".to_string(),
        };
        assert!(ScanRecord::try_from(stored.clone()).is_err());

        let stored = StoredScan { results: None, ..stored };
        let record = ScanRecord::try_from(stored).unwrap();
        assert_eq!(record.status(), ScanStatus::Running);
    }

    #[test]
    fn test_deserialize_checks_completion() {
        let mut record = ScanRecord::new(ScanType::WebApplication, "http://example.com", "7");
        record.mark_running().unwrap();
        record.complete(ScanResult::web("http://example.com", vec![])).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        let back: ScanRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut forged = json;
        forged["completed_at"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<ScanRecord>(forged).is_err());
    }

    #[tokio::test]
    async fn test_run_completes_and_persists() {
        let store = Arc::new(MemoryScanStore::new());
        let mut manager = ScanManager::new(store.clone());
        manager.register(Box::new(WasScanner::with_rng(StdRng::seed_from_u64(8))));

        let record = manager
            .run(ScanType::WebApplication, "http://example.com", "alice")
            .await
            .unwrap();

        assert_eq!(record.status(), ScanStatus::Completed);
        check_invariant(&record);

        let loaded = manager.load(record.id()).await.unwrap();
        assert_eq!(loaded, record);

        let result = loaded.results().and_then(ScanPayload::as_result).unwrap();
        assert!(matches!(&result.items, ScanItems::Findings(f) if !f.is_empty()));
    }

    #[tokio::test]
    async fn test_start_persists_running_record() {
        let store = Arc::new(MemoryScanStore::new());
        let manager = ScanManager::new(store.clone());

        let record = manager
            .start(ScanType::InfrastructureAsCode, "main.tf", "alice")
            .await
            .unwrap();

        let loaded = manager.load(record.id()).await.unwrap();
        assert_eq!(loaded.status(), ScanStatus::Running);
        assert!(loaded.completed_at().is_none());
        assert!(loaded.results().is_none());
    }

    #[tokio::test]
    async fn test_scanner_error_marks_failed() {
        let store = Arc::new(MemoryScanStore::new());
        let mut manager = ScanManager::new(store);
        manager.register(Box::new(BrokenScanner));

        let record = manager
            .run(ScanType::WebApplication, "http://example.com", "alice")
            .await
            .unwrap();

        assert_eq!(record.status(), ScanStatus::Failed);
        check_invariant(&record);
        assert_eq!(record.error(), Some("Scanner error: connection refused"));

        let loaded = manager.load(record.id()).await.unwrap();
        assert_eq!(loaded.status(), ScanStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_scanner_marks_failed() {
        let manager = ScanManager::new(Arc::new(MemoryScanStore::new()));

        let record = manager
            .run(ScanType::InfrastructureAsCode, "main.tf", "alice")
            .await
            .unwrap();

        assert_eq!(record.status(), ScanStatus::Failed);
        assert!(record.error().unwrap().contains("no scanner registered for iac"));
    }

    #[tokio::test]
    async fn test_load_unknown_scan() {
        let manager = ScanManager::new(Arc::new(MemoryScanStore::new()));
        let id = Uuid::new_v4();
        assert!(matches!(manager.load(id).await, Err(CoreError::NotFound(x)) if x == id));
    }
}
