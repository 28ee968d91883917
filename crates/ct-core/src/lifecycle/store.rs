//! Scan record persistence

use super::{ScanRecord, ScanStatus};
use crate::{CoreError, CoreResult, ScanType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Record counts by status and type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub was: u64,
    pub iac: u64,
}

impl ScanStats {
    /// Add `count` records with the given status and type
    pub fn add(&mut self, status: ScanStatus, scan_type: ScanType, count: u64) {
        self.total += count;
        match status {
            ScanStatus::Pending => self.pending += count,
            ScanStatus::Running => self.running += count,
            ScanStatus::Completed => self.completed += count,
            ScanStatus::Failed => self.failed += count,
        }
        match scan_type {
            ScanType::WebApplication => self.was += count,
            ScanType::InfrastructureAsCode => self.iac += count,
        }
    }
}

/// Storage for scan records
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist a new record
    async fn insert(&self, record: &ScanRecord) -> CoreResult<()>;

    /// Overwrite an existing record; `NotFound` if it was never inserted
    async fn update(&self, record: &ScanRecord) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<ScanRecord>>;

    /// Most recent records of one owner, newest first
    async fn list_for_owner(&self, owner_id: &str, limit: usize) -> CoreResult<Vec<ScanRecord>>;

    async fn stats(&self) -> CoreResult<ScanStats>;
}

/// In-process store used by the CLI and tests
#[derive(Default)]
pub struct MemoryScanStore {
    records: RwLock<HashMap<Uuid, ScanRecord>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn insert(&self, record: &ScanRecord) -> CoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id()) {
            return Err(CoreError::Store(format!("scan {} already exists", record.id())));
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &ScanRecord) -> CoreResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(record.id())),
        }
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<ScanRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn list_for_owner(&self, owner_id: &str, limit: usize) -> CoreResult<Vec<ScanRecord>> {
        let records = self.records.read().await;
        let mut owned: Vec<ScanRecord> = records
            .values()
            .filter(|r| r.owner_id() == owner_id)
            .cloned()
            .collect();

        owned.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn stats(&self) -> CoreResult<ScanStats> {
        let records = self.records.read().await;
        let mut stats = ScanStats::default();
        for record in records.values() {
            stats.add(record.status(), record.scan_type(), 1);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = MemoryScanStore::new();
        let mut record = ScanRecord::new(ScanType::WebApplication, "http://example.com", "alice");

        store.insert(&record).await.unwrap();
        assert!(store.insert(&record).await.is_err());
        assert_eq!(store.get(record.id()).await.unwrap(), Some(record.clone()));

        record.mark_running().unwrap();
        store.update(&record).await.unwrap();
        let loaded = store.get(record.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), ScanStatus::Running);
    }

    #[tokio::test]
    async fn test_update_unknown_record() {
        let store = MemoryScanStore::new();
        let record = ScanRecord::new(ScanType::InfrastructureAsCode, "main.tf", "alice");
        assert!(matches!(
            store.update(&record).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_owner() {
        let store = MemoryScanStore::new();
        for i in 0..3 {
            let record = ScanRecord::new(ScanType::WebApplication, &format!("http://{i}.example.com"), "alice");
            store.insert(&record).await.unwrap();
        }
        let other = ScanRecord::new(ScanType::WebApplication, "http://example.org", "bob");
        store.insert(&other).await.unwrap();

        let mine = store.list_for_owner("alice", 2).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.owner_id() == "alice"));
        assert!(mine[0].created_at() >= mine[1].created_at());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryScanStore::new();
        let mut running = ScanRecord::new(ScanType::InfrastructureAsCode, "main.tf", "alice");
        running.mark_running().unwrap();
        store.insert(&running).await.unwrap();
        store
            .insert(&ScanRecord::new(ScanType::WebApplication, "http://example.com", "bob"))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.iac, 1);
        assert_eq!(stats.was, 1);
    }
}
