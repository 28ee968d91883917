//! PostgreSQL scan store

pub mod schema;

use async_trait::async_trait;
use ct_core::{CoreError, CoreResult, ScanRecord, ScanStats, ScanStore};
use schema::{parse_scan_type, parse_status, ScanRow};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

const SELECT_SCANS: &str = "SELECT id, scan_type, target, status, results, created_at, completed_at, owner_id FROM scans";

fn store_error(err: sqlx::Error) -> CoreError {
    CoreError::Store(err.to_string())
}

pub struct PgScanStore {
    pool: PgPool,
}

impl PgScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> CoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_error)?;
        info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| CoreError::Store(e.to_string()))?;
        info!("Database migrations complete");

        Ok(Self::new(pool))
    }
}

fn results_json(record: &ScanRecord) -> CoreResult<Option<serde_json::Value>> {
    Ok(record.results().map(serde_json::to_value).transpose()?)
}

#[async_trait]
impl ScanStore for PgScanStore {
    async fn insert(&self, record: &ScanRecord) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO scans (id, scan_type, target, status, results, created_at, completed_at, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id())
        .bind(record.scan_type().code())
        .bind(record.target())
        .bind(record.status().as_str())
        .bind(results_json(record)?)
        .bind(record.created_at())
        .bind(record.completed_at())
        .bind(record.owner_id())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn update(&self, record: &ScanRecord) -> CoreResult<()> {
        let done = sqlx::query(
            "UPDATE scans SET status = $2, results = $3, completed_at = $4 WHERE id = $1",
        )
        .bind(record.id())
        .bind(record.status().as_str())
        .bind(results_json(record)?)
        .bind(record.completed_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if done.rows_affected() == 0 {
            return Err(CoreError::NotFound(record.id()));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<ScanRecord>> {
        let row = sqlx::query_as::<_, ScanRow>(&format!("{} WHERE id = $1", SELECT_SCANS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(ScanRecord::try_from).transpose()
    }

    async fn list_for_owner(&self, owner_id: &str, limit: usize) -> CoreResult<Vec<ScanRecord>> {
        let rows = sqlx::query_as::<_, ScanRow>(&format!(
            "{} WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
            SELECT_SCANS
        ))
        .bind(owner_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(ScanRecord::try_from).collect()
    }

    async fn stats(&self) -> CoreResult<ScanStats> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT status, scan_type, COUNT(*) FROM scans GROUP BY status, scan_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut stats = ScanStats::default();
        for (status, scan_type, count) in rows {
            stats.add(
                parse_status(&status)?,
                parse_scan_type(&scan_type)?,
                count.max(0) as u64,
            );
        }
        Ok(stats)
    }
}
