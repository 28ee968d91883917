//! Database row types

use chrono::{DateTime, Utc};
use ct_core::{CoreError, CoreResult, ScanPayload, ScanRecord, ScanStatus, ScanType, StoredScan};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of the `scans` table
#[derive(Debug, FromRow)]
pub struct ScanRow {
    pub id: Uuid,
    pub scan_type: String,
    pub target: String,
    pub status: String,
    pub results: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub owner_id: String,
}

impl TryFrom<ScanRow> for ScanRecord {
    type Error = CoreError;

    fn try_from(row: ScanRow) -> CoreResult<Self> {
        let scan_type = parse_scan_type(&row.scan_type)?;
        let status = parse_status(&row.status)?;
        let results = row
            .results
            .map(serde_json::from_value::<ScanPayload>)
            .transpose()?;

        ScanRecord::try_from(StoredScan {
            id: row.id,
            scan_type,
            target: row.target,
            status,
            results,
            created_at: row.created_at,
            completed_at: row.completed_at,
            owner_id: row.owner_id,
        })
    }
}

pub fn parse_scan_type(code: &str) -> CoreResult<ScanType> {
    ScanType::from_code(code).ok_or_else(|| CoreError::Store(format!("unknown scan type '{}'", code)))
}

pub fn parse_status(status: &str) -> CoreResult<ScanStatus> {
    ScanStatus::parse(status).ok_or_else(|| CoreError::Store(format!("unknown status '{}'", status)))
}
