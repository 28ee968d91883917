//! Scan routes

use super::load_scan;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use ct_core::{ScanPayload, ScanRecord, ScanStatus, ScanStore, ScanType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Number of scans returned by the listing
const RECENT_SCANS: usize = 20;

#[derive(Deserialize)]
pub struct WasScanRequest {
    #[serde(default)]
    pub target_url: Option<String>,
}

#[derive(Deserialize)]
pub struct IacScanRequest {
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub results: Option<ScanPayload>,
}

#[derive(Serialize)]
pub struct ScanStatusResponse {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub target: String,
    pub scan_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ScanPayload>,
}

impl From<&ScanRecord> for ScanStatusResponse {
    fn from(record: &ScanRecord) -> Self {
        Self {
            scan_id: record.id(),
            status: record.status(),
            created_at: record.created_at(),
            target: record.target().to_string(),
            scan_type: record.scan_type().code(),
            completed_at: record.completed_at(),
            results: record.results().cloned(),
        }
    }
}

#[derive(Serialize)]
pub struct ScanListItem {
    pub scan_id: Uuid,
    pub scan_type: &'static str,
    pub target: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ScanListResponse {
    pub scans: Vec<ScanListItem>,
}

/// Pull a required, non-blank string out of a JSON body
fn required<T>(
    body: Result<Json<T>, JsonRejection>,
    field: impl FnOnce(T) -> Option<String>,
    message: &str,
) -> Result<String, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    field(body)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

async fn run_scan(
    state: &AppState,
    user: &CurrentUser,
    scan_type: ScanType,
    target: &str,
) -> Result<Json<ScanResponse>, ApiError> {
    let record = state.manager.run(scan_type, target, &user.0.id).await?;

    if record.status() == ScanStatus::Failed {
        let message = record.error().unwrap_or("Scan failed").to_string();
        return Err(ApiError::Internal(message));
    }

    Ok(Json(ScanResponse {
        scan_id: record.id(),
        status: record.status(),
        results: record.results().cloned(),
    }))
}

pub async fn create_was_scan(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<WasScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let target_url = required(body, |b| b.target_url, "Target URL is required")?;
    run_scan(&state, &user, ScanType::WebApplication, &target_url).await
}

pub async fn create_iac_scan(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<IacScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let file_path = required(body, |b| b.file_path, "File path is required")?;
    run_scan(&state, &user, ScanType::InfrastructureAsCode, &file_path).await
}

pub async fn get_scan_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanStatusResponse>, ApiError> {
    let record = load_scan(&state, &user, id).await?;
    Ok(Json(ScanStatusResponse::from(&record)))
}

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ScanListResponse>, ApiError> {
    let records = state
        .manager
        .store()
        .list_for_owner(&user.0.id, RECENT_SCANS)
        .await?;

    let scans = records
        .iter()
        .map(|r| ScanListItem {
            scan_id: r.id(),
            scan_type: r.scan_type().code(),
            target: r.target().to_string(),
            status: r.status(),
            created_at: r.created_at(),
            completed_at: r.completed_at(),
        })
        .collect();

    Ok(Json(ScanListResponse { scans }))
}
