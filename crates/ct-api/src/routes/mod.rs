//! API routes

pub mod admin;
pub mod reports;
pub mod scans;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;
use axum::Json;
use ct_core::ScanRecord;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Load a scan the caller is allowed to read
pub(crate) async fn load_scan(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<ScanRecord, ApiError> {
    let record = state.manager.load(id).await?;
    user.authorize(&record)?;
    Ok(record)
}
