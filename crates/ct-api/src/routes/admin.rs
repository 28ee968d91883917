//! Admin routes

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{extract::State, Json};
use ct_core::{ScanStats, ScanStore};
use std::sync::Arc;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ScanStats>, ApiError> {
    if !user.0.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let stats = state.manager.store().stats().await?;
    Ok(Json(stats))
}
