//! Report download routes

use super::load_scan;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use ct_core::report::{self, ReportFormat};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub async fn download_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, format)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let record = load_scan(&state, &user, id).await?;
    let format: ReportFormat = format.parse()?;
    let content = report::generate_report(&record, format)?;

    info!("Exported scan {} as {}", id, format.extension());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type());

    if format == ReportFormat::Pdf {
        response = response.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", format.file_name(id)),
        );
    }

    response
        .body(Body::from(content))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
