use crate::AppState;
use crate::api::error::AppError;
use crate::config::StorageFailureMode;
use crate::services::download_service::DownloadError;
use crate::utils::validation::is_blank;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Link to the video whose audio should be extracted
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadResponse {
    /// Signed, time-limited download link; null when storage failed in lenient mode
    pub aws_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Audio stored; signed link returned", body = DownloadResponse),
        (status = 400, description = "Missing or malformed request body"),
        (status = 500, description = "Audio extraction failed"),
        (status = 502, description = "Storage failed (strict mode only)")
    ),
    tag = "download"
)]
pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if is_blank(&req.url) {
        return Err(AppError::BadRequest("Missing url".to_string()));
    }

    match state.download_service.process(&req.url).await {
        Ok(result) => Ok(Json(DownloadResponse {
            aws_url: Some(result.signed_url),
        })),
        Err(DownloadError::Storage(e))
            if state.config.storage_failure_mode == StorageFailureMode::Lenient =>
        {
            tracing::warn!("Returning null link after storage failure: {}", e);
            Ok(Json(DownloadResponse { aws_url: None }))
        }
        Err(e) => Err(e.into()),
    }
}
