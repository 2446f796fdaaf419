use crate::AppState;
use crate::infrastructure::extractor::locate_binary;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub extractor: String,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let extractor_status = if locate_binary(&state.config.extractor.ytdlp_bin).is_some() {
        "available"
    } else {
        "missing"
    };

    let storage_status = match state.storage.check_bucket().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check: {}", e);
            "unreachable"
        }
    };

    let status = if extractor_status == "available" && storage_status == "connected" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        extractor: extractor_status.to_string(),
        storage: storage_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
