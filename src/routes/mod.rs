pub mod discovery;
pub mod extraction;
pub mod health;
pub mod metrics;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::app_state::AppState;
use crate::models::api::ErrorResponse;

/// JSON error body with a status code.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// API routes without the metrics endpoint.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/extractions", post(extraction::submit_extraction))
        .route("/api/v1/extractions/{job_id}", get(extraction::get_job_status))
        .route(
            "/api/v1/discoveries",
            get(discovery::list_discoveries).delete(discovery::clear_discoveries),
        )
        .route(
            "/api/v1/discoveries/{key}/promote",
            post(discovery::promote_discovery),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
