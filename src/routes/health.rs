use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::services::scheduler::JobCounts;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize, Deserialize)]
pub struct HealthChecks {
    pub model: ComponentHealth,
    pub worker: WorkerHealth,
}

#[derive(Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
}

#[derive(Serialize, Deserialize)]
pub struct WorkerHealth {
    pub running: bool,
    pub queue_depth: usize,
    pub jobs: JobCounts,
}

/// GET /health: model credentials and worker queue status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let model_configured = state.scheduler.extractor().model().is_configured();

    let worker = WorkerHealth {
        running: state.scheduler.is_running().await,
        queue_depth: state.scheduler.queue_depth().await,
        jobs: state.scheduler.counts().await,
    };

    let status_code = if model_configured {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if model_configured { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            model: ComponentHealth {
                status: if model_configured { "ok" } else { "missing_credentials" }.to_string(),
            },
            worker,
        },
    };

    (status_code, Json(response))
}
