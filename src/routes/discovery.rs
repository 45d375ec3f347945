use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::{DiscoveryListResponse, DiscoveryQuery, PromoteRequest};
use crate::models::discovery::SchemaFieldDraft;
use crate::routes::{api_error, ApiError};
use crate::services::discovery::DiscoveryError;

/// GET /api/v1/discoveries: Ranked discoveries with aggregate stats.
pub async fn list_discoveries(
    State(state): State<AppState>,
    Query(query): Query<DiscoveryQuery>,
) -> Json<DiscoveryListResponse> {
    let category = query.category_id.as_deref();
    let mut discoveries = state.discoveries.list(category).await;
    if query.promotable_only {
        discoveries.retain(|d| d.is_promotable);
    }
    let stats = state.discoveries.stats(category).await;

    Json(DiscoveryListResponse { discoveries, stats })
}

/// POST /api/v1/discoveries/{key}/promote: Draft a schema field from a discovery.
///
/// The discovery stays in the store; callers remove it from their pending
/// view once the field has actually been created.
pub async fn promote_discovery(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(request): Query<PromoteRequest>,
) -> Result<Json<SchemaFieldDraft>, ApiError> {
    if let Some(category) = request.category_id.as_deref() {
        let in_category = state
            .discoveries
            .list(Some(category))
            .await
            .iter()
            .any(|d| d.key == key);
        if !in_category {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                format!("Discovery '{}' not found in category '{}'", key, category),
            ));
        }
    }

    match state.discoveries.promote(&key).await {
        Ok(draft) => {
            tracing::info!(key = %draft.key, field_type = %draft.field_type, "Discovery promoted to draft field");
            Ok(Json(draft))
        }
        Err(e @ DiscoveryError::NotFound(_)) => Err(api_error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ DiscoveryError::NotPromotable { .. }) => {
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}

/// DELETE /api/v1/discoveries: Administrative reset.
pub async fn clear_discoveries(State(state): State<AppState>) -> StatusCode {
    state.discoveries.clear().await;
    tracing::warn!("Discovery store cleared");
    StatusCode::NO_CONTENT
}
