use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::{JobStatusResponse, SubmitExtraction, SubmitResponse};
use crate::models::job::{ExtractionInput, JobStatus};
use crate::models::schema::AttributeFieldSpec;
use crate::routes::{api_error, ApiError};

/// POST /api/v1/extractions: Upload an image with its category schema.
///
/// Multipart parts: `image` (file), `fields` (JSON array of field specs),
/// and optional `model`, `category_id`, `discover`.
pub async fn submit_extraction(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mut image: Option<Vec<u8>> = None;
    let mut fields: Option<Vec<AttributeFieldSpec>> = None;
    let mut model = None;
    let mut category_id = None;
    let mut discover = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                image = Some(data.to_vec());
            }
            "fields" => {
                let text = read_text(field).await?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Invalid field specs: {}", e))
                })?;
                fields = Some(parsed);
            }
            "model" => model = Some(read_text(field).await?),
            "category_id" => category_id = Some(read_text(field).await?),
            "discover" => {
                let text = read_text(field).await?;
                discover = matches!(text.trim(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'image' part"))?;
    let submission = SubmitExtraction {
        fields: fields.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'fields' part"))?,
        model,
        category_id,
        discover,
    };
    submission
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let format = image::guess_format(&image)
        .map_err(|_| api_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unrecognized image format"))?;

    let input = ExtractionInput {
        image,
        mime_type: format.to_mime_type().to_string(),
        category_id: submission.category_id,
        fields: submission.fields,
        model_id: submission
            .model
            .unwrap_or_else(|| state.default_model.to_string()),
        discover: submission.discover,
    };

    let job_id = state.scheduler.submit(input).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Pending,
            message: "Image queued for attribute extraction".to_string(),
        }),
    ))
}

/// GET /api/v1/extractions/{job_id}: Check extraction job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    state
        .scheduler
        .get(job_id)
        .await
        .map(|job| Json(job.into()))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Job {} not found", job_id)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}
