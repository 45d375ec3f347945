use std::collections::HashSet;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::discovery::{DiscoveredAttribute, DiscoveryStats};
use crate::models::extraction::ExtractionOutput;
use crate::models::job::{ExtractionJob, JobStatus};
use crate::models::schema::AttributeFieldSpec;

/// Metadata portion of an extraction submission (the image travels separately).
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitExtraction {
    #[garde(length(min = 1, max = 100), custom(unique_field_keys), dive)]
    pub fields: Vec<AttributeFieldSpec>,

    #[garde(length(min = 1, max = 100))]
    pub model: Option<String>,

    #[garde(length(min = 1, max = 100))]
    pub category_id: Option<String>,

    #[serde(default)]
    #[garde(skip)]
    pub discover: bool,
}

/// Results are keyed by field key, so a schema may not repeat one.
fn unique_field_keys(fields: &[AttributeFieldSpec], _ctx: &()) -> garde::Result {
    let mut seen = HashSet::new();
    match fields.iter().find(|f| !seen.insert(f.key.as_str())) {
        Some(duplicate) => Err(garde::Error::new(format!(
            "duplicate field key '{}'",
            duplicate.key
        ))),
        None => Ok(()),
    }
}

/// Response after submitting an image for extraction.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<ExtractionOutput>,
    pub error: Option<String>,
}

impl From<ExtractionJob> for JobStatusResponse {
    fn from(job: ExtractionJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            model_id: job.input.model_id.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            result: job.result,
            error: job.error,
        }
    }
}

/// Query string of the discovery listing.
#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryQuery {
    pub category_id: Option<String>,
    #[serde(default)]
    pub promotable_only: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveryListResponse {
    pub discoveries: Vec<DiscoveredAttribute>,
    pub stats: DiscoveryStats,
}

/// Body of a promotion request.
#[derive(Debug, Default, Deserialize)]
pub struct PromoteRequest {
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
