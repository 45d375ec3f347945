use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::extraction::{ExtractionOutput, ExtractionResult};
use crate::models::schema::AttributeFieldSpec;

/// Status of an extraction job in the in-process queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Only forward moves are legal: pending -> processing -> completed | failed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// Everything the worker needs to run one extraction.
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub category_id: Option<String>,
    pub fields: Vec<AttributeFieldSpec>,
    pub model_id: String,
    /// Ask the model for attributes outside the schema.
    pub discover: bool,
}

/// An attribute extraction job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionJob {
    pub id: Uuid,
    pub status: JobStatus,
    #[serde(skip)]
    pub input: Arc<ExtractionInput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<ExtractionOutput>,
    pub error: Option<String>,
}

impl ExtractionJob {
    pub fn new(input: ExtractionInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            input: Arc::new(input),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    /// Move to `next`, returning false (and leaving the job untouched) for illegal moves.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Record a terminal outcome. Requires the job to be processing.
    pub fn finish(&mut self, outcome: ExtractionResult) -> bool {
        match outcome {
            ExtractionResult::Completed(output) => {
                if !self.transition(JobStatus::Completed) {
                    return false;
                }
                self.result = Some(output);
            }
            ExtractionResult::Failed { error } => {
                if !self.transition(JobStatus::Failed) {
                    return false;
                }
                self.error = Some(error);
            }
        }
        true
    }
}
