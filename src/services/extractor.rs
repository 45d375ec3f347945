use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::extraction::{ExtractionOutput, ExtractionResult};
use crate::models::job::{ExtractionInput, JobStatus};
use crate::services::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::services::discovery::DiscoveryAggregator;
use crate::services::vision::{VisionModel, VisionRequest};
use crate::services::{pricing, prompt, validation};

/// Runs one extraction end to end: prompt, model call, validation, cost,
/// discovery bookkeeping and analytics.
pub struct Extractor {
    model: Arc<dyn VisionModel>,
    discoveries: Arc<DiscoveryAggregator>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl Extractor {
    pub fn new(
        model: Arc<dyn VisionModel>,
        discoveries: Arc<DiscoveryAggregator>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            model,
            discoveries,
            analytics,
        }
    }

    pub fn model(&self) -> &Arc<dyn VisionModel> {
        &self.model
    }

    /// Record the analytics event of a failed job and build its outcome.
    pub fn record_failure(
        &self,
        job_id: Uuid,
        input: &ExtractionInput,
        error: String,
        processing_time_ms: u64,
    ) -> ExtractionResult {
        self.analytics.record(AnalyticsEvent {
            job_id,
            category_id: input.category_id.clone(),
            status: JobStatus::Failed,
            processing_time_ms,
            tokens_used: 0,
            model_id: input.model_id.clone(),
            cost: 0.0,
            error_message: Some(error.clone()),
        });
        ExtractionResult::Failed { error }
    }

    /// Model invocation failures produce `Failed`; anything the model says is
    /// handled by the validator and produces `Completed`.
    pub async fn extract(&self, job_id: Uuid, input: &ExtractionInput) -> ExtractionResult {
        let start = Instant::now();
        let prompt = prompt::build_prompt(&input.fields, input.discover);

        debug!(
            job_id = %job_id,
            model_id = %input.model_id,
            fields = input.fields.len(),
            discover = input.discover,
            "Calling vision model"
        );

        let response = match self
            .model
            .analyze(VisionRequest {
                model_id: &input.model_id,
                prompt: &prompt,
                image: &input.image,
                mime_type: &input.mime_type,
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error = e.to_string();
                warn!(job_id = %job_id, model_id = %input.model_id, error = %error, "Vision model call failed");
                return self.record_failure(job_id, input, error, start.elapsed().as_millis() as u64);
            }
        };

        let outcome = validation::validate_response(&response.text, &input.fields);
        let cost = pricing::estimate_vision_cost(&input.model_id, &response.usage);
        let tokens_used = response.usage.total();

        if !outcome.discoveries.is_empty() {
            self.discoveries
                .observe(&outcome.discoveries, input.category_id.as_deref())
                .await;
        }

        let processing_time = start.elapsed().as_millis() as u64;

        info!(
            job_id = %job_id,
            model_id = %input.model_id,
            overall_confidence = outcome.overall_confidence,
            field_errors = outcome.errors.len(),
            discoveries = outcome.discoveries.len(),
            tokens_used,
            processing_time_ms = processing_time,
            "Extraction validated"
        );

        self.analytics.record(AnalyticsEvent {
            job_id,
            category_id: input.category_id.clone(),
            status: JobStatus::Completed,
            processing_time_ms: processing_time,
            tokens_used,
            model_id: input.model_id.clone(),
            cost,
            error_message: None,
        });

        ExtractionResult::Completed(ExtractionOutput {
            attributes: outcome.attributes,
            overall_confidence: outcome.overall_confidence,
            tokens_used,
            processing_time,
            cost,
            errors: outcome.errors,
            discoveries: outcome.discoveries,
        })
    }
}
