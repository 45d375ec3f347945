use std::sync::Mutex;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::job::JobStatus;

/// Emitted once for every job that reaches a terminal state.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub job_id: Uuid,
    pub category_id: Option<String>,
    pub status: JobStatus,
    pub processing_time_ms: u64,
    pub tokens_used: u32,
    pub model_id: String,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Destination for extraction analytics. Storage is up to the implementor.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent);
}

/// Default sink: one structured log line plus Prometheus counters.
#[derive(Debug, Default)]
pub struct MetricsAnalyticsSink;

impl AnalyticsSink for MetricsAnalyticsSink {
    fn record(&self, event: AnalyticsEvent) {
        let status = event.status.to_string();

        metrics::counter!("extraction_tokens_total", "model" => event.model_id.clone())
            .increment(u64::from(event.tokens_used));
        metrics::counter!("extraction_cost_microusd_total", "model" => event.model_id.clone())
            .increment((event.cost * 1_000_000.0).round() as u64);
        metrics::histogram!("extraction_processing_seconds", "status" => status.clone())
            .record(event.processing_time_ms as f64 / 1000.0);

        info!(
            job_id = %event.job_id,
            category_id = event.category_id.as_deref().unwrap_or("-"),
            status = %status,
            model_id = %event.model_id,
            processing_time_ms = event.processing_time_ms,
            tokens_used = event.tokens_used,
            cost = event.cost,
            error = event.error_message.as_deref().unwrap_or(""),
            "Extraction finished"
        );
    }
}

/// Keeps events in memory. Useful for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryAnalyticsSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalyticsSink {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AnalyticsSink for MemoryAnalyticsSink {
    fn record(&self, event: AnalyticsEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
