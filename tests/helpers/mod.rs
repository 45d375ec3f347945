//! Test helper utilities shared by the integration suites

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::sleep;
use uuid::Uuid;

use attribute_extractor::app_state::AppState;
use attribute_extractor::models::api::JobStatusResponse;
use attribute_extractor::models::job::{ExtractionInput, JobStatus};
use attribute_extractor::models::schema::AttributeFieldSpec;
use attribute_extractor::models::extraction::TokenUsage;
use attribute_extractor::routes;
use attribute_extractor::services::analytics::{AnalyticsSink, MemoryAnalyticsSink};
use attribute_extractor::services::discovery::DiscoveryAggregator;
use attribute_extractor::services::extractor::Extractor;
use attribute_extractor::services::scheduler::JobScheduler;
use attribute_extractor::services::vision::{
    ModelResponse, VisionError, VisionModel, VisionRequest,
};

/// Smallest byte prefix `image::guess_format` recognizes as PNG.
pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One scripted answer of the fake model.
pub enum Scripted {
    Reply(String, TokenUsage),
    Fail(fn() -> VisionError),
    Panic,
}

impl Scripted {
    pub fn reply(text: impl Into<String>) -> Self {
        Scripted::Reply(
            text.into(),
            TokenUsage {
                input_tokens: Some(1000),
                output_tokens: Some(200),
                total_tokens: Some(1200),
            },
        )
    }
}

/// Vision model double that answers from a script and records call order.
///
/// Each call is identified by the image bytes it received. When the script
/// runs dry the model answers with an empty JSON object.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<(Duration, Scripted)>>,
    calls: Mutex<Vec<Vec<u8>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, response: Scripted) -> Self {
        self.push_delayed(Duration::ZERO, response)
    }

    pub fn push_delayed(self, delay: Duration, response: Scripted) -> Self {
        self.script.lock().unwrap().push_back((delay, response));
        self
    }

    pub fn calls(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn analyze(&self, request: VisionRequest<'_>) -> Result<ModelResponse, VisionError> {
        self.calls.lock().unwrap().push(request.image.to_vec());
        self.prompts.lock().unwrap().push(request.prompt.to_string());

        let next = self.script.lock().unwrap().pop_front();
        let Some((delay, scripted)) = next else {
            return Ok(ModelResponse {
                text: "{}".to_string(),
                usage: TokenUsage::default(),
            });
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }

        match scripted {
            Scripted::Reply(text, usage) => Ok(ModelResponse { text, usage }),
            Scripted::Fail(make) => Err(make()),
            Scripted::Panic => panic!("scripted model panic"),
        }
    }
}

/// Wired-up services around a scripted model.
pub struct TestServices {
    pub model: Arc<ScriptedModel>,
    pub discoveries: Arc<DiscoveryAggregator>,
    pub analytics: Arc<MemoryAnalyticsSink>,
    pub extractor: Arc<Extractor>,
    pub scheduler: JobScheduler,
}

pub fn build_services(model: ScriptedModel) -> TestServices {
    let model = Arc::new(model);
    let discoveries = Arc::new(DiscoveryAggregator::new());
    let analytics = Arc::new(MemoryAnalyticsSink::default());
    let extractor = Arc::new(Extractor::new(
        model.clone() as Arc<dyn VisionModel>,
        discoveries.clone(),
        analytics.clone() as Arc<dyn AnalyticsSink>,
    ));
    let scheduler = JobScheduler::new(extractor.clone());

    TestServices {
        model,
        discoveries,
        analytics,
        extractor,
        scheduler,
    }
}

/// Extraction input whose image is tagged with `marker` so calls can be told apart.
pub fn input_with_marker(marker: u8, fields: Vec<AttributeFieldSpec>) -> ExtractionInput {
    let mut image = PNG_MAGIC.to_vec();
    image.push(marker);
    ExtractionInput {
        image,
        mime_type: "image/png".to_string(),
        category_id: None,
        fields,
        model_id: "gpt-4o-mini".to_string(),
        discover: false,
    }
}

/// Wait until the job reaches a terminal state.
pub async fn wait_for_terminal(scheduler: &JobScheduler, job_id: Uuid, timeout_secs: u64) -> JobStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        if let Some(job) = scheduler.get(job_id).await {
            if job.status.is_terminal() {
                return job.status;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("Job {} did not finish within {} seconds", job_id, timeout_secs);
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Serve the API router on an ephemeral port and return its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    let app = routes::router(state, 1024 * 1024);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    format!("http://{}", addr)
}

/// Poll job status over HTTP until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 20; // Poll every 50ms

    for _ in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/extractions/{}", base_url, job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;
        if status_response.status.is_terminal() {
            return Ok(status_response);
        }
        sleep(Duration::from_millis(50)).await;
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}
