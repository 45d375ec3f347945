use std::sync::Arc;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use attribute_extractor::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        analytics::MetricsAnalyticsSink, discovery::DiscoveryAggregator, extractor::Extractor,
        scheduler::JobScheduler, vision::OpenAiVisionClient,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing attribute-extractor server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_histogram!(
        "extraction_processing_seconds",
        "Time spent on model call and validation per job"
    );
    metrics::describe_counter!("extraction_jobs_total", "Total extraction jobs submitted");
    metrics::describe_counter!("extraction_jobs_completed", "Total extraction jobs completed");
    metrics::describe_counter!("extraction_jobs_failed", "Total extraction jobs that failed");
    metrics::describe_gauge!(
        "extraction_queue_depth",
        "Current number of pending jobs in the queue"
    );
    metrics::describe_counter!("extraction_tokens_total", "Model tokens consumed");
    metrics::describe_counter!(
        "extraction_cost_microusd_total",
        "Estimated model spend in millionths of a USD"
    );
    metrics::describe_counter!(
        "discovery_observations_total",
        "Out-of-schema attribute observations ingested"
    );

    // Initialize vision model client
    tracing::info!(base_url = %config.ai_base_url, "Initializing vision model client");
    let vision = OpenAiVisionClient::new(
        config.ai_base_url.clone(),
        config.ai_api_key.clone(),
        config.request_timeout(),
    )
    .expect("Failed to initialize vision model client")
    .with_retry_policy(config.retry_policy());

    if config.ai_api_key.is_none() {
        tracing::warn!("AI_API_KEY is not set; extraction jobs will fail until it is configured");
    }

    // Shared stores, built once and passed down explicitly
    let discoveries = Arc::new(DiscoveryAggregator::new());
    let extractor = Arc::new(Extractor::new(
        Arc::new(vision),
        discoveries.clone(),
        Arc::new(MetricsAnalyticsSink),
    ));
    let scheduler = JobScheduler::new(extractor);

    let state = AppState::new(scheduler.clone(), discoveries, &config.default_model);

    let app = routes::router(state, config.max_upload_bytes)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Let the in-flight job finish; queued jobs beyond the deadline are dropped.
    let drain = config.shutdown_drain();
    tracing::info!(drain_secs = drain.as_secs(), "Draining extraction queue");
    if tokio::time::timeout(drain, scheduler.wait_idle()).await.is_err() {
        tracing::warn!(
            queue_depth = scheduler.queue_depth().await,
            "Shutdown drain timed out; abandoning remaining jobs"
        );
    }

    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
