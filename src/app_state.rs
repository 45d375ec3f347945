use std::sync::Arc;

use crate::services::discovery::DiscoveryAggregator;
use crate::services::scheduler::JobScheduler;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: JobScheduler,
    pub discoveries: Arc<DiscoveryAggregator>,
    /// Model used when a submission does not name one.
    pub default_model: Arc<str>,
}

impl AppState {
    pub fn new(
        scheduler: JobScheduler,
        discoveries: Arc<DiscoveryAggregator>,
        default_model: &str,
    ) -> Self {
        Self {
            scheduler,
            discoveries,
            default_model: Arc::from(default_model),
        }
    }
}
