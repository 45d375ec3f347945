//! In-process extraction queue with a single worker loop.
//!
//! Jobs run strictly one at a time in submission order. The loop is started
//! on demand by `submit` and exits when the queue drains; the `running` flag
//! is flipped under the same lock as the queue, so a submit can never be
//! stranded between an empty check and loop exit.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::job::{ExtractionInput, ExtractionJob, JobStatus};
use crate::services::extractor::Extractor;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Status change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Number of known jobs per status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<Uuid>,
    jobs: HashMap<Uuid, ExtractionJob>,
    running: bool,
}

struct Inner {
    state: Mutex<SchedulerState>,
    extractor: Arc<Extractor>,
    events: broadcast::Sender<JobEvent>,
    idle: Notify,
}

/// Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState::default()),
                extractor,
                events,
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue an extraction and return its id without waiting for it to run.
    pub async fn submit(&self, input: ExtractionInput) -> Uuid {
        let job = ExtractionJob::new(input);
        let job_id = job.id;

        let start_worker = {
            let mut state = self.inner.state.lock().await;
            state.jobs.insert(job_id, job);
            state.queue.push_back(job_id);
            self.inner.emit(job_id, JobStatus::Pending);
            metrics::gauge!("extraction_queue_depth").set(state.queue.len() as f64);

            let start = !state.running;
            state.running = true;
            start
        };

        metrics::counter!("extraction_jobs_total").increment(1);
        info!(job_id = %job_id, "Extraction job queued");

        if start_worker {
            let inner = self.inner.clone();
            tokio::spawn(inner.run());
        }

        job_id
    }

    pub async fn get(&self, job_id: Uuid) -> Option<ExtractionJob> {
        self.inner.state.lock().await.jobs.get(&job_id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub async fn queue_depth(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn counts(&self) -> JobCounts {
        let state = self.inner.state.lock().await;
        let mut counts = JobCounts::default();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    /// Resolve once no worker loop is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.inner.state.lock().await.running {
                return;
            }
            notified.await;
        }
    }

    pub fn extractor(&self) -> &Arc<Extractor> {
        &self.inner.extractor
    }
}

impl Inner {
    fn emit(&self, job_id: Uuid, status: JobStatus) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent { job_id, status });
    }

    async fn run(self: Arc<Self>) {
        info!("Extraction worker started");

        loop {
            let (job_id, input) = {
                let mut state = self.state.lock().await;
                let Some(job_id) = state.queue.pop_front() else {
                    state.running = false;
                    self.idle.notify_waiters();
                    break;
                };
                metrics::gauge!("extraction_queue_depth").set(state.queue.len() as f64);

                let Some(job) = state.jobs.get_mut(&job_id) else {
                    warn!(job_id = %job_id, "Queued job missing from store, skipping");
                    continue;
                };
                if !job.transition(JobStatus::Processing) {
                    warn!(job_id = %job_id, status = %job.status, "Queued job not pending, skipping");
                    continue;
                }
                self.emit(job_id, JobStatus::Processing);
                (job_id, job.input.clone())
            };

            info!(job_id = %job_id, model_id = %input.model_id, "Processing extraction job");

            // Run on its own task so a panic fails the job instead of the loop.
            let started = Instant::now();
            let extractor = self.extractor.clone();
            let task_input = input.clone();
            let outcome = match tokio::spawn(async move { extractor.extract(job_id, &task_input).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Extraction task aborted");
                    self.extractor.record_failure(
                        job_id,
                        &input,
                        format!("Extraction task aborted: {}", e),
                        started.elapsed().as_millis() as u64,
                    )
                }
            };

            let mut state = self.state.lock().await;
            let Some(job) = state.jobs.get_mut(&job_id) else {
                continue;
            };
            if job.finish(outcome) {
                let status = job.status;
                self.emit(job_id, status);
                match status {
                    JobStatus::Completed => {
                        metrics::counter!("extraction_jobs_completed").increment(1);
                        info!(job_id = %job_id, "Extraction job completed");
                    }
                    _ => {
                        metrics::counter!("extraction_jobs_failed").increment(1);
                        warn!(job_id = %job_id, error = job.error.as_deref().unwrap_or(""), "Extraction job failed");
                    }
                }
            } else {
                error!(job_id = %job_id, status = %job.status, "Illegal terminal transition ignored");
            }
        }

        info!("Extraction worker idle");
    }
}
