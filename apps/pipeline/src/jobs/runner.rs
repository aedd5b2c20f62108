//! Queue Runner — drains named queues and dispatches jobs to registered
//! handlers.
//!
//! At most one drain loop runs per queue name per process, guarded by an
//! in-memory marker set. This is process-local mutual exclusion only:
//! running several worker processes against the same queue needs an
//! external lease, which this crate does not provide. Delivery is
//! at-least-once; handlers must be safe to fail without corrupting shared
//! state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::errors::{truncate_message, PipelineError};
use crate::jobs::store::JobStore;
use crate::jobs::types::{Job, JobResult, JobStatus};

/// Blocking-pop bound; a miss just re-arms the loop.
const POP_TIMEOUT: Duration = Duration::from_secs(1);
/// Delay between iterations, hit or miss.
const IDLE_DELAY: Duration = Duration::from_millis(100);
/// Backoff after an unexpected iteration error (storage down, etc.). This
/// loop-level retry is the only automatic retry at the job level.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
/// Upper bound on error text recorded in a failed job's status.
const MAX_ERROR_CHARS: usize = 500;

/// A registered job handler for one queue name. The handler persists its
/// own result via the store; the runner owns the status transitions.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(
        &self,
        job: &Job,
        store: Arc<dyn JobStore>,
    ) -> Result<JobResult, PipelineError>;
}

/// Explicitly constructed queue service: store connection plus handler
/// registry, no process-wide globals.
pub struct QueueService {
    store: Arc<dyn JobStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    active: Mutex<HashSet<String>>,
}

impl QueueService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Registers the handler for a queue name. Call before wrapping the
    /// service in an `Arc` and starting workers.
    pub fn register(&mut self, queue: &str, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(queue.to_string(), handler);
    }

    /// Enqueues a job and wakes the runner for that queue if it is idle.
    pub async fn enqueue(
        self: &Arc<Self>,
        queue: &str,
        payload: Value,
    ) -> Result<String, PipelineError> {
        let id = self.store.enqueue(queue, payload).await?;
        self.ensure_running(queue);
        Ok(id)
    }

    /// Starts the drain loop for `queue` unless one is already running in
    /// this process. Racing callers are deduplicated by the marker set.
    pub fn ensure_running(self: &Arc<Self>, queue: &str) {
        let Some(handler) = self.handlers.get(queue).cloned() else {
            warn!(queue, "no handler registered for queue");
            return;
        };
        {
            let mut active = self.active.lock().unwrap();
            if !active.insert(queue.to_string()) {
                return; // already draining
            }
        }
        let service = Arc::clone(self);
        let queue = queue.to_string();
        tokio::spawn(async move {
            info!(queue, "queue runner started");
            service.run_queue(&queue, handler).await;
        });
    }

    async fn run_queue(self: Arc<Self>, queue: &str, handler: Arc<dyn JobHandler>) {
        loop {
            match self.process_next(queue, handler.as_ref()).await {
                Ok(_) => tokio::time::sleep(IDLE_DELAY).await,
                Err(e) => {
                    error!(queue, error = %e, "queue iteration failed, backing off");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// One drain iteration. Returns whether a job was dequeued. Handler
    /// failures are recorded on the job, not propagated; only store-level
    /// failures bubble up into the backoff path.
    pub(crate) async fn process_next(
        &self,
        queue: &str,
        handler: &dyn JobHandler,
    ) -> Result<bool, PipelineError> {
        let Some(job_id) = self.store.pop_job(queue, POP_TIMEOUT).await? else {
            return Ok(false);
        };

        let Some(job) = self.store.get_job(&job_id).await? else {
            warn!(%job_id, queue, "dequeued job record missing, likely expired");
            return Ok(true);
        };

        info!(%job_id, queue, "job dequeued");
        self.store
            .set_status(&job_id, JobStatus::Processing, 0, "Processing started")
            .await?;

        match handler.handle(&job, self.store.clone()).await {
            Ok(result) => {
                self.store
                    .set_status(&job_id, JobStatus::Completed, 100, "Completed")
                    .await?;
                info!(
                    %job_id,
                    processing_time_ms = result.processing_time_ms,
                    extraction_method = %result.extraction_method,
                    "job completed"
                );
            }
            Err(e) => {
                let message = truncate_message(&e.to_string(), MAX_ERROR_CHARS);
                error!(%job_id, error = %message, "job failed");
                self.store
                    .set_status(&job_id, JobStatus::Failed, 100, &message)
                    .await?;
            }
        }
        Ok(true)
    }

    #[cfg(test)]
    pub(crate) fn active_queue_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}
