//! In-memory `JobStore` fake for tests.
//!
//! Mirrors the Redis key semantics closely enough to exercise queue-runner
//! and handler behavior: separate primary/backup result slots (so TTL
//! expiry can be simulated per slot) and JSON round-tripping of results, so
//! serialization problems surface in tests too.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::jobs::store::{decode_stored_result, resolve_result_read, JobStore};
use crate::jobs::types::{Job, JobResult, JobStatus, StatusRecord};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    statuses: HashMap<String, StatusRecord>,
    queues: HashMap<String, VecDeque<String>>,
    results: HashMap<String, String>,
    backups: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates TTL expiry of the primary result key only.
    pub fn expire_result_primary(&self, job_id: &str) {
        self.inner.lock().unwrap().results.remove(job_id);
    }

    /// Simulates TTL expiry of both result keys.
    pub fn expire_result_fully(&self, job_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.results.remove(job_id);
        inner.backups.remove(job_id);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, queue: &str, payload: Value) -> Result<String, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(
            id.clone(),
            Job {
                id: id.clone(),
                queue: queue.to_string(),
                payload,
                created_at: now,
            },
        );
        inner.statuses.insert(
            id.clone(),
            StatusRecord {
                status: JobStatus::Queued,
                progress: 0,
                message: "Queued".to_string(),
                updated_at: now,
            },
        );
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(id.clone());
        Ok(id)
    }

    async fn pop_job(
        &self,
        queue: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, PipelineError> {
        // immediate instead of blocking; a miss is a miss
        Ok(self
            .inner
            .lock()
            .unwrap()
            .queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front))
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, PipelineError> {
        Ok(self.inner.lock().unwrap().jobs.get(job_id).cloned())
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> Result<(), PipelineError> {
        self.inner.lock().unwrap().statuses.insert(
            job_id.to_string(),
            StatusRecord {
                status,
                progress,
                message: message.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<StatusRecord>, PipelineError> {
        Ok(self.inner.lock().unwrap().statuses.get(job_id).cloned())
    }

    async fn set_result(&self, result: &JobResult) -> Result<(), PipelineError> {
        let encoded = serde_json::to_string(result)
            .map_err(|e| PipelineError::Storage(format!("result serialization failed: {e}")))?;
        let mut inner = self.inner.lock().unwrap();
        inner.results.insert(result.job_id.clone(), encoded.clone());
        inner.backups.insert(result.job_id.clone(), encoded);
        Ok(())
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, PipelineError> {
        // same read-repair decision as the Redis store
        let mut inner = self.inner.lock().unwrap();
        let primary = inner.results.get(job_id).cloned();
        let backup = if primary.is_some() {
            None
        } else {
            inner.backups.get(job_id).cloned()
        };
        let Some((raw, reseed)) = resolve_result_read(primary, backup) else {
            return Ok(None);
        };
        if reseed {
            inner.results.insert(job_id.to_string(), raw.clone());
        }
        Ok(Some(decode_stored_result(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::UnifiedResume;

    fn sample_result(job_id: &str) -> JobResult {
        JobResult {
            job_id: job_id.to_string(),
            payload: UnifiedResume::default(),
            processed_at: Utc::now(),
            processing_time_ms: 42,
            extraction_method: "direct".to_string(),
            model_used: "claude-sonnet-4-5".to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_returns_unique_ids_and_queued_status() {
        let store = MemoryJobStore::new();
        let a = store.enqueue("resume_parse", Value::Null).await.unwrap();
        let b = store.enqueue("resume_parse", Value::Null).await.unwrap();
        assert_ne!(a, b);

        let status = store.get_status(&a).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Queued);
        assert_eq!(status.progress, 0);
    }

    #[tokio::test]
    async fn test_pop_is_fifo_per_queue() {
        let store = MemoryJobStore::new();
        let a = store.enqueue("q", Value::Null).await.unwrap();
        let b = store.enqueue("q", Value::Null).await.unwrap();
        let timeout = Duration::from_secs(1);
        assert_eq!(store.pop_job("q", timeout).await.unwrap(), Some(a));
        assert_eq!(store.pop_job("q", timeout).await.unwrap(), Some(b));
        assert_eq!(store.pop_job("q", timeout).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_result_falls_back_to_backup_and_reseeds_primary() {
        let store = MemoryJobStore::new();
        let result = sample_result("job-1");
        store.set_result(&result).await.unwrap();

        let before = store.get_result("job-1").await.unwrap().unwrap();
        store.expire_result_primary("job-1");

        // served from backup and identical to the original
        let after = store.get_result("job-1").await.unwrap().unwrap();
        assert_eq!(after, before);

        // primary was re-seeded; expiring only the backup must not lose it
        store.inner.lock().unwrap().backups.remove("job-1");
        assert!(store.get_result("job-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_result_not_found_when_both_keys_expired() {
        let store = MemoryJobStore::new();
        store.set_result(&sample_result("job-2")).await.unwrap();
        store.expire_result_fully("job-2");
        assert!(store.get_result("job-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_upserts() {
        let store = MemoryJobStore::new();
        let id = store.enqueue("q", Value::Null).await.unwrap();
        store
            .set_status(&id, JobStatus::Processing, 40, "Analyzing")
            .await
            .unwrap();
        let status = store.get_status(&id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Processing);
        assert_eq!(status.progress, 40);
        assert_eq!(status.message, "Analyzing");
    }
}
