//! Job Store — durable queue plus per-job status/result records.
//!
//! Backed by Redis with the key layout:
//!
//! - `job:{id}`         hash: payload, queue, created_at      (TTL 24h)
//! - `job:{id}:status`  hash: status, progress, message, updated_at (TTL 24h)
//! - `queue:{name}`     list of pending job ids
//! - `result:{id}`      serialized JobResult                  (TTL 24h)
//! - `result:{id}:backup` same value, longer-lived            (TTL 48h)
//!
//! Records disappearing after TTL expiry read back as "not found", never as
//! an error. When storage itself is unavailable every operation fails fast;
//! callers must not substitute fabricated results.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::jobs::types::{Job, JobResult, JobStatus, StatusRecord};

/// TTL for job and status records.
pub const JOB_TTL_SECS: i64 = 24 * 60 * 60;
/// TTL for the primary result key.
pub const RESULT_TTL_SECS: u64 = 24 * 60 * 60;
/// TTL for the backup result key, long enough to re-seed an expired primary.
pub const BACKUP_TTL_SECS: u64 = 48 * 60 * 60;

/// Storage contract for jobs, statuses and results. The production
/// implementation is [`RedisJobStore`]; tests inject an in-memory fake.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates a job record with status `queued` and appends its id to the
    /// named queue. Returns the new job id.
    async fn enqueue(&self, queue: &str, payload: Value) -> Result<String, PipelineError>;

    /// Blocking-pop of the next job id, bounded by `timeout`. `None` on a miss.
    async fn pop_job(&self, queue: &str, timeout: Duration)
        -> Result<Option<String>, PipelineError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, PipelineError>;

    /// Upserts the status record and refreshes its TTL.
    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> Result<(), PipelineError>;

    async fn get_status(&self, job_id: &str) -> Result<Option<StatusRecord>, PipelineError>;

    /// Writes the result to the primary and backup keys. Both writes are
    /// pipelined, not atomic — acceptable because both are idempotent and
    /// derived from the same immutable result.
    async fn set_result(&self, result: &JobResult) -> Result<(), PipelineError>;

    /// Reads the primary result key; on a miss falls back to the backup and,
    /// if found there, re-seeds the primary (self-healing cache).
    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, PipelineError>;
}

/// Resolves a result read from the primary/backup key pair: the raw value
/// to decode, plus whether the primary expired and must be re-seeded from
/// the backup. `None` when both keys are gone.
pub(crate) fn resolve_result_read(
    primary: Option<String>,
    backup: Option<String>,
) -> Option<(String, bool)> {
    match (primary, backup) {
        (Some(raw), _) => Some((raw, false)),
        (None, Some(raw)) => Some((raw, true)),
        (None, None) => None,
    }
}

pub(crate) fn decode_stored_result(raw: &str) -> Result<JobResult, PipelineError> {
    serde_json::from_str(raw)
        .map_err(|e| PipelineError::Storage(format!("stored result is corrupt: {e}")))
}

#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
}

impl RedisJobStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn job_key(id: &str) -> String {
        format!("job:{id}")
    }

    fn status_key(id: &str) -> String {
        format!("job:{id}:status")
    }

    fn queue_key(name: &str) -> String {
        format!("queue:{name}")
    }

    fn result_key(id: &str) -> String {
        format!("result:{id}")
    }

    fn backup_key(id: &str) -> String {
        format!("result:{id}:backup")
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(&self, queue: &str, payload: Value) -> Result<String, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| PipelineError::Storage(format!("payload serialization failed: {e}")))?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .hset_multiple(
                Self::job_key(&id),
                &[
                    ("payload", payload_json.as_str()),
                    ("queue", queue),
                    ("created_at", now.as_str()),
                ],
            )
            .expire(Self::job_key(&id), JOB_TTL_SECS)
            .hset_multiple(
                Self::status_key(&id),
                &[
                    ("status", JobStatus::Queued.as_str()),
                    ("progress", "0"),
                    ("message", "Queued"),
                    ("updated_at", now.as_str()),
                ],
            )
            .expire(Self::status_key(&id), JOB_TTL_SECS)
            .rpush(Self::queue_key(queue), &id)
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!(job_id = %id, queue, "job enqueued");
        Ok(id)
    }

    async fn pop_job(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<String>, PipelineError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn
            .blpop(Self::queue_key(queue), timeout.as_secs_f64())
            .await?;
        Ok(popped.map(|(_, id)| id))
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, PipelineError> {
        let mut conn = self.conn.clone();
        let fields: std::collections::HashMap<String, String> =
            conn.hgetall(Self::job_key(job_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let payload = fields
            .get("payload")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(Value::Null);
        let queue = fields.get("queue").cloned().unwrap_or_default();
        let created_at = fields
            .get("created_at")
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(Job {
            id: job_id.to_string(),
            queue,
            payload,
            created_at,
        }))
    }

    async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> Result<(), PipelineError> {
        let progress = progress.to_string();
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.clone();
        redis::pipe()
            .hset_multiple(
                Self::status_key(job_id),
                &[
                    ("status", status.as_str()),
                    ("progress", progress.as_str()),
                    ("message", message),
                    ("updated_at", now.as_str()),
                ],
            )
            .expire(Self::status_key(job_id), JOB_TTL_SECS)
            .expire(Self::job_key(job_id), JOB_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<StatusRecord>, PipelineError> {
        let mut conn = self.conn.clone();
        let fields: std::collections::HashMap<String, String> =
            conn.hgetall(Self::status_key(job_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let status = fields
            .get("status")
            .and_then(|s| JobStatus::parse(s))
            .unwrap_or(JobStatus::Queued);
        let progress = fields
            .get("progress")
            .and_then(|p| p.parse::<u8>().ok())
            .unwrap_or(0);
        let message = fields.get("message").cloned().unwrap_or_default();
        let updated_at = fields
            .get("updated_at")
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(StatusRecord {
            status,
            progress,
            message,
            updated_at,
        }))
    }

    async fn set_result(&self, result: &JobResult) -> Result<(), PipelineError> {
        let encoded = serde_json::to_string(result)
            .map_err(|e| PipelineError::Storage(format!("result serialization failed: {e}")))?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .set_ex(Self::result_key(&result.job_id), &encoded, RESULT_TTL_SECS)
            .set_ex(Self::backup_key(&result.job_id), &encoded, BACKUP_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, PipelineError> {
        let mut conn = self.conn.clone();
        let primary: Option<String> = conn.get(Self::result_key(job_id)).await?;
        let backup: Option<String> = if primary.is_some() {
            None
        } else {
            conn.get(Self::backup_key(job_id)).await?
        };

        let Some((raw, reseed)) = resolve_result_read(primary, backup) else {
            return Ok(None);
        };
        if reseed {
            // Primary expired but the backup survived: re-seed the primary
            // so subsequent reads are served from it again.
            let _: () = conn
                .set_ex(Self::result_key(job_id), &raw, RESULT_TTL_SECS)
                .await?;
            info!(%job_id, "result primary re-seeded from backup");
        }
        Ok(Some(decode_stored_result(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_result_read_prefers_primary() {
        let resolved = resolve_result_read(Some("a".to_string()), Some("b".to_string()));
        assert_eq!(resolved, Some(("a".to_string(), false)));
    }

    #[test]
    fn test_resolve_result_read_falls_back_and_requests_reseed() {
        let resolved = resolve_result_read(None, Some("b".to_string()));
        assert_eq!(resolved, Some(("b".to_string(), true)));
    }

    #[test]
    fn test_resolve_result_read_none_when_both_expired() {
        assert_eq!(resolve_result_read(None, None), None);
    }

    #[test]
    fn test_decode_stored_result_rejects_corrupt_payload() {
        let err = decode_stored_result("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
    }
}
