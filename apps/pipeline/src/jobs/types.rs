use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::UnifiedResume;

/// Lifecycle of a job. Transitions are driven only by the queue runner and
/// the handler executing the job; no two workers ever mutate the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// One unit of asynchronous work: parse one uploaded resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    /// Handler-specific payload; the resume_parse handler expects a
    /// [`ParsePayload`].
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Payload enqueued by the upload handler for the `resume_parse` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsePayload {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub user_id: String,
}

/// Point-in-time status served to a polling client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// The immutable result of a completed job. Written exactly once, to a
/// primary key and a longer-lived backup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub payload: UnifiedResume,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    /// "direct" or "ocr".
    pub extraction_method: String,
    /// Concrete model id that produced the result.
    pub model_used: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_job_status_parse_rejects_unknown() {
        assert_eq!(JobStatus::parse("exploded"), None);
    }

    #[test]
    fn test_parse_payload_uses_camel_case_keys() {
        let payload: ParsePayload = serde_json::from_value(serde_json::json!({
            "filePath": "/tmp/u/r.pdf",
            "fileName": "r.pdf",
            "fileSize": 1024,
            "mimeType": "application/pdf",
            "userId": "u-1"
        }))
        .unwrap();
        assert_eq!(payload.file_name, "r.pdf");
        assert_eq!(payload.file_size, 1024);
    }
}
