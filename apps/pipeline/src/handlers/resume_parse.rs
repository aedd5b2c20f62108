//! Handler for the `resume_parse` queue: file in, `UnifiedResume` out.
//!
//! Validate → extract text → prompt the model (with progress heartbeats
//! while the call is in flight) → normalize the output → persist the
//! result. Any failure surfaces as the real error on the job; nothing is
//! ever substituted for a failed step.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::extract::{self, ExtractorConfig};
use crate::jobs::runner::JobHandler;
use crate::jobs::store::JobStore;
use crate::jobs::types::{Job, JobResult, JobStatus, ParsePayload};
use crate::llm::templates::{TemplateRegistry, RESUME_PARSE};
use crate::llm::{GenerateOptions, TextGenerator};
use crate::normalize;
use crate::progress::ProgressReporter;

/// Queue name this handler is registered under.
pub const RESUME_PARSE_QUEUE: &str = "resume_parse";

#[derive(Debug, Clone)]
pub struct ParseSettings {
    /// Logical model name passed to the invoker.
    pub model: String,
    pub max_upload_bytes: u64,
    pub llm_timeout: Duration,
    pub extractor: ExtractorConfig,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            model: "accurate".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            llm_timeout: Duration::from_secs(120),
            extractor: ExtractorConfig::default(),
        }
    }
}

pub struct ResumeParseHandler {
    generator: Arc<dyn TextGenerator>,
    templates: TemplateRegistry,
    settings: ParseSettings,
}

impl ResumeParseHandler {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        templates: TemplateRegistry,
        settings: ParseSettings,
    ) -> Self {
        Self {
            generator,
            templates,
            settings,
        }
    }

    fn decode_payload(payload: &Value) -> Result<ParsePayload, PipelineError> {
        serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::Validation(format!("malformed job payload: {e}")))
    }

    fn validate(&self, payload: &ParsePayload) -> Result<(), PipelineError> {
        if payload.file_path.is_empty() {
            return Err(PipelineError::Validation("missing file path".to_string()));
        }
        if payload.file_size == 0 {
            return Err(PipelineError::Validation("uploaded file is empty".to_string()));
        }
        if payload.file_size > self.settings.max_upload_bytes {
            return Err(PipelineError::Validation(format!(
                "file too large: {} bytes (limit {})",
                payload.file_size, self.settings.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn process(
        &self,
        job: &Job,
        store: Arc<dyn JobStore>,
        payload: &ParsePayload,
    ) -> Result<JobResult, PipelineError> {
        let started = Instant::now();

        store
            .set_status(&job.id, JobStatus::Processing, 10, "Extracting document text")
            .await?;
        let extraction = extract::extract_text(
            Path::new(&payload.file_path),
            &payload.mime_type,
            &self.settings.extractor,
        )
        .await?;
        info!(
            job_id = %job.id,
            method = extraction.method.as_str(),
            quality = extraction.quality_score,
            chars = extraction.text.chars().count(),
            "text extracted"
        );

        store
            .set_status(&job.id, JobStatus::Processing, 30, "Document text extracted")
            .await?;

        let rendered = self
            .templates
            .render(RESUME_PARSE, &[("resume_text", extraction.text.as_str())])?;
        let opts = GenerateOptions {
            model: self.settings.model.clone(),
            timeout: self.settings.llm_timeout,
            ..GenerateOptions::default()
        };

        // Heartbeats cover the model call, the longest step; the guard is
        // dropped (and the timer with it) the moment the call resolves.
        let reporter = ProgressReporter::start(store.clone(), job.id.clone());
        let generated = self
            .generator
            .generate(&rendered.prompt, rendered.system, &opts)
            .await;
        reporter.stop();
        let generation = generated?;

        store
            .set_status(&job.id, JobStatus::Processing, 90, "Structuring parsed resume")
            .await?;
        let resume = normalize::normalize_resume(&generation.text)?;

        let result = JobResult {
            job_id: job.id.clone(),
            payload: resume,
            processed_at: Utc::now(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            extraction_method: extraction.method.as_str().to_string(),
            model_used: generation.model,
        };
        store.set_result(&result).await?;
        Ok(result)
    }
}

#[async_trait]
impl JobHandler for ResumeParseHandler {
    async fn handle(
        &self,
        job: &Job,
        store: Arc<dyn JobStore>,
    ) -> Result<JobResult, PipelineError> {
        let payload = Self::decode_payload(&job.payload)?;

        let outcome = match self.validate(&payload) {
            Ok(()) => self.process(job, store, &payload).await,
            Err(e) => Err(e),
        };

        // The upload is per-job scratch; every exit after the payload
        // decodes passes through this cleanup, rejections included.
        // Failing to remove it is logged, never fatal.
        if let Err(e) = tokio::fs::remove_file(&payload.file_path).await {
            warn!(
                job_id = %job.id,
                file = %payload.file_path,
                error = %e,
                "failed to remove uploaded file"
            );
        }

        outcome
    }
}
