mod config;
mod errors;
mod extract;
mod handlers;
mod jobs;
mod llm;
mod normalize;
mod progress;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extract::ExtractorConfig;
use crate::handlers::resume_parse::{ParseSettings, ResumeParseHandler, RESUME_PARSE_QUEUE};
use crate::jobs::runner::QueueService;
use crate::jobs::store::RedisJobStore;
use crate::llm::templates::TemplateRegistry;
use crate::llm::{LlmClient, ModelTable};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("resume_pipeline={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume parse pipeline v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Redis-backed job store
    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let store = Arc::new(RedisJobStore::new(redis_conn));
    info!("Redis job store initialized");

    // Initialize LLM client
    let models = ModelTable::from_config(&config);
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone(), models));
    info!("LLM client initialized (parse model hint: {})", config.parse_model);

    // Register the resume_parse handler
    let handler = ResumeParseHandler::new(
        llm,
        TemplateRegistry::builtin(),
        ParseSettings {
            model: config.parse_model.clone(),
            max_upload_bytes: config.max_upload_bytes,
            llm_timeout: std::time::Duration::from_secs(config.llm_timeout_secs),
            extractor: ExtractorConfig {
                ocr_max_pages: config.ocr_max_pages,
                ocr_languages: config.ocr_languages.clone(),
                ocr_scratch_dir: config.ocr_scratch_dir.clone().map(Into::into),
            },
        },
    );

    let mut service = QueueService::new(store);
    service.register(RESUME_PARSE_QUEUE, Arc::new(handler));
    let service = Arc::new(service);

    // Boot the drain loop; later enqueues re-wake it if it was never started
    service.ensure_running(RESUME_PARSE_QUEUE);
    info!("Queue runner active for '{RESUME_PARSE_QUEUE}'");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
