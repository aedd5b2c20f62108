use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub anthropic_api_key: String,
    /// Concrete model id behind the "fast" logical name.
    pub model_fast: String,
    /// Concrete model id behind the "accurate" logical name.
    pub model_accurate: String,
    /// Logical model name the parse handler requests ("fast" or "accurate").
    pub parse_model: String,
    /// Outer wall-clock budget for a single LLM call, including retries.
    pub llm_timeout_secs: u64,
    /// Upper bound on pages rasterized for OCR fallback.
    pub ocr_max_pages: u32,
    /// Tesseract language pack(s), e.g. "chi_sim+eng".
    pub ocr_languages: String,
    /// Override for the OCR scratch directory; system temp dir when unset.
    pub ocr_scratch_dir: Option<String>,
    pub max_upload_bytes: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            model_fast: optional_env("MODEL_FAST", "claude-3-5-haiku-latest"),
            model_accurate: optional_env("MODEL_ACCURATE", "claude-sonnet-4-5"),
            parse_model: optional_env("PARSE_MODEL", "accurate"),
            llm_timeout_secs: optional_env("LLM_TIMEOUT_SECS", "120")
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            ocr_max_pages: optional_env("OCR_MAX_PAGES", "5")
                .parse::<u32>()
                .context("OCR_MAX_PAGES must be a positive integer")?,
            ocr_languages: optional_env("OCR_LANGUAGES", "chi_sim+eng"),
            ocr_scratch_dir: std::env::var("OCR_SCRATCH_DIR").ok(),
            max_upload_bytes: optional_env("MAX_UPLOAD_BYTES", "10485760")
                .parse::<u64>()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
