//! LLM Invoker — the single point of entry for all model calls in the
//! pipeline. No other module talks to the Anthropic API directly.
//!
//! Timeout model is layered: an outer wall-clock budget races the whole
//! call (dropping the in-flight request future aborts the underlying
//! connection), an inner per-attempt timeout bounds each network call, and
//! a bounded retry loop covers transient failures in between. A call that
//! exhausts its retries surfaces the last backend error verbatim — the
//! invoker never substitutes synthetic output for a failed call.

pub mod templates;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ATTEMPTS: u32 = 3;
/// Per-attempt network timeout; the outer budget in `GenerateOptions`
/// bounds the whole retry loop.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Maps logical model names to concrete backend model ids. Callers ask for
/// "fast" or "accurate" and stay agnostic to the mapping; an unknown hint
/// passes through as an explicit model id.
#[derive(Debug, Clone)]
pub struct ModelTable {
    fast: String,
    accurate: String,
}

impl ModelTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fast: config.model_fast.clone(),
            accurate: config.model_accurate.clone(),
        }
    }

    pub fn resolve<'a>(&'a self, hint: &'a str) -> &'a str {
        match hint {
            "fast" => &self.fast,
            "accurate" => &self.accurate,
            other => other,
        }
    }
}

/// Per-call generation options.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Logical model name ("fast"/"accurate") or a concrete model id.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Outer wall-clock budget including all retries.
    pub timeout: Duration,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: "accurate".to_string(),
            temperature: 0.2,
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

/// A successful generation: the text plus the concrete model that produced it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model: String,
}

/// Seam for the text-generation backend, so handlers can be exercised with
/// a scripted generator in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        opts: &GenerateOptions,
    ) -> Result<Generation, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl LlmResponse {
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Retrying Anthropic Messages API client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    models: ModelTable,
}

impl LlmClient {
    pub fn new(api_key: String, models: ModelTable) -> Self {
        Self {
            client: Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            models,
        }
    }

    /// Retries on network errors, 429 and 5xx with exponential backoff.
    /// Each attempt's latency is logged.
    async fn call_with_retries(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        opts: &GenerateOptions,
    ) -> Result<String, LlmError> {
        let request_body = AnthropicRequest {
            model,
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .timeout(ATTEMPT_TIMEOUT)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        "LLM attempt {} errored after {}ms: {e}",
                        attempt + 1,
                        started.elapsed().as_millis()
                    );
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM attempt {} succeeded in {}ms: input_tokens={}, output_tokens={}",
                attempt + 1,
                started.elapsed().as_millis(),
                llm_response.usage.input_tokens,
                llm_response.usage.output_tokens
            );

            return match llm_response.text() {
                Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
                _ => Err(LlmError::EmptyContent),
            };
        }

        Err(last_error.unwrap_or(LlmError::EmptyContent))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        opts: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let model = self.models.resolve(&opts.model).to_string();

        // The outer race cancels for real: dropping the reqwest future
        // aborts the in-flight request rather than letting it run on with
        // its result ignored.
        match tokio::time::timeout(opts.timeout, self.call_with_retries(&model, prompt, system, opts))
            .await
        {
            Ok(result) => result.map(|text| Generation { text, model }),
            Err(_) => Err(LlmError::Timeout {
                secs: opts.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ModelTable {
        ModelTable {
            fast: "claude-3-5-haiku-latest".to_string(),
            accurate: "claude-sonnet-4-5".to_string(),
        }
    }

    #[test]
    fn test_model_table_resolves_logical_names() {
        let models = table();
        assert_eq!(models.resolve("fast"), "claude-3-5-haiku-latest");
        assert_eq!(models.resolve("accurate"), "claude-sonnet-4-5");
    }

    #[test]
    fn test_model_table_passes_explicit_ids_through() {
        assert_eq!(table().resolve("claude-opus-4"), "claude-opus-4");
    }

    #[test]
    fn test_generate_options_defaults() {
        let opts = GenerateOptions::default();
        assert_eq!(opts.model, "accurate");
        assert_eq!(opts.max_tokens, 4096);
        assert_eq!(opts.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let response = LlmResponse {
            content: vec![
                ContentBlock {
                    block_type: "thinking".to_string(),
                    text: None,
                },
                ContentBlock {
                    block_type: "text".to_string(),
                    text: Some("{}".to_string()),
                },
            ],
            usage: Usage {
                input_tokens: 1,
                output_tokens: 1,
            },
        };
        assert_eq!(response.text(), Some("{}"));
    }
}
