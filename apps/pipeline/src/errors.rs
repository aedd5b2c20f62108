use thiserror::Error;

use crate::llm::LlmError;

/// Pipeline-level error type.
///
/// Every job that fails terminates with one of these variants recorded
/// (truncated) in its status record. Storage errors are never retried here;
/// they propagate to whoever called the job store.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for PipelineError {
    fn from(e: LlmError) -> Self {
        // The backend error is surfaced verbatim. Masking a failed model call
        // with fabricated output is a correctness bug, not a fallback.
        PipelineError::Model(e.to_string())
    }
}

impl From<redis::RedisError> for PipelineError {
    fn from(e: redis::RedisError) -> Self {
        PipelineError::Storage(e.to_string())
    }
}

/// Truncates an error message to at most `max` characters, on a char boundary.
pub fn truncate_message(msg: &str, max: usize) -> String {
    if msg.chars().count() <= max {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message_short_is_unchanged() {
        assert_eq!(truncate_message("boom", 500), "boom");
    }

    #[test]
    fn test_truncate_message_long_is_bounded() {
        let long = "x".repeat(1000);
        let out = truncate_message(&long, 500);
        assert_eq!(out.chars().count(), 501); // 500 chars + ellipsis
    }

    #[test]
    fn test_truncate_message_respects_char_boundaries() {
        let msg = "错误".repeat(400);
        let out = truncate_message(&msg, 500);
        assert_eq!(out.chars().count(), 501);
    }
}
