//! Response Normalizer — multi-stage JSON recovery plus schema completion.
//!
//! The model is instructed to return a bare JSON object, but real output
//! arrives fenced, truncated, or with small syntax damage. Recovery is
//! staged; each stage only runs if the previous one failed:
//!
//! 1. strict parse (fences stripped, prose outside `{...}` sliced off)
//! 2. heuristic repair (trailing commas, missing commas, bare keys)
//! 3. fragment extraction + repair + bracket balancing
//! 4. hard failure carrying a bounded prefix of the raw output
//!
//! There is deliberately no fallback skeleton: a fabricated resume is worse
//! than a visible failure.

pub mod repair;
pub mod schema;

use serde_json::Value;
use tracing::debug;

use crate::errors::PipelineError;
pub use schema::UnifiedResume;

/// How much raw model output is quoted in a stage-4 failure message.
const RAW_PREFIX_CHARS: usize = 300;

/// Turns raw model output into a fully-populated `UnifiedResume`.
pub fn normalize_resume(raw: &str) -> Result<UnifiedResume, PipelineError> {
    let value = parse_model_json(raw)?;
    Ok(schema::complete(&value))
}

/// Runs the staged recovery chain and returns the parsed JSON object.
pub fn parse_model_json(raw: &str) -> Result<Value, PipelineError> {
    let stripped = repair::strip_fences(raw);
    let candidate = repair::slice_object(stripped).unwrap_or(stripped);

    // Stage 1: strict parse
    if let Some(value) = parse_object(candidate) {
        return Ok(value);
    }

    // Stage 2: heuristic repair
    let repaired = repair::heuristic_repair(candidate);
    if let Some(value) = parse_object(&repaired) {
        debug!("model output recovered by heuristic repair");
        return Ok(value);
    }

    // Stage 3: fragment extraction + repair + bracket balancing
    if let Some(fragment) = repair::extract_fragment(stripped) {
        let patched = repair::balance_brackets(&repair::heuristic_repair(fragment));
        if let Some(value) = parse_object(&patched) {
            debug!("model output recovered by fragment extraction");
            return Ok(value);
        }
    }

    // Stage 4: hard failure, quoting a bounded prefix of what the model sent
    let prefix: String = raw.chars().take(RAW_PREFIX_CHARS).collect();
    Err(PipelineError::Model(format!(
        "model output is not valid JSON after all repair stages; output began: {prefix}"
    )))
}

/// Strict parse that only accepts a top-level object. Arrays or scalars are
/// treated as stage failure — completing them would fabricate an empty
/// resume out of garbage.
fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage1_clean_object() {
        let value = parse_model_json(r#"{"profile": {"name": "Ann"}}"#).unwrap();
        assert_eq!(value["profile"]["name"], "Ann");
    }

    #[test]
    fn test_stage1_fenced_with_prose() {
        let raw = "Sure! Here is the parsed resume:\n```json\n{\"profile\": {\"name\": \"Ann\"}}\n```";
        let value = parse_model_json(raw).unwrap();
        assert_eq!(value["profile"]["name"], "Ann");
    }

    #[test]
    fn test_stage2_trailing_comma_and_fence() {
        // fenced output with a trailing comma must still normalize,
        // with every other section defaulted to empty
        let raw = "```json\n{\"profile\":{\"name\":\"Bob\"},}\n```";
        let resume = normalize_resume(raw).unwrap();
        assert_eq!(resume.profile.name, "Bob");
        assert_eq!(resume.profile.email, "");
        assert!(resume.work_experience.is_empty());
        assert!(resume.skills.is_empty());
        assert!(resume.custom_sections.is_empty());
    }

    #[test]
    fn test_stage2_missing_commas_and_bare_keys() {
        let raw = "{profile: {\"name\": \"Bob\"} \"education\": []}";
        let resume = normalize_resume(raw).unwrap();
        assert_eq!(resume.profile.name, "Bob");
    }

    #[test]
    fn test_stage3_truncated_output() {
        let raw = "```json\n{\"profile\": {\"name\": \"Bob\", \"email\": \"b@x.io\"}, \"skills\": [{\"category\": \"Lang";
        let resume = normalize_resume(raw).unwrap();
        assert_eq!(resume.profile.name, "Bob");
        assert_eq!(resume.profile.email, "b@x.io");
        assert_eq!(resume.skills.len(), 1);
        assert_eq!(resume.skills[0].category, "Lang");
    }

    #[test]
    fn test_stage4_hard_failure_quotes_prefix() {
        let err = parse_model_json("I am sorry, I cannot do that.").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not valid JSON"));
        assert!(msg.contains("I am sorry"));
    }

    #[test]
    fn test_stage4_failure_message_is_bounded() {
        let raw = "z".repeat(10_000);
        let err = parse_model_json(&raw).unwrap_err();
        assert!(err.to_string().len() < 1000);
    }

    #[test]
    fn test_top_level_array_is_rejected() {
        assert!(parse_model_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_normalize_keeps_all_sections_present() {
        let resume = normalize_resume(r#"{"workExperience": [{"company": "Acme"}]}"#).unwrap();
        assert_eq!(resume.work_experience[0].company, "Acme");
        // absent sections are empty, never missing
        assert_eq!(resume.profile.phone, "");
        assert!(resume.project_experience.is_empty());
        assert!(resume.education.is_empty());
    }
}
