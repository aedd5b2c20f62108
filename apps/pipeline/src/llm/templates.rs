//! Named, versioned prompt templates with `${field}` substitution.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::errors::PipelineError;

/// Template id for the resume parsing prompt.
pub const RESUME_PARSE: &str = "resume_parse";

/// System prompt for resume parsing — enforces JSON-only output.
const RESUME_PARSE_SYSTEM: &str =
    "You are a precise resume data extractor. \
    Convert the raw text of a resume into structured JSON. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent facts that are not present in the resume text. \
    If a field is unknown, use an empty string or empty array.";

/// Resume parsing prompt template. Substitute `${resume_text}` before sending.
const RESUME_PARSE_BODY: &str = r#"Convert the following resume text into a JSON object with this EXACT schema (no extra fields):
{
  "profile": {
    "name": "", "email": "", "phone": "", "location": "",
    "portfolio": "", "linkedin": "", "summary": ""
  },
  "workExperience": [
    {"company": "", "position": "", "duration": "", "description": ""}
  ],
  "projectExperience": [
    {"name": "", "role": "", "duration": "", "description": "", "url": ""}
  ],
  "education": [
    {"school": "", "degree": "", "major": "", "duration": ""}
  ],
  "skills": [
    {"category": "", "details": ""}
  ],
  "customSections": [
    {"title": "", "content": ""}
  ]
}

Rules:
- Every top-level field must be present, even when empty.
- "duration" is the raw date range as written, e.g. "2021.03 - 2023.07".
- Group loose skill mentions into skill categories; keep wording from the resume.
- Anything that fits no section (awards, languages, certificates) goes into "customSections".
- Preserve the original language of the resume; do not translate.

RESUME TEXT:
${resume_text}"#;

#[derive(Debug, Clone)]
pub struct Template {
    pub id: &'static str,
    pub version: u32,
    pub system: &'static str,
    body: &'static str,
}

/// A rendered prompt: the substituted body plus its system prompt.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: &'static str,
    pub prompt: String,
}

/// Registry of the prompt templates the pipeline knows about.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<&'static str, Template>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            RESUME_PARSE,
            Template {
                id: RESUME_PARSE,
                version: 1,
                system: RESUME_PARSE_SYSTEM,
                body: RESUME_PARSE_BODY,
            },
        );
        Self { templates }
    }

    /// Substitutes `${name}` placeholders from `vars`. A placeholder with
    /// no matching variable is an error, not silently left in place.
    pub fn render(
        &self,
        template_id: &str,
        vars: &[(&str, &str)],
    ) -> Result<RenderedPrompt, PipelineError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| PipelineError::Internal(anyhow!("unknown template '{template_id}'")))?;

        let mut prompt = String::with_capacity(template.body.len());
        let mut rest = template.body;
        while let Some(start) = rest.find("${") {
            prompt.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                PipelineError::Internal(anyhow!(
                    "unterminated placeholder in template '{}' v{}",
                    template.id,
                    template.version
                ))
            })?;
            let name = &after[..end];
            let value = vars
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| {
                    PipelineError::Internal(anyhow!(
                        "template '{}' v{} is missing variable '{name}'",
                        template.id,
                        template.version
                    ))
                })?;
            prompt.push_str(value);
            rest = &after[end + 1..];
        }
        prompt.push_str(rest);

        Ok(RenderedPrompt {
            system: template.system,
            prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_resume_text() {
        let registry = TemplateRegistry::builtin();
        let rendered = registry
            .render(RESUME_PARSE, &[("resume_text", "Alice\nalice@example.com")])
            .unwrap();
        assert!(rendered.prompt.contains("Alice\nalice@example.com"));
        assert!(!rendered.prompt.contains("${resume_text}"));
        assert!(rendered.system.contains("valid JSON only"));
    }

    #[test]
    fn test_render_unknown_template_errors() {
        let registry = TemplateRegistry::builtin();
        assert!(registry.render("nope", &[]).is_err());
    }

    #[test]
    fn test_render_missing_variable_errors() {
        let registry = TemplateRegistry::builtin();
        let err = registry.render(RESUME_PARSE, &[]).unwrap_err();
        assert!(err.to_string().contains("resume_text"));
    }

    #[test]
    fn test_schema_keys_survive_rendering() {
        // the ${...} scanner must not mangle the JSON braces in the body
        let registry = TemplateRegistry::builtin();
        let rendered = registry.render(RESUME_PARSE, &[("resume_text", "x")]).unwrap();
        for key in [
            "profile",
            "workExperience",
            "projectExperience",
            "education",
            "skills",
            "customSections",
        ] {
            assert!(rendered.prompt.contains(key), "missing schema key {key}");
        }
    }
}
