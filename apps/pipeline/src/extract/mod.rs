//! Text Extractor — format-dispatched text extraction with OCR fallback.
//!
//! Dispatch is by declared MIME type, falling back to a guess from the file
//! extension. Plain text and Word go straight to their readers; PDFs try
//! the text layer first and drop to OCR when the quality score fails.

pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod quality;

use std::path::Path;

use crate::errors::PipelineError;

/// Minimum cleaned-text length for an extraction to count as a success
/// rather than an unusable document.
const MIN_EXTRACTED_CHARS: usize = 20;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub ocr_max_pages: u32,
    pub ocr_languages: String,
    /// Where OCR scratch directories are created; system temp dir when unset.
    pub ocr_scratch_dir: Option<std::path::PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ocr_max_pages: 5,
            ocr_languages: "chi_sim+eng".to_string(),
            ocr_scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Direct,
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::Ocr => "ocr",
        }
    }
}

/// Transient extraction output; never persisted.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub quality_score: f32,
}

/// Extracts and post-processes text from an uploaded document.
pub async fn extract_text(
    path: &Path,
    declared_mime: &str,
    config: &ExtractorConfig,
) -> Result<ExtractionResult, PipelineError> {
    let mime = resolve_mime(path, declared_mime);

    let mut result = match mime.as_str() {
        MIME_TEXT => extract_plain_text(path).await?,
        MIME_DOCX => extract_word(path).await?,
        MIME_PDF => pdf::extract_pdf(path, config).await?,
        other => {
            return Err(PipelineError::Validation(format!(
                "unsupported format: {other}"
            )))
        }
    };

    result.text = clean_text(&result.text);
    if result.text.chars().count() < MIN_EXTRACTED_CHARS {
        return Err(PipelineError::Extraction(format!(
            "extracted text too short ({} chars) to be a resume",
            result.text.chars().count()
        )));
    }
    Ok(result)
}

/// Prefers the declared MIME type; guesses from the extension when the
/// declaration is missing or a generic octet-stream. Parameters like
/// `; charset=utf-8` are stripped before dispatch.
fn resolve_mime(path: &Path, declared: &str) -> String {
    let declared = declared.split(';').next().unwrap_or("").trim();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared.to_string();
    }
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

async fn extract_plain_text(path: &Path) -> Result<ExtractionResult, PipelineError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::Extraction(format!("cannot read file: {e}")))?;
    if data.is_empty() {
        return Err(PipelineError::Validation("uploaded file is empty".to_string()));
    }
    let text = String::from_utf8(data)
        .map_err(|e| PipelineError::Extraction(format!("file is not valid UTF-8: {e}")))?;
    Ok(ExtractionResult {
        text,
        method: ExtractionMethod::Direct,
        quality_score: 1.0,
    })
}

async fn extract_word(path: &Path) -> Result<ExtractionResult, PipelineError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::Extraction(format!("cannot read file: {e}")))?;
    if data.is_empty() {
        return Err(PipelineError::Validation("uploaded file is empty".to_string()));
    }
    let text = tokio::task::spawn_blocking(move || docx::extract_docx(&data))
        .await
        .map_err(|e| PipelineError::Extraction(format!("extraction task panicked: {e}")))??;
    Ok(ExtractionResult {
        text,
        method: ExtractionMethod::Direct,
        quality_score: 1.0,
    })
}

/// Post-processing shared by every path: strip control characters, collapse
/// redundant whitespace, bound consecutive blank lines, trim.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_spaces = 0usize;
    let mut pending_newlines = 0usize;

    for c in text.chars() {
        match c {
            '\n' => {
                pending_newlines += 1;
                pending_spaces = 0;
            }
            c if c.is_whitespace() => pending_spaces += 1,
            c if c.is_control() => {}
            c => {
                if pending_newlines > 0 && !out.is_empty() {
                    out.push('\n');
                    if pending_newlines > 1 {
                        out.push('\n'); // at most one blank line survives
                    }
                } else if pending_spaces > 0 && !out.is_empty() {
                    out.push(' ');
                }
                pending_newlines = 0;
                pending_spaces = 0;
                out.push(c);
            }
        }
    }
    out
}
