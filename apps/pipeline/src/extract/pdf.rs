//! PDF extraction: text layer first, quality-gated OCR fallback second.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::extract::quality::{score_text, QUALITY_THRESHOLD};
use crate::extract::{ocr, ExtractionMethod, ExtractionResult, ExtractorConfig};

pub async fn extract_pdf(
    path: &Path,
    config: &ExtractorConfig,
) -> Result<ExtractionResult, PipelineError> {
    let owned = path.to_path_buf();
    let direct = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| PipelineError::Extraction(format!("extraction task panicked: {e}")))?;

    match direct {
        Ok(text) => {
            let score = score_text(&text);
            if score >= QUALITY_THRESHOLD {
                debug!(score, "PDF text layer accepted");
                return Ok(ExtractionResult {
                    text,
                    method: ExtractionMethod::Direct,
                    quality_score: score,
                });
            }
            info!(score, "PDF text layer below quality threshold, falling back to OCR");
        }
        Err(e) => {
            warn!(error = %e, "PDF text layer extraction failed, falling back to OCR");
        }
    }

    let text = ocr::ocr_pdf(path, config).await?;
    let quality_score = score_text(&text);
    Ok(ExtractionResult {
        text,
        method: ExtractionMethod::Ocr,
        quality_score,
    })
}
