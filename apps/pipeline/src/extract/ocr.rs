//! OCR fallback for PDFs with an unusable text layer.
//!
//! Pages are rasterized with `pdftoppm` and read with `tesseract`, both
//! driven as external processes. Intermediates live in a per-job scratch
//! directory; failure to clean it up is logged, never fatal.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::extract::quality::{is_cjk, is_cjk_punctuation};
use crate::extract::ExtractorConfig;

const RASTER_DPI: &str = "300";

/// Rasterizes the first `ocr_max_pages` pages and OCRs them in order,
/// returning the concatenated, spacing-cleaned text.
pub async fn ocr_pdf(path: &Path, config: &ExtractorConfig) -> Result<String, PipelineError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("resume-ocr-");
    let scratch = match &config.ocr_scratch_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .map_err(|e| PipelineError::Extraction(format!("cannot create scratch dir: {e}")))?;

    let page_prefix = scratch.path().join("page");
    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(RASTER_DPI)
        .arg("-f")
        .arg("1")
        .arg("-l")
        .arg(config.ocr_max_pages.to_string())
        .arg(path)
        .arg(&page_prefix)
        .output()
        .await
        .map_err(|e| PipelineError::Extraction(format!("failed to run pdftoppm: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::Extraction(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut pages = list_rendered_pages(scratch.path()).await?;
    if pages.is_empty() {
        return Err(PipelineError::Extraction(
            "pdftoppm produced no page images".to_string(),
        ));
    }
    pages.sort();

    let mut text = String::new();
    let mut ocr_failures = 0usize;
    for page in &pages {
        match ocr_page(page, &config.ocr_languages).await {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                // partial OCR is acceptable; an all-pages failure is not
                warn!(page = %page.display(), error = %e, "OCR failed for page");
                ocr_failures += 1;
            }
        }
    }
    if ocr_failures == pages.len() {
        return Err(PipelineError::Extraction(format!(
            "OCR failed for all {} rendered pages",
            pages.len()
        )));
    }

    debug!(pages = pages.len(), failures = ocr_failures, "OCR pass finished");

    if let Err(e) = scratch.close() {
        warn!(error = %e, "failed to clean up OCR scratch dir");
    }

    Ok(clean_ocr_spacing(&text))
}

async fn list_rendered_pages(dir: &Path) -> Result<Vec<std::path::PathBuf>, PipelineError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::Extraction(format!("cannot read scratch dir: {e}")))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::Extraction(format!("cannot read scratch dir: {e}")))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            pages.push(path);
        }
    }
    Ok(pages)
}

async fn ocr_page(image: &Path, languages: &str) -> Result<String, PipelineError> {
    let output = Command::new("tesseract")
        .arg(image)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .output()
        .await
        .map_err(|e| PipelineError::Extraction(format!("failed to run tesseract: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::Extraction(format!(
            "tesseract exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Collapses the spaces tesseract injects between ideographic characters
/// ("简 历" -> "简历") and before CJK punctuation, leaving spacing between
/// Latin words untouched.
pub fn clean_ocr_spacing(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' || c == '\t' {
            let prev = chars[..i].iter().rev().find(|p| *p != &' ' && *p != &'\t');
            let next = chars[i + 1..].iter().find(|n| *n != &' ' && *n != &'\t');
            let joins_cjk = match (prev, next) {
                (Some(&p), Some(&n)) => {
                    (is_cjk(p) && (is_cjk(n) || is_cjk_punctuation(n)))
                        || (is_cjk_punctuation(p) && is_cjk(n))
                }
                _ => false,
            };
            if joins_cjk {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_ocr_spacing_joins_ideographs() {
        assert_eq!(clean_ocr_spacing("个 人 简 历"), "个人简历");
    }

    #[test]
    fn test_clean_ocr_spacing_joins_around_cjk_punctuation() {
        assert_eq!(clean_ocr_spacing("工作 ， 经历"), "工作，经历");
    }

    #[test]
    fn test_clean_ocr_spacing_keeps_latin_words_apart() {
        assert_eq!(clean_ocr_spacing("Rust and Go"), "Rust and Go");
    }

    #[test]
    fn test_clean_ocr_spacing_keeps_mixed_script_boundary() {
        // a space between Latin and CJK is kept; only CJK-to-CJK joins
        assert_eq!(clean_ocr_spacing("精通 Rust 开发"), "精通 Rust 开发");
    }

    #[test]
    fn test_clean_ocr_spacing_preserves_newlines() {
        assert_eq!(clean_ocr_spacing("简 历\n第 二 页"), "简历\n第二页");
    }
}
