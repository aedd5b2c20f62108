//! Raw text extraction for Word (.docx) documents.

use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};

use crate::errors::PipelineError;

/// Extracts paragraph text from a .docx byte buffer, one line per paragraph.
pub fn extract_docx(data: &[u8]) -> Result<String, PipelineError> {
    let docx = read_docx(data)
        .map_err(|e| PipelineError::Extraction(format!("cannot read docx: {e:?}")))?;

    let mut text = String::new();
    for child in docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            for para_child in paragraph.children {
                if let ParagraphChild::Run(run) = para_child {
                    for run_child in run.children {
                        if let RunChild::Text(t) = run_child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }
    Ok(text)
}
