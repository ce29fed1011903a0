//! PDF text extraction module
//!
//! Extracts text content from PDF files using lopdf. Each page's whitespace
//! is collapsed to single spaces and pages are separated by a blank line.

use crate::errors::{DocQaError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Check that `path` exists and names a PDF
pub fn ensure_pdf(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DocQaError::FileNotFound(path.to_path_buf()));
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(DocQaError::NotAPdf(path.to_path_buf()));
    }

    Ok(())
}

/// Extract text content from a PDF file (blocking)
pub fn extract_text_from_pdf(path: &Path) -> Result<String> {
    ensure_pdf(path)?;

    let doc = lopdf::Document::load(path).map_err(|e| DocQaError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut page_texts = Vec::with_capacity(pages.len());
    for (page_num, page_id) in pages {
        let raw = match doc.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_num, error = %e, "Falling back to content stream scan");
                match doc.get_page_content(page_id) {
                    Ok(content) => scan_text_operators(&content),
                    Err(e) => {
                        warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
                        continue;
                    }
                }
            }
        };

        let cleaned = clean_text(&raw);
        if !cleaned.is_empty() {
            page_texts.push(cleaned);
        }
    }

    if page_texts.is_empty() {
        return Err(DocQaError::NoText(path.display().to_string()));
    }

    let text = page_texts.join("\n\n");
    debug!(chars = text.chars().count(), "Text extraction complete");

    Ok(text)
}

/// Pull string operands of `Tj`, `TJ`, `'` and `"` out of a content stream
fn scan_text_operators(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content.lines().map(str::trim) {
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if in_text_block => {
                if line.ends_with("Tj") || line.ends_with("TJ") || line.ends_with('\'') || line.ends_with('"') {
                    text.push_str(&literal_strings(line));
                }
            }
            _ => {}
        }
    }

    text
}

/// Concatenate every `( ... )` literal on a line, honouring escapes
fn literal_strings(line: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if depth > 0 => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => {}
            },
            '(' => {
                if depth > 0 {
                    out.push(ch);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    out.push(ch);
                }
            }
            _ if depth > 0 => out.push(ch),
            _ => {}
        }
    }

    out
}

/// Collapse whitespace runs and drop byte-order marks
pub fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
