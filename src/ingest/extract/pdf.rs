use super::{MediaType, TextExtractor};
use crate::error::{ChatragError, Result};
use lopdf::Document;

/// PDF extractor
///
/// Extracts text page by page with lopdf, prefixing each page that yields
/// text with a `[PAGE n]` marker. Pages without extractable text (scans,
/// blank pages, unsupported encodings) are skipped rather than failing the
/// document; only an unreadable document is an error.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn handles(&self, media_type: MediaType) -> bool {
        media_type == MediaType::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ChatragError::Extraction(format!("Failed to load PDF: {}", e)))?;

        let mut parts = Vec::new();
        // get_pages is keyed by 1-based page number, so iteration is in page order
        for page_num in doc.get_pages().into_keys() {
            let text = match doc.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    log::debug!("No text extracted from page {}: {}", page_num, e);
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            parts.push(format!("\n\n[PAGE {}]\n{}", page_num, text));
        }

        Ok(parts.join("\n").trim().to_string())
    }
}
