pub mod pdf;
pub mod plaintext;

use crate::error::Result;

/// Closed classification of declared media types.
///
/// `Unknown` is an explicit branch: it takes the same best-effort UTF-8
/// path as `PlainText`, so unrecognised uploads are still indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    PlainText,
    Unknown,
}

impl MediaType {
    /// Classify a MIME type string (case-insensitive).
    pub fn classify(media_type: &str) -> Self {
        let mt = media_type.trim().to_ascii_lowercase();
        if mt.contains("pdf") {
            Self::Pdf
        } else if mt.starts_with("text/")
            || matches!(
                mt.as_str(),
                "application/json"
                    | "application/xml"
                    | "application/x-yaml"
                    | "application/yaml"
                    | "application/javascript"
                    | "application/x-sh"
            )
        {
            Self::PlainText
        } else {
            Self::Unknown
        }
    }
}

/// Trait for text extractors
pub trait TextExtractor: Send + Sync {
    /// Check if this extractor handles the given media type
    fn handles(&self, media_type: MediaType) -> bool;

    /// Convert raw bytes to text. Empty output is not an error.
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Extractor registry that selects the extractor for a media type
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with the PDF and plain-text extractors
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: Vec::new(),
        };

        registry.register(Box::new(pdf::PdfExtractor));
        registry.register(Box::new(plaintext::PlainTextExtractor));

        registry
    }

    /// Register an extractor. Earlier registrations win.
    pub fn register(&mut self, extractor: Box<dyn TextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find the extractor for a media type
    pub fn find_extractor(&self, media_type: MediaType) -> Option<&dyn TextExtractor> {
        self.extractors
            .iter()
            .find(|e| e.handles(media_type))
            .map(|e| e.as_ref())
    }

    /// Extract text from `bytes` declared as `media_type`, trimmed.
    pub fn extract(&self, bytes: &[u8], media_type: &str) -> Result<String> {
        let kind = MediaType::classify(media_type);
        if kind == MediaType::Unknown {
            log::debug!("Unrecognised media type '{}', decoding as text", media_type);
        }

        let text = match self.find_extractor(kind) {
            Some(extractor) => extractor.extract(bytes)?,
            None => plaintext::decode_utf8_lossy_dropping(bytes),
        };

        Ok(text.trim().to_string())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_media_types() {
        assert_eq!(MediaType::classify("application/pdf"), MediaType::Pdf);
        assert_eq!(MediaType::classify("Application/PDF"), MediaType::Pdf);
        assert_eq!(MediaType::classify("text/plain"), MediaType::PlainText);
        assert_eq!(MediaType::classify("text/markdown"), MediaType::PlainText);
        assert_eq!(MediaType::classify("application/json"), MediaType::PlainText);
        assert_eq!(MediaType::classify("application/octet-stream"), MediaType::Unknown);
        assert_eq!(MediaType::classify(""), MediaType::Unknown);
    }

    #[test]
    fn test_registry_routes_by_media_type() {
        let registry = ExtractorRegistry::new();
        assert!(registry.find_extractor(MediaType::Pdf).is_some());
        assert!(registry.find_extractor(MediaType::PlainText).is_some());
        assert!(registry.find_extractor(MediaType::Unknown).is_some());
    }

    #[test]
    fn test_unknown_media_type_decodes_as_text() {
        let registry = ExtractorRegistry::new();
        let text = registry
            .extract(b"  shipping notes\n", "application/octet-stream")
            .unwrap();
        assert_eq!(text, "shipping notes");
    }

    #[test]
    fn test_result_is_trimmed() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.extract(b"\n\n  hi there \t\n", "text/plain").unwrap(), "hi there");
    }

    #[test]
    fn test_empty_bytes_give_empty_text() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.extract(b"", "text/plain").unwrap(), "");
        assert_eq!(registry.extract(b"   \n", "").unwrap(), "");
    }

    #[test]
    fn test_malformed_pdf_is_extraction_error() {
        let registry = ExtractorRegistry::new();
        let err = registry.extract(b"not a pdf at all", "application/pdf").unwrap_err();
        assert!(matches!(err, crate::error::ChatragError::Extraction(_)));
    }
}
