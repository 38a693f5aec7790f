use super::{MediaType, TextExtractor};
use crate::error::Result;

/// Plain text extractor
///
/// Also serves unrecognised media types. Never fails: byte sequences that are
/// not valid UTF-8 are dropped.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn handles(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::PlainText | MediaType::Unknown)
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        Ok(decode_utf8_lossy_dropping(bytes))
    }
}

/// Decode UTF-8, skipping invalid sequences instead of substituting U+FFFD.
pub fn decode_utf8_lossy_dropping(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}
