use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::chunker::ChunkMetadata;

/// Value of the `source` metadata key on every chunk.
pub const SOURCE_TAG: &str = "chat";

/// Identity and type of an uploaded file, as supplied by the file transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    #[serde(default, alias = "mimetype")]
    pub media_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl FileDescriptor {
    pub fn new(id: impl Into<String>, media_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            media_type: media_type.into(),
            name: Some(name.into()),
            title: None,
        }
    }

    /// Name shown to users: name, then title, then id, then "unknown".
    pub fn display_name(&self) -> &str {
        [self.name.as_deref(), self.title.as_deref(), Some(self.id.as_str())]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or("unknown")
    }
}

/// Provenance shared by every chunk of one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub source_file_id: Option<String>,
    pub filename: String,
    pub channel_id: Option<String>,
    pub media_type: String,
}

impl DocumentMetadata {
    /// Metadata for an uploaded file.
    pub fn for_file(descriptor: &FileDescriptor, channel_id: Option<&str>) -> Self {
        Self {
            source: SOURCE_TAG.to_string(),
            source_file_id: Some(descriptor.id.clone()),
            filename: descriptor.display_name().to_string(),
            channel_id: channel_id.map(String::from),
            media_type: descriptor.media_type.to_lowercase(),
        }
    }

    /// Metadata for inline message text, which has no file identity.
    pub fn for_message(label: &str, channel_id: Option<&str>) -> Self {
        Self {
            source: SOURCE_TAG.to_string(),
            source_file_id: None,
            filename: label.to_string(),
            channel_id: channel_id.map(String::from),
            media_type: "text/plain".to_string(),
        }
    }

    /// Attach a character offset, producing per-chunk metadata.
    pub fn at_offset(&self, start_offset: usize) -> ChunkMetadata {
        ChunkMetadata {
            document: self.clone(),
            start_offset,
        }
    }
}

/// The pre-chunking unit: extracted text plus its provenance.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Stable file id for local files: SHA-256 of the contents.
pub fn file_id_for_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Guess a media type for a local file from its extension.
pub fn guess_media_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("md") | Some("markdown") => "text/markdown",
        Some("json") => "application/json",
        _ => "text/plain",
    }
}
