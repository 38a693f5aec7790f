//! Indexing pipeline: bytes → text → chunks → embeddings → vector index.

use crate::error::{ChatragError, Result};
use crate::ingest::chunker::Chunker;
use crate::ingest::extract::ExtractorRegistry;
use crate::ingest::metadata::{DocumentMetadata, FileDescriptor, SourceDocument};
use crate::ingest::registry::IngestionRegistry;
use crate::search::VectorIndex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Orchestrates extraction, chunking and insertion, with per-file dedup.
///
/// Owns the ingestion registry; the vector index is shared with the query
/// pipeline.
pub struct IndexingPipeline {
    extractors: Arc<ExtractorRegistry>,
    chunker: Chunker,
    index: Arc<VectorIndex>,
    registry: IngestionRegistry,
    /// Read across insert + mark, write across clear + reset
    reset: RwLock<()>,
}

impl IndexingPipeline {
    pub fn new(index: Arc<VectorIndex>, chunker: Chunker) -> Self {
        Self {
            extractors: Arc::new(ExtractorRegistry::new()),
            chunker,
            index,
            registry: IngestionRegistry::new(),
            reset: RwLock::new(()),
        }
    }

    /// Index one uploaded file, returning the ids of the inserted chunks.
    ///
    /// Returns an empty list without side effects when the file id is already
    /// indexed or when the file has no extractable text. The registry is only
    /// updated after a successful insert, so failed files stay retryable.
    pub async fn index(
        &self,
        file_bytes: Vec<u8>,
        descriptor: &FileDescriptor,
        channel_id: Option<&str>,
    ) -> Result<Vec<String>> {
        let filename = descriptor.display_name().to_string();
        if descriptor.id.trim().is_empty() {
            return Err(ChatragError::indexing(
                filename,
                ChatragError::InvalidInput("file descriptor has no id".to_string()),
            ));
        }

        let _guard = self.registry.lock_file(&descriptor.id).await;
        if self.registry.contains(&descriptor.id) {
            log::info!("Skipping `{}` ({}): already indexed", filename, descriptor.id);
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let text = self
            .extract(file_bytes, &descriptor.media_type)
            .await
            .map_err(|e| ChatragError::indexing(&filename, e))?;

        if text.is_empty() {
            log::info!("No extractable text in `{}`; leaving it unindexed", filename);
            return Ok(Vec::new());
        }

        let document = SourceDocument {
            text,
            metadata: DocumentMetadata::for_file(descriptor, channel_id),
        };
        let ids = self
            .insert(&document, Some(&descriptor.id))
            .await
            .map_err(|e| ChatragError::indexing(&filename, e))?;

        log::info!(
            "Indexed `{}` ({}): {} chunks from {} chars in {:?}",
            filename,
            descriptor.id,
            ids.len(),
            document.text.chars().count(),
            start.elapsed()
        );

        Ok(ids)
    }

    /// Index inline message text. There is no file identity, so no dedup.
    pub async fn index_text(
        &self,
        text: &str,
        channel_id: Option<&str>,
        label: &str,
    ) -> Result<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let document = SourceDocument {
            text: text.to_string(),
            metadata: DocumentMetadata::for_message(label, channel_id),
        };
        let ids = self
            .insert(&document, None)
            .await
            .map_err(|e| ChatragError::indexing(label, e))?;

        log::info!("Indexed inline text `{}`: {} chunks", label, ids.len());
        Ok(ids)
    }

    /// Clear the vector index and the registry, returning the chunks removed.
    ///
    /// Waits for in-flight inserts to finish marking, so a reset never leaves
    /// a file marked without its chunks.
    pub async fn delete_all(&self) -> usize {
        let _reset = self.reset.write().await;
        let removed = self.index.delete_all().await;
        self.registry.clear();
        log::info!("Deleted all embeddings: {} chunks removed", removed);
        removed
    }

    /// True if `file_id` has been indexed since the last reset.
    pub fn is_indexed(&self, file_id: &str) -> bool {
        self.registry.contains(file_id)
    }

    /// Number of distinct files indexed since the last reset
    pub fn indexed_file_count(&self) -> usize {
        self.registry.len()
    }

    async fn extract(&self, bytes: Vec<u8>, media_type: &str) -> Result<String> {
        let extractors = Arc::clone(&self.extractors);
        let media_type = media_type.to_string();
        tokio::task::spawn_blocking(move || extractors.extract(&bytes, &media_type))
            .await
            .map_err(|e| ChatragError::Extraction(format!("Extraction task failed: {}", e)))?
    }

    /// Embed outside the reset lock, then insert and mark `file_id` under it.
    async fn insert(&self, document: &SourceDocument, file_id: Option<&str>) -> Result<Vec<String>> {
        let chunks = self.chunker.split(&document.text, &document.metadata);
        log::debug!(
            "Split `{}` into {} chunks",
            document.metadata.filename,
            chunks.len()
        );
        let batch = self.index.embed(chunks).await?;

        let _reset = self.reset.read().await;
        let ids = self.index.insert(batch).await?;
        if let Some(id) = file_id {
            self.registry.mark(id);
        }
        Ok(ids)
    }
}
