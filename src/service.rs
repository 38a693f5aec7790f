//! Service facade: one shared vector index behind the indexing and query
//! pipelines.

use crate::completion::{Completer, OpenAICompleter};
use crate::config::Config;
use crate::embeddings::{Embedder, OpenAIEmbedder};
use crate::error::{ChatragError, Result};
use crate::ingest::{Chunker, FileDescriptor, IndexingPipeline};
use crate::query::{Answer, QueryPipeline};
use crate::search::VectorIndex;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

/// Index size snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub indexed_files: usize,
}

pub struct RagService {
    index: Arc<VectorIndex>,
    indexing: IndexingPipeline,
    query: QueryPipeline,
    default_k: usize,
}

impl RagService {
    /// Wire the pipelines around a fresh, empty index.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        config: &Config,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::new(embedder, config.embeddings.similarity));
        let chunker = Chunker::from_config(&config.chunking)?;

        Ok(Self {
            indexing: IndexingPipeline::new(Arc::clone(&index), chunker),
            query: QueryPipeline::new(
                Arc::clone(&index),
                completer,
                config.search.max_context_chars,
            ),
            index,
            default_k: config.search.default_k,
        })
    }

    /// Build with the OpenAI clients described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = OpenAIEmbedder::from_config(&config.embeddings, config.embeddings_api_key()?)
            .context("Failed to create embedding client")?;
        let completer = OpenAICompleter::from_config(&config.completion, config.completion_api_key()?)
            .context("Failed to create completion client")?;

        log::info!(
            "Using embedding model {} ({:?}) and completion model {}",
            config.embeddings.model,
            config.embeddings.similarity,
            config.completion.model
        );

        Ok(Self::new(Arc::new(embedder), Arc::new(completer), config)?)
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub async fn index_file(
        &self,
        file_bytes: Vec<u8>,
        descriptor: &FileDescriptor,
        channel_id: Option<&str>,
    ) -> Result<Vec<String>> {
        self.indexing.index(file_bytes, descriptor, channel_id).await
    }

    pub async fn index_text(
        &self,
        text: &str,
        channel_id: Option<&str>,
        label: &str,
    ) -> Result<Vec<String>> {
        self.indexing.index_text(text, channel_id, label).await
    }

    pub fn is_indexed(&self, file_id: &str) -> bool {
        self.indexing.is_indexed(file_id)
    }

    /// Answer with the configured `default_k` when `k` is `None`.
    pub async fn answer(&self, query: &str, channel_id: Option<&str>, k: Option<usize>) -> Result<Answer> {
        if k == Some(0) {
            return Err(ChatragError::InvalidInput("k must be greater than 0".to_string()));
        }
        self.query
            .answer_with_sources(query, channel_id, k.unwrap_or(self.default_k))
            .await
    }

    /// Drop every chunk and forget every indexed file. Returns chunks removed.
    pub async fn delete_all(&self) -> usize {
        self.indexing.delete_all().await
    }

    pub async fn stats(&self) -> IndexStats {
        IndexStats {
            chunks: self.index.len().await,
            indexed_files: self.indexing.indexed_file_count(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::NO_DOCUMENTS_MESSAGE;
    use crate::test_utils::{KeywordEmbedder, RecordingCompleter};

    pub(crate) fn test_config() -> Config {
        toml::from_str(
            r#"
[embeddings]
provider = "openai"
model = "text-embedding-3-small"
api_key_env = "OPENAI_API_KEY"
batch_size = 16

[completion]
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[chunking]
chunk_size = 200
chunk_overlap = 40

[search]
default_k = 2
"#,
        )
        .unwrap()
    }

    pub(crate) fn test_service(reply: &str) -> (RagService, Arc<RecordingCompleter>) {
        let completer = Arc::new(RecordingCompleter::new(reply));
        let service = RagService::new(
            Arc::new(KeywordEmbedder::new()),
            completer.clone(),
            &test_config(),
        )
        .unwrap();
        (service, completer)
    }

    #[tokio::test]
    async fn test_index_answer_reset_cycle() {
        let (service, completer) = test_service("Within 30 days.");
        let descriptor = FileDescriptor::new("F1", "text/plain", "refunds.txt");

        let ids = service
            .index_file(b"Refunds are issued within 30 days.".to_vec(), &descriptor, Some("C1"))
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            service.stats().await,
            IndexStats {
                chunks: 1,
                indexed_files: 1
            }
        );

        let answer = service.answer("refunds", Some("C1"), None).await.unwrap();
        assert_eq!(answer.answer, "Within 30 days.");
        assert_eq!(completer.calls().len(), 1);

        assert_eq!(service.delete_all().await, 1);
        assert_eq!(service.stats().await, IndexStats { chunks: 0, indexed_files: 0 });
        assert!(!service.is_indexed("F1"));

        let answer = service.answer("refunds", Some("C1"), None).await.unwrap();
        assert_eq!(answer.answer, NO_DOCUMENTS_MESSAGE);
        assert_eq!(completer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_k_rejected_before_search() {
        let (service, completer) = test_service("unused");
        let descriptor = FileDescriptor::new("F1", "text/plain", "refunds.txt");
        service
            .index_file(b"Refunds are issued within 30 days.".to_vec(), &descriptor, None)
            .await
            .unwrap();

        let err = service.answer("refunds", None, Some(0)).await.unwrap_err();
        assert!(matches!(err, ChatragError::InvalidInput(_)));
        assert!(completer.calls().is_empty());
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let mut config = test_config();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        let result = RagService::new(
            Arc::new(KeywordEmbedder::new()),
            Arc::new(RecordingCompleter::new("")),
            &config,
        );
        assert!(result.is_err());
    }
}
