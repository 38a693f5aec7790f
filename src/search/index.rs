//! In-memory vector index shared by the indexing and query pipelines.
//!
//! Chunks live in a single insertion-ordered `Vec` behind a reader/writer
//! lock: searches share the read side, while `insert` and `delete_all` take the
//! write side for the whole batch, so readers see either all of a batch or
//! none of it. Network calls to the embedding service happen before any lock
//! is taken.

use crate::embeddings::Embedder;
use crate::error::{ChatragError, Result};
use crate::ingest::{ChunkMetadata, TextChunk};
use crate::search::vector::{top_k_by_score, SimilarityMetric};
use crate::search::SearchResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A chunk as held by the index
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub indexed_at: DateTime<Utc>,
}

/// Chunks with embeddings, not yet visible to searches
#[derive(Debug, Default)]
pub struct EmbeddedBatch {
    chunks: Vec<(String, TextChunk, Vec<f32>)>,
    dimension: usize,
}

impl EmbeddedBatch {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Volatile, process-lifetime vector store
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    metric: SimilarityMetric,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl VectorIndex {
    /// Create an empty index that embeds through `embedder` and ranks with `metric`.
    pub fn new(embedder: Arc<dyn Embedder>, metric: SimilarityMetric) -> Self {
        Self {
            embedder,
            metric,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store `chunks`, returning their new ids in input order.
    ///
    /// All embeddings are computed before the write lock is taken; the batch
    /// is then appended atomically. On any embedding failure nothing is stored.
    pub async fn add(&self, chunks: Vec<TextChunk>) -> Result<Vec<String>> {
        let batch = self.embed(chunks).await?;
        self.insert(batch).await
    }

    /// Embed `chunks` without touching the stored collection.
    ///
    /// Pair with [`VectorIndex::insert`] when the caller needs its own lock
    /// around the insert but not around the embedding call.
    pub async fn embed(&self, chunks: Vec<TextChunk>) -> Result<EmbeddedBatch> {
        if chunks.is_empty() {
            return Ok(EmbeddedBatch::default());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embed_start = Instant::now();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        log::debug!(
            "Embedded {} chunks in {:?}",
            texts.len(),
            embed_start.elapsed()
        );

        if embeddings.len() != chunks.len() {
            return Err(ChatragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 || embeddings.iter().any(|e| e.len() != dimension) {
            return Err(ChatragError::Embedding(
                "Embedding batch has empty or inconsistent dimensions".to_string(),
            ));
        }

        let chunks = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| (Uuid::new_v4().to_string(), chunk, embedding))
            .collect();

        Ok(EmbeddedBatch { chunks, dimension })
    }

    /// Append an embedded batch atomically, returning its ids in order.
    pub async fn insert(&self, batch: EmbeddedBatch) -> Result<Vec<String>> {
        if batch.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let indexed_at = Utc::now();
        let ids: Vec<String> = batch.chunks.iter().map(|(id, _, _)| id.clone()).collect();

        let mut guard = self.chunks.write().await;
        if let Some(existing) = guard.first() {
            if existing.embedding.len() != batch.dimension {
                return Err(ChatragError::Embedding(format!(
                    "Unexpected embedding dimension: index holds {}, got {}",
                    existing.embedding.len(),
                    batch.dimension
                )));
            }
        }
        guard.extend(
            batch
                .chunks
                .into_iter()
                .map(|(id, chunk, embedding)| StoredChunk {
                    id,
                    content: chunk.content,
                    embedding,
                    metadata: chunk.metadata,
                    indexed_at,
                }),
        );

        Ok(ids)
    }

    /// Return up to `k` chunks ranked by descending similarity to `query`.
    ///
    /// Ties keep insertion order. An empty index yields an empty result
    /// without calling the embedding service.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let embed_start = Instant::now();
        let query_vec = self.embedder.embed(query).await?;
        log::debug!("Query embedding took {:?}", embed_start.elapsed());

        let guard = self.chunks.read().await;
        let scored: Vec<(f32, usize)> = guard
            .iter()
            .enumerate()
            .filter(|(_, chunk)| chunk.embedding.len() == query_vec.len())
            .map(|(pos, chunk)| (self.metric.score(&query_vec, &chunk.embedding), pos))
            .collect();

        if scored.len() < guard.len() {
            log::warn!(
                "Skipped {} chunks whose dimension differs from the query ({})",
                guard.len() - scored.len(),
                query_vec.len()
            );
        }

        let results = top_k_by_score(scored, k)
            .into_iter()
            .enumerate()
            .map(|(idx, (score, pos))| {
                let chunk = &guard[pos];
                SearchResult {
                    chunk_id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    indexed_at: chunk.indexed_at,
                    score,
                    rank: idx + 1,
                }
            })
            .collect();

        Ok(results)
    }

    /// Remove every chunk, returning how many were removed.
    pub async fn delete_all(&self) -> usize {
        let mut guard = self.chunks.write().await;
        let removed = guard.len();
        guard.clear();
        removed
    }

    /// Number of stored chunks
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// True when no chunks are stored
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Look up a stored chunk by id
    pub async fn get(&self, id: &str) -> Option<StoredChunk> {
        self.chunks.read().await.iter().find(|c| c.id == id).cloned()
    }
}
