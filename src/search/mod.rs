pub mod index;
pub mod vector;

pub use index::{EmbeddedBatch, VectorIndex};
pub use vector::{cosine_similarity, dot_product, SimilarityMetric};

use crate::ingest::ChunkMetadata;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single retrieved chunk, ranked against a query
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// When the chunk's batch became searchable
    pub indexed_at: DateTime<Utc>,
    pub score: f32,
    /// 1-based position in the result list
    pub rank: usize,
}
