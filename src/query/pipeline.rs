//! Query pipeline: question → retrieval → grounded completion.

use crate::completion::Completer;
use crate::error::{ChatragError, Result};
use crate::query::context;
use crate::search::{SearchResult, VectorIndex};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Returned instead of an answer when nothing is indexed yet.
pub const NO_DOCUMENTS_MESSAGE: &str = "I don’t have any indexed documents yet. Upload a file first.";

/// Constrains the model to the retrieved context.
pub const SYSTEM_INSTRUCTION: &str = "You answer questions using ONLY the provided context. \
If the answer is not in the context, say you don't know.";

/// A chunk that was placed in the model's context
#[derive(Debug, Clone, Serialize)]
pub struct AnswerSource {
    pub filename: String,
    pub source_file_id: Option<String>,
    pub chunk_id: String,
    pub indexed_at: DateTime<Utc>,
    pub score: f32,
    pub rank: usize,
}

impl From<&SearchResult> for AnswerSource {
    fn from(result: &SearchResult) -> Self {
        Self {
            filename: result.metadata.document.filename.clone(),
            source_file_id: result.metadata.document.source_file_id.clone(),
            chunk_id: result.chunk_id.clone(),
            indexed_at: result.indexed_at,
            score: result.score,
            rank: result.rank,
        }
    }
}

/// Answer text plus the sources it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<AnswerSource>,
}

impl Answer {
    /// The empty-index outcome. Not an error.
    pub fn no_documents() -> Self {
        Self {
            answer: NO_DOCUMENTS_MESSAGE.to_string(),
            sources: Vec::new(),
        }
    }

    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// User turn sent alongside [`SYSTEM_INSTRUCTION`].
pub fn user_message(query: &str, context: &str) -> String {
    format!("QUESTION:\n{}\n\nCONTEXT:\n{}", query, context)
}

/// Retrieves context from the shared vector index and asks the completer.
pub struct QueryPipeline {
    index: Arc<VectorIndex>,
    completer: Arc<dyn Completer>,
    max_context_chars: usize,
}

impl QueryPipeline {
    /// `max_context_chars` of 0 leaves the context unbounded.
    pub fn new(index: Arc<VectorIndex>, completer: Arc<dyn Completer>, max_context_chars: usize) -> Self {
        Self {
            index,
            completer,
            max_context_chars,
        }
    }

    /// Answer `query` from the top `k` chunks, returning only the text.
    pub async fn answer(&self, query: &str, channel_id: Option<&str>, k: usize) -> Result<String> {
        Ok(self.answer_with_sources(query, channel_id, k).await?.answer)
    }

    /// Answer `query` from the top `k` chunks.
    ///
    /// Returns [`Answer::no_documents`] without calling the completer when the
    /// index is empty or the search finds nothing.
    pub async fn answer_with_sources(
        &self,
        query: &str,
        channel_id: Option<&str>,
        k: usize,
    ) -> Result<Answer> {
        let start = Instant::now();
        let results = self
            .index
            .search(query, k)
            .await
            .map_err(|e| ChatragError::query(query, e))?;

        if results.is_empty() {
            log::info!(
                "No indexed documents to answer from (channel {})",
                channel_id.unwrap_or("-")
            );
            return Ok(Answer::no_documents());
        }

        let assembled = context::assemble(&results, self.max_context_chars);
        let sources = results[..assembled.used]
            .iter()
            .map(AnswerSource::from)
            .collect();

        let answer = self
            .completer
            .complete(SYSTEM_INSTRUCTION, &user_message(query, &assembled.text))
            .await
            .map_err(|e| ChatragError::query(query, e))?;

        log::info!(
            "Answered query in channel {} from {} chunks in {:?}",
            channel_id.unwrap_or("-"),
            assembled.used,
            start.elapsed()
        );

        Ok(Answer { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{DocumentMetadata, FileDescriptor, TextChunk};
    use crate::search::SimilarityMetric;
    use crate::test_utils::{FailingCompleter, FailingEmbedder, KeywordEmbedder, RecordingCompleter};

    const REFUND: &str = "Refund policy: customers may request a full refund within 30 days of purchase.";
    const SHIPPING: &str = "Shipping takes 5 to 7 business days with standard courier delivery.";

    fn chunk(content: &str, id: &str, name: &str) -> TextChunk {
        let descriptor = FileDescriptor::new(id, "text/plain", name);
        TextChunk::new(content, DocumentMetadata::for_file(&descriptor, Some("C1")).at_offset(0))
    }

    async fn policy_index() -> Arc<VectorIndex> {
        let index = Arc::new(VectorIndex::new(
            Arc::new(KeywordEmbedder::new()),
            SimilarityMetric::Cosine,
        ));
        index
            .add(vec![
                chunk(SHIPPING, "F2", "shipping.txt"),
                chunk(REFUND, "F1", "refunds.txt"),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_empty_index_skips_completion() {
        let index = Arc::new(VectorIndex::new(
            Arc::new(FailingEmbedder),
            SimilarityMetric::Cosine,
        ));
        let completer = Arc::new(RecordingCompleter::new("should not be used"));
        let pipeline = QueryPipeline::new(index, completer.clone(), 0);

        let answer = pipeline.answer("anything?", Some("C1"), 4).await.unwrap();
        assert_eq!(answer, NO_DOCUMENTS_MESSAGE);
        assert!(completer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_answer_grounded_in_best_chunk() {
        let completer = Arc::new(RecordingCompleter::new("Refunds are accepted within 30 days."));
        let pipeline = QueryPipeline::new(policy_index().await, completer.clone(), 0);

        let answer = pipeline
            .answer_with_sources("What is the refund policy?", Some("C1"), 1)
            .await
            .unwrap();
        assert_eq!(answer.answer, "Refunds are accepted within 30 days.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].filename, "refunds.txt");
        assert_eq!(answer.sources[0].source_file_id.as_deref(), Some("F1"));
        assert!(answer.sources[0].indexed_at <= Utc::now());

        let calls = completer.calls();
        assert_eq!(calls.len(), 1);
        let (system, user) = &calls[0];
        assert_eq!(system, SYSTEM_INSTRUCTION);
        assert_eq!(
            user,
            &format!(
                "QUESTION:\nWhat is the refund policy?\n\nCONTEXT:\nFILE: refunds.txt (F1)\n{}",
                REFUND
            )
        );
        assert!(!user.contains("Shipping"));
    }

    #[tokio::test]
    async fn test_context_in_rank_order() {
        let completer = Arc::new(RecordingCompleter::new("ok"));
        let pipeline = QueryPipeline::new(policy_index().await, completer.clone(), 0);

        let answer = pipeline
            .answer_with_sources("refund policy", None, 2)
            .await
            .unwrap();
        let ranks: Vec<usize> = answer.sources.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2]);

        let (_, user) = &completer.calls()[0];
        let refund_at = user.find("refunds.txt").unwrap();
        let shipping_at = user.find("shipping.txt").unwrap();
        assert!(refund_at < shipping_at);
        assert!(user.contains(context::BLOCK_SEPARATOR));
    }

    #[tokio::test]
    async fn test_context_budget_limits_sources() {
        let completer = Arc::new(RecordingCompleter::new("ok"));
        let pipeline = QueryPipeline::new(policy_index().await, completer.clone(), 10);

        let answer = pipeline
            .answer_with_sources("refund policy", None, 2)
            .await
            .unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert!(!completer.calls()[0].1.contains("shipping.txt"));
    }

    #[tokio::test]
    async fn test_completion_failure_carries_query() {
        let pipeline = QueryPipeline::new(policy_index().await, Arc::new(FailingCompleter), 0);

        let err = pipeline.answer("refund policy", None, 1).await.unwrap_err();
        assert!(err.to_string().contains("refund policy"));
        assert!(matches!(err.root(), ChatragError::Completion(_)));
    }
}
