use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::embeddings::Embedder;
use crate::error::{ChatragError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// OpenAI accepts at most this many inputs per embeddings request
const MAX_BATCH_SIZE: usize = 2048;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// OpenAI embeddings client
///
/// Batches inputs up to `batch_size` per request. Requests are not retried:
/// a failed or timed-out call fails the whole operation. With a cache
/// attached, single-text embeds (queries) are served from it when possible.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
    dimensions: Option<usize>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "text-embedding-3-large")
    /// * `batch_size` - Maximum number of texts per API request (capped at 2048)
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: String, model: String, batch_size: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatragError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            dimensions: None,
            cache: None,
        })
    }

    /// Build from the `[embeddings]` config section
    pub fn from_config(config: &EmbeddingsConfig, api_key: String) -> Result<Self> {
        let mut embedder = Self::new(
            api_key,
            config.model.clone(),
            config.batch_size,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_base_url(&config.base_url)
        .with_dimensions(config.dimensions);

        // Skip the cache entirely when capacity is 0
        if config.cache_capacity > 0 {
            embedder = embedder.with_cache(Arc::new(EmbeddingCache::new(config.cache_capacity)));
        }
        Ok(embedder)
    }

    /// Point at an OpenAI-compatible endpoint (e.g. a proxy or local server)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request a specific output dimension (text-embedding-3 models only)
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    /// Make a single API request for `texts`
    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatragError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ChatragError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ChatragError::Embedding(format!("Failed to parse response: {}", e)))?;
        log::debug!(
            "Embedding API call for {} inputs took {:?}",
            expected,
            start.elapsed()
        );

        collect_embeddings(result, expected, self.dimensions)
    }
}

/// Order response vectors by input index and check count and dimensions.
fn collect_embeddings(
    response: EmbeddingResponse,
    expected: usize,
    dimensions: Option<usize>,
) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(ChatragError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);

    if let Some(want) = dimensions {
        if let Some(bad) = data.iter().find(|d| d.embedding.len() != want) {
            return Err(ChatragError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                want,
                bad.embedding.len()
            )));
        }
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Embedding cache hit");
                return Ok(cached);
            }
        }

        let embedding = self
            .request(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ChatragError::Embedding("Empty response from OpenAI API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone());
        }
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.request(batch.to_vec()).await?);

            // Small pause between full batches to stay under rate limits
            if batch.len() == self.batch_size && all_embeddings.len() < texts.len() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(batch_size: usize) -> OpenAIEmbedder {
        OpenAIEmbedder::new(
            "test-key".to_string(),
            "text-embedding-3-large".to_string(),
            batch_size,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_embedder_new() {
        let e = embedder(100);
        assert_eq!(e.model, "text-embedding-3-large");
        assert_eq!(e.batch_size, 100);
        assert_eq!(e.endpoint(), "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn test_embedder_batch_size_limits() {
        assert_eq!(embedder(5000).batch_size, 2048);
        assert_eq!(embedder(2048).batch_size, 2048);
        assert_eq!(embedder(0).batch_size, 1);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let e = embedder(10).with_base_url("http://localhost:1234/v1/");
        assert_eq!(e.endpoint(), "http://localhost:1234/v1/embeddings");
    }

    #[test]
    fn test_request_omits_unset_dimensions() {
        let req = EmbeddingRequest {
            model: "m",
            input: vec!["a".to_string()],
            dimensions: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("dimensions").is_none());

        let req = EmbeddingRequest {
            model: "m",
            input: vec![],
            dimensions: Some(256),
        };
        assert_eq!(serde_json::to_value(&req).unwrap()["dimensions"], 256);
    }

    #[test]
    fn test_collect_embeddings_orders_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"embedding": [0.0, 1.0], "index": 1},
                {"embedding": [1.0, 0.0], "index": 0}
            ]}"#,
        )
        .unwrap();
        let vectors = collect_embeddings(response, 2, Some(2)).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_collect_embeddings_rejects_short_response() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.5], "index": 0}]}"#).unwrap();
        assert!(collect_embeddings(response, 2, None).is_err());
    }

    #[test]
    fn test_collect_embeddings_rejects_wrong_dimension() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.5, 0.5, 0.5]}]}"#).unwrap();
        let err = collect_embeddings(response, 1, Some(2)).unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = Arc::new(EmbeddingCache::new(10));
        cache.put("refund policy", vec![0.1, 0.2]);
        // Nothing listens here; a network call would fail
        let e = embedder(10)
            .with_base_url("http://127.0.0.1:9")
            .with_cache(cache);

        assert_eq!(e.embed("refund policy").await.unwrap(), vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_error() {
        let e = embedder(10).with_base_url("http://127.0.0.1:9");
        let err = e.embed("hello").await.unwrap_err();
        assert!(matches!(err, ChatragError::Embedding(_)));
    }
}
