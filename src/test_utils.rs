//! Deterministic stand-ins for the embedding and completion services.

use crate::completion::Completer;
use crate::embeddings::Embedder;
use crate::error::{ChatragError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Bag-of-words embedder: each lowercase token bumps one hashed bucket.
///
/// Texts sharing words get positive cosine similarity; texts with disjoint
/// vocabularies score near zero.
pub struct KeywordEmbedder {
    dimensions: usize,
    delay: Option<Duration>,
    texts_embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            dimensions: 256,
            delay: None,
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }
}

/// FNV-1a, stable across runs and platforms
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

/// Returns a preset vector per exact text, or a fallback vector.
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Always fails, as an unreachable embedding service would.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ChatragError::Embedding("Network error: connection refused".to_string()))
    }
}

/// Records every call and answers with a canned reply.
pub struct RecordingCompleter {
    reply: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingCompleter {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(system_instruction, user_message)` pairs, oldest first
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for RecordingCompleter {
    async fn complete(&self, system_instruction: &str, user_message: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), user_message.to_string()));
        Ok(self.reply.clone())
    }
}

/// Always fails, as a rejected completion request would.
pub struct FailingCompleter;

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(&self, _system_instruction: &str, _user_message: &str) -> Result<String> {
        Err(ChatragError::Completion("OpenAI API error 503: overloaded".to_string()))
    }
}
