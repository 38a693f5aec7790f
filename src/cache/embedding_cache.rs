use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

type TextKey = [u8; 32];

/// Thread-safe LRU cache of embeddings, keyed by a SHA-256 digest of the text
///
/// Repeated questions in a channel ("what's the refund policy?") skip the
/// embedding call. Keys are digests so long chunk texts don't sit in memory
/// twice.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<TextKey, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` embeddings (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cached embedding for `text`, refreshing its recency
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.lock().get(&key(text)).cloned()
    }

    /// Store the embedding for `text`
    pub fn put(&self, text: &str, embedding: Vec<f32>) {
        self.lock().put(key(text), embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<TextKey, Vec<f32>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(text: &str) -> TextKey {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(text.as_bytes()));
    out
}
