//! Ingestion registry: which source files have already been indexed.
//!
//! Re-delivery of the same upload event must not embed the file twice, even
//! when two deliveries race. Callers hold the per-file guard from
//! [`IngestionRegistry::lock_file`] across check, index and mark; a second
//! caller for the same id waits on the guard and then sees the id as indexed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a file id is being indexed.
pub type FileGuard = OwnedMutexGuard<()>;

/// Set of indexed source-file ids, with per-id serialization.
#[derive(Default)]
pub struct IngestionRegistry {
    indexed: Mutex<HashSet<String>>,
    // Grows by one entry per distinct file id ever indexed. Entries are never
    // removed, because dropping a lock that someone still holds would let a
    // second indexer in.
    file_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IngestionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `file_id` has been indexed since the last `clear`.
    pub fn contains(&self, file_id: &str) -> bool {
        self.indexed().contains(file_id)
    }

    /// Record `file_id` as indexed. Returns false if it already was.
    pub fn mark(&self, file_id: &str) -> bool {
        self.indexed().insert(file_id.to_string())
    }

    /// Forget every indexed id so files can be indexed again.
    pub fn clear(&self) {
        self.indexed().clear();
    }

    /// Number of indexed ids
    pub fn len(&self) -> usize {
        self.indexed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed().is_empty()
    }

    /// Wait for exclusive access to `file_id`.
    pub async fn lock_file(&self, file_id: &str) -> FileGuard {
        let lock = {
            let mut locks = self
                .file_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(file_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    fn indexed(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the set cannot leave it half-updated
        self.indexed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
