//! Bounded embedding cache keyed by text fingerprints.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::Embedding;

/// Default maximum number of cached embeddings.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Cache for embeddings to avoid redundant vectorizer calls.
///
/// The cache is bounded: once an insertion pushes it past capacity, the
/// oldest tenth of the entries (by insertion order) is evicted in one batch.
/// Eviction is insertion-order FIFO, not LRU; evicted hot texts re-populate
/// on their next miss.
///
/// Reads and writes are point operations; no lock is held while a caller
/// awaits a vectorizer.
pub struct EmbeddingCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CacheInner {
    entries: HashMap<Fingerprint, Embedding>,
    /// Insertion order, oldest first. Overwrites keep their original slot,
    /// so every queued key is live in `entries` until evicted.
    order: VecDeque<Fingerprint>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` embeddings.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Embedding> {
        let inner = self.inner.read().await;
        match inner.entries.get(fingerprint) {
            Some(embedding) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(embedding.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite an embedding.
    ///
    /// If the insertion pushes the cache past capacity, the oldest
    /// ⌈capacity/10⌉ entries are evicted before returning.
    pub async fn put(&self, fingerprint: Fingerprint, embedding: Embedding) {
        let mut inner = self.inner.write().await;

        if inner.entries.insert(fingerprint.clone(), embedding).is_none() {
            inner.order.push_back(fingerprint);
        }

        if inner.entries.len() > self.capacity {
            let batch = self.capacity.div_ceil(10);
            let mut evicted = 0;
            while evicted < batch {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
                evicted += 1;
            }
            debug!("Evicted {evicted} oldest cache entries");
        }
    }

    /// Check if a fingerprint is cached.
    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.read().await.entries.contains_key(fingerprint)
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Maximum number of cached embeddings.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.order.clear();
        debug!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub capacity: usize,

    /// Lookups that found an entry.
    pub hits: u64,

    /// Lookups that found nothing.
    pub misses: u64,
}
