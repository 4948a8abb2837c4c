//! Cache-aware batched embedding.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::fingerprint::Fingerprint;
use crate::normalize::normalize_text;
use crate::vectorizer::VectorizerHandle;
use crate::{zero_embedding, Embedding};

/// Default number of texts per vectorizer call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Embeds batches of texts, consulting the cache first and sending only the
/// misses to the vectorizer in chunks.
///
/// Embedding never fails from the caller's point of view: a failed chunk
/// degrades to the zero-vector sentinel for its texts and the failure is
/// logged. Results always come back in input order, one embedding per text.
pub struct BatchEmbedder {
    cache: Arc<EmbeddingCache>,
    vectorizer: Arc<VectorizerHandle>,
    batch_size: usize,
}

impl BatchEmbedder {
    /// Create a new batch embedder.
    pub fn new(cache: Arc<EmbeddingCache>, vectorizer: Arc<VectorizerHandle>) -> Self {
        Self {
            cache,
            vectorizer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of texts per vectorizer call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed a batch of texts.
    ///
    /// Texts are canonicalized before fingerprinting; text that is empty
    /// after normalization maps straight to the zero sentinel without
    /// touching the cache or the vectorizer.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Embedding> {
        let mut results: Vec<Option<Embedding>> = vec![None; texts.len()];
        let mut misses: Vec<Miss> = Vec::new();

        for (index, text) in texts.iter().enumerate() {
            let normalized = normalize_text(text);
            if normalized.is_empty() {
                results[index] = Some(zero_embedding());
                continue;
            }

            let fingerprint = Fingerprint::of_text(&normalized);
            // Point lookup; the lock is released before any vectorizer call.
            match self.cache.get(&fingerprint).await {
                Some(embedding) => results[index] = Some(embedding),
                None => misses.push(Miss {
                    index,
                    normalized,
                    fingerprint,
                }),
            }
        }

        if !misses.is_empty() {
            debug!(
                "Embedding batch: {} texts, {} cache misses",
                texts.len(),
                misses.len()
            );
            self.embed_misses(&misses, &mut results).await;
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(zero_embedding))
            .collect()
    }

    /// Embed a single text.
    ///
    /// Delegates to [`embed_batch`](Self::embed_batch) so single and batched
    /// calls share one caching and normalization path.
    pub async fn embed_one(&self, text: &str) -> Embedding {
        self.embed_batch(std::slice::from_ref(&text.to_string()))
            .await
            .into_iter()
            .next()
            .unwrap_or_else(zero_embedding)
    }

    async fn embed_misses(&self, misses: &[Miss], results: &mut [Option<Embedding>]) {
        let vectorizer = match self.vectorizer.get().await {
            Ok(vectorizer) => vectorizer,
            Err(err) => {
                warn!("Vectorizer unavailable, degrading {} texts to zero: {err}", misses.len());
                for miss in misses {
                    results[miss.index] = Some(zero_embedding());
                }
                return;
            }
        };

        for chunk in misses.chunks(self.batch_size) {
            let chunk_texts: Vec<String> =
                chunk.iter().map(|miss| miss.normalized.clone()).collect();

            match vectorizer.encode_batch(&chunk_texts).await {
                Ok(embeddings) if embeddings.len() == chunk.len() => {
                    for (miss, embedding) in chunk.iter().zip(embeddings) {
                        self.cache
                            .put(miss.fingerprint.clone(), embedding.clone())
                            .await;
                        results[miss.index] = Some(embedding);
                    }
                }
                Ok(embeddings) => {
                    warn!(
                        "Vectorizer returned {} embeddings for a chunk of {}, degrading chunk to zero",
                        embeddings.len(),
                        chunk.len()
                    );
                    for miss in chunk {
                        results[miss.index] = Some(zero_embedding());
                    }
                }
                Err(err) => {
                    warn!(
                        "Vectorizer failed for a chunk of {}, degrading chunk to zero: {err}",
                        chunk.len()
                    );
                    for miss in chunk {
                        results[miss.index] = Some(zero_embedding());
                    }
                }
            }
        }
    }
}

struct Miss {
    index: usize,
    normalized: String,
    fingerprint: Fingerprint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, Result};
    use crate::vectorizer::Vectorizer;
    use crate::{is_zero_embedding, EMBEDDING_DIMENSION};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_embedding(text: &str) -> Embedding {
        let mut v = zero_embedding();
        v[0] = text.len() as f32;
        v[1] = 1.0;
        v
    }

    struct MockVectorizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockVectorizer {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Vectorizer for MockVectorizer {
        fn name(&self) -> &str {
            "mock"
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSION
        }

        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::ApiRequest("inference failed".to_string()));
            }
            Ok(texts.iter().map(|t| mock_embedding(t)).collect())
        }
    }

    fn embedder_with(mock: Arc<MockVectorizer>, cache: Arc<EmbeddingCache>) -> BatchEmbedder {
        BatchEmbedder::new(cache, Arc::new(VectorizerHandle::preinitialized(mock)))
    }

    #[tokio::test]
    async fn test_empty_texts_map_to_zero_without_vectorizer_call() {
        let mock = MockVectorizer::ok();
        let embedder = embedder_with(mock.clone(), Arc::new(EmbeddingCache::new(100)));

        let results = embedder
            .embed_batch(&["".to_string(), "hello".to_string(), "  ".to_string()])
            .await;

        assert_eq!(results.len(), 3);
        assert!(is_zero_embedding(&results[0]));
        assert_eq!(results[1], mock_embedding("hello"));
        assert!(is_zero_embedding(&results[2]));
        // The single non-empty text went out in exactly one batched call.
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_embed_one_matches_embed_batch() {
        let cache = Arc::new(EmbeddingCache::new(100));
        let embedder = embedder_with(MockVectorizer::ok(), cache);

        let single = embedder.embed_one("reentrancy guard").await;
        let batched = embedder
            .embed_batch(&["reentrancy guard".to_string()])
            .await;

        assert_eq!(single, batched[0]);
    }

    #[tokio::test]
    async fn test_repeat_embedding_hits_cache() {
        let mock = MockVectorizer::ok();
        let embedder = embedder_with(mock.clone(), Arc::new(EmbeddingCache::new(100)));

        let first = embedder.embed_one("hello world").await;
        let second = embedder.embed_one("hello world").await;

        assert_eq!(first, second);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_normalization_unifies_cache_entries() {
        let mock = MockVectorizer::ok();
        let embedder = embedder_with(mock.clone(), Arc::new(EmbeddingCache::new(100)));

        let a = embedder.embed_one("hello   world").await;
        let b = embedder.embed_one("  hello world ").await;

        assert_eq!(a, b);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_chunked() {
        let mock = MockVectorizer::ok();
        let embedder = embedder_with(mock.clone(), Arc::new(EmbeddingCache::new(100)))
            .with_batch_size(2);

        let texts: Vec<String> = (0..5).map(|i| format!("text number {i}")).collect();
        let results = embedder.embed_batch(&texts).await;

        assert_eq!(results.len(), 5);
        // 5 misses with chunk size 2: three vectorizer calls.
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_cache_hits_fill_slots_in_order() {
        let cache = Arc::new(EmbeddingCache::new(100));
        let mock = MockVectorizer::ok();
        let embedder = embedder_with(mock.clone(), cache);

        embedder.embed_one("bbb").await;
        assert_eq!(mock.calls(), 1);

        let results = embedder
            .embed_batch(&["aaaa".to_string(), "bbb".to_string(), "cc".to_string()])
            .await;

        assert_eq!(results[0], mock_embedding("aaaa"));
        assert_eq!(results[1], mock_embedding("bbb"));
        assert_eq!(results[2], mock_embedding("cc"));
        // Only the two misses went to the vectorizer, in one chunk.
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_chunk_degrades_to_zero() {
        let mock = MockVectorizer::failing();
        let embedder = embedder_with(mock.clone(), Arc::new(EmbeddingCache::new(100)));

        let results = embedder
            .embed_batch(&["hello".to_string(), "world".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        assert!(is_zero_embedding(&results[0]));
        assert!(is_zero_embedding(&results[1]));
    }

    #[tokio::test]
    async fn test_failed_chunk_is_not_cached() {
        let cache = Arc::new(EmbeddingCache::new(100));
        let embedder = embedder_with(MockVectorizer::failing(), cache.clone());

        embedder.embed_one("hello").await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_unavailable_vectorizer_degrades_to_zero() {
        let handle = Arc::new(VectorizerHandle::new(|| async {
            Err(EmbeddingError::ApiRequest("no backend".to_string()))
        }));
        let embedder = BatchEmbedder::new(Arc::new(EmbeddingCache::new(100)), handle);

        let results = embedder.embed_batch(&["hello".to_string()]).await;
        assert!(is_zero_embedding(&results[0]));
    }
}
