//! Semantic matcher engine implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use checkmatch_embeddings::{
    rank, BatchEmbedder, CacheStats, Embedding, EmbeddingCache, HttpVectorizer, RankedResult,
    Vectorizer, VectorizerHandle,
};

use crate::config::{EmbeddingConfig, MatcherConfig};
use crate::error::Result;
use crate::types::{ChecklistItem, CorpusEntry};

/// Semantic matcher: ranks a corpus of reference items against free text.
///
/// This is the composition root for the embedding engine. It owns the
/// bounded cache and the lazily initialized vectorizer handle, and exposes
/// the operations upstream request handlers call:
/// - embedding checklist items for a persistence layer to store
/// - matching query text against a caller-supplied corpus
pub struct SemanticMatcher {
    /// Configuration.
    config: MatcherConfig,

    /// Embedding cache, shared with the batch embedder.
    cache: Arc<EmbeddingCache>,

    /// Lazily initialized vectorizer.
    vectorizer: Arc<VectorizerHandle>,

    /// Cache-aware batch embedder.
    embedder: BatchEmbedder,
}

impl SemanticMatcher {
    /// Create a new semantic matcher builder.
    pub fn builder() -> SemanticMatcherBuilder {
        SemanticMatcherBuilder::new()
    }

    /// Create a matcher that talks to the configured HTTP endpoint.
    pub fn new(config: MatcherConfig) -> Self {
        let vectorizer = Arc::new(http_handle(&config.embedding));
        Self::assemble(config, vectorizer)
    }

    /// Create a matcher around an injected vectorizer.
    pub fn with_vectorizer(config: MatcherConfig, vectorizer: Arc<dyn Vectorizer>) -> Self {
        Self::assemble(config, Arc::new(VectorizerHandle::preinitialized(vectorizer)))
    }

    fn assemble(config: MatcherConfig, vectorizer: Arc<VectorizerHandle>) -> Self {
        info!(
            "Initializing semantic matcher (model: {}, cache capacity: {})",
            config.embedding.model, config.embedding.cache_capacity
        );

        let cache = Arc::new(EmbeddingCache::new(config.embedding.cache_capacity));
        let embedder = BatchEmbedder::new(cache.clone(), vectorizer.clone())
            .with_batch_size(config.embedding.batch_size);

        Self {
            config,
            cache,
            vectorizer,
            embedder,
        }
    }

    /// Embed checklist items for storage.
    ///
    /// Validates every item at the boundary, then embeds their canonical
    /// texts in one cache-aware batch. The returned embeddings are in item
    /// order; an item whose text could not be embedded carries the zero
    /// sentinel.
    pub async fn embed_items(&self, items: &[ChecklistItem]) -> Result<Vec<Embedding>> {
        for item in items {
            item.validate()?;
        }

        let texts: Vec<String> = items.iter().map(ChecklistItem::embedding_text).collect();
        debug!("Embedding {} checklist items", texts.len());
        Ok(self.embedder.embed_batch(&texts).await)
    }

    /// Match free-form text against a corpus of stored embeddings.
    ///
    /// Returns up to `top_k` matches by descending cosine similarity,
    /// filtered by the configured minimum score. Unembeddable text yields
    /// an empty match list rather than an error.
    pub async fn match_text(&self, text: &str, corpus: Vec<CorpusEntry>) -> Vec<RankedResult> {
        let query = self.embedder.embed_one(text).await;
        self.rank_corpus(&query, corpus)
    }

    /// Match a checklist item against a corpus of stored embeddings.
    ///
    /// Ranks under the item's canonical embedding text, the same text
    /// [`embed_items`](Self::embed_items) stores it under.
    pub async fn match_item(
        &self,
        item: &ChecklistItem,
        corpus: Vec<CorpusEntry>,
    ) -> Result<Vec<RankedResult>> {
        item.validate()?;
        let query = self.embedder.embed_one(&item.embedding_text()).await;
        Ok(self.rank_corpus(&query, corpus))
    }

    fn rank_corpus(&self, query: &Embedding, corpus: Vec<CorpusEntry>) -> Vec<RankedResult> {
        let candidates: Vec<(String, Embedding)> = corpus
            .into_iter()
            .map(|entry| (entry.id, entry.embedding))
            .collect();

        let min_score = self.config.query.min_score;
        rank(query, &candidates, self.config.query.top_k)
            .into_iter()
            .filter(|result| result.score >= min_score)
            .collect()
    }

    /// Get the matcher configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Get matcher statistics.
    pub async fn stats(&self) -> MatcherStats {
        MatcherStats {
            cache: self.cache.stats().await,
            vectorizer_ready: self.vectorizer.is_ready(),
        }
    }
}

fn http_handle(config: &EmbeddingConfig) -> VectorizerHandle {
    let config = config.clone();
    VectorizerHandle::new(move || {
        let config = config.clone();
        async move {
            let mut vectorizer = HttpVectorizer::new()
                .with_base_url(config.endpoint)
                .with_model(config.model)
                .with_dimension(config.dimension);
            if let Some(api_key) = config.api_key {
                vectorizer = vectorizer.with_api_key(api_key);
            }
            Ok(Arc::new(vectorizer) as Arc<dyn Vectorizer>)
        }
    })
}

/// Statistics about the semantic matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherStats {
    /// Embedding cache statistics.
    pub cache: CacheStats,

    /// Whether the vectorizer has been initialized successfully.
    pub vectorizer_ready: bool,
}

/// Builder for the semantic matcher.
pub struct SemanticMatcherBuilder {
    config: MatcherConfig,
    vectorizer: Option<Arc<dyn Vectorizer>>,
}

impl SemanticMatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: MatcherConfig::default(),
            vectorizer: None,
        }
    }

    /// Set the embeddings endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.embedding.endpoint = endpoint.into();
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding.model = model.into();
        self
    }

    /// Set the number of matches to return.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config.query.top_k = top_k;
        self
    }

    /// Set the minimum similarity score for a match.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.config.query.min_score = min_score;
        self
    }

    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.embedding.cache_capacity = capacity;
        self
    }

    /// Set the vectorizer batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.embedding.batch_size = batch_size;
        self
    }

    /// Inject a vectorizer instead of the configured HTTP endpoint.
    pub fn with_vectorizer(mut self, vectorizer: Arc<dyn Vectorizer>) -> Self {
        self.vectorizer = Some(vectorizer);
        self
    }

    /// Build the matcher.
    pub fn build(self) -> SemanticMatcher {
        match self.vectorizer {
            Some(vectorizer) => SemanticMatcher::with_vectorizer(self.config, vectorizer),
            None => SemanticMatcher::new(self.config),
        }
    }
}

impl Default for SemanticMatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use checkmatch_embeddings::error::Result as EmbeddingResult;
    use checkmatch_embeddings::{zero_embedding, EMBEDDING_DIMENSION};
    use pretty_assertions::assert_eq;

    /// Deterministic vectorizer: hashes each word into a handful of
    /// dimensions, so texts sharing words land near each other.
    struct WordHashVectorizer;

    fn word_hash_embedding(text: &str) -> Embedding {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut v = zero_embedding();
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let slot = (hasher.finish() as usize) % EMBEDDING_DIMENSION;
            v[slot] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Vectorizer for WordHashVectorizer {
        fn name(&self) -> &str {
            "word-hash"
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSION
        }

        async fn encode_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            Ok(texts.iter().map(|t| word_hash_embedding(t)).collect())
        }
    }

    fn test_matcher() -> SemanticMatcher {
        SemanticMatcher::builder()
            .with_vectorizer(Arc::new(WordHashVectorizer))
            .with_top_k(3)
            .build()
    }

    fn item(id: &str, question: &str, description: &str) -> ChecklistItem {
        ChecklistItem {
            id: id.to_string(),
            category: "Security".to_string(),
            question: question.to_string(),
            description: description.to_string(),
            remediation: String::new(),
            references: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_embed_items_returns_one_embedding_per_item() {
        let matcher = test_matcher();
        let items = vec![
            item("SOL-SEC-01", "Is withdraw reentrant?", "reentrancy guards"),
            item("SOL-SEC-02", "Integer overflow?", "SafeMath arithmetic"),
        ];

        let embeddings = matcher.embed_items(&items).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), EMBEDDING_DIMENSION);
        }
    }

    #[tokio::test]
    async fn test_embed_items_rejects_invalid_item() {
        let matcher = test_matcher();
        let items = vec![item("", "Is withdraw reentrant?", "")];

        assert!(matcher.embed_items(&items).await.is_err());
    }

    #[tokio::test]
    async fn test_match_text_finds_closest_item() {
        let matcher = test_matcher();
        let items = vec![
            item("SOL-SEC-01", "Is withdraw reentrant?", "reentrancy guards"),
            item("SOL-SEC-02", "Integer overflow?", "SafeMath arithmetic"),
            item("SOL-SEC-03", "Missing access control?", "onlyOwner checks"),
        ];

        let embeddings = matcher.embed_items(&items).await.unwrap();
        let corpus: Vec<CorpusEntry> = items
            .iter()
            .zip(embeddings)
            .map(|(item, embedding)| CorpusEntry::new(item.id.clone(), embedding))
            .collect();

        let matches = matcher
            .match_text("withdraw function is reentrant", corpus)
            .await;

        assert!(!matches.is_empty());
        assert_eq!(matches[0].id, "SOL-SEC-01");
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_match_text_empty_query_yields_no_matches() {
        let matcher = test_matcher();
        let corpus = vec![CorpusEntry::new("SOL-SEC-01", word_hash_embedding("hello"))];

        let matches = matcher.match_text("   ", corpus).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_match_text_respects_top_k() {
        let matcher = test_matcher(); // top_k = 3
        let corpus: Vec<CorpusEntry> = (0..10)
            .map(|i| CorpusEntry::new(format!("item-{i}"), word_hash_embedding("shared words")))
            .collect();

        let matches = matcher.match_text("shared words", corpus).await;
        assert_eq!(matches.len(), 3);
        // Ties break by corpus order.
        assert_eq!(matches[0].id, "item-0");
    }

    #[tokio::test]
    async fn test_match_item_matches_itself() {
        let matcher = test_matcher();
        let items = vec![
            item("SOL-SEC-01", "Is withdraw reentrant?", "reentrancy guards"),
            item("SOL-SEC-02", "Integer overflow?", "SafeMath arithmetic"),
        ];

        let embeddings = matcher.embed_items(&items).await.unwrap();
        let corpus: Vec<CorpusEntry> = items
            .iter()
            .zip(embeddings)
            .map(|(item, embedding)| CorpusEntry::new(item.id.clone(), embedding))
            .collect();

        let matches = matcher.match_item(&items[0], corpus).await.unwrap();

        assert_eq!(matches[0].id, "SOL-SEC-01");
        assert!((matches[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_min_score_filters_weak_matches() {
        let matcher = SemanticMatcher::builder()
            .with_vectorizer(Arc::new(WordHashVectorizer))
            .with_top_k(10)
            .with_min_score(0.5)
            .build();

        let corpus = vec![
            CorpusEntry::new("close", word_hash_embedding("withdraw reentrancy")),
            CorpusEntry::new("far", word_hash_embedding("gas optimization loops")),
        ];

        let matches = matcher
            .match_text("withdraw reentrancy", corpus)
            .await;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "close");
    }

    #[tokio::test]
    async fn test_stats_reflect_cache_and_readiness() {
        let matcher = test_matcher();

        let before = matcher.stats().await;
        assert_eq!(before.cache.entries, 0);
        assert!(before.vectorizer_ready);

        matcher
            .match_text("withdraw reentrancy", Vec::new())
            .await;

        let after = matcher.stats().await;
        assert_eq!(after.cache.entries, 1);
    }
}
