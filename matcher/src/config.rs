//! Configuration for the semantic matcher.

use serde::{Deserialize, Serialize};

use checkmatch_embeddings::EMBEDDING_DIMENSION;

/// Configuration for the semantic matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Embedding engine configuration.
    pub embedding: EmbeddingConfig,

    /// Query processing configuration.
    pub query: QueryConfig,
}

impl MatcherConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
        }
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the embedding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the OpenAI-compatible embeddings endpoint.
    pub endpoint: String,

    /// API key, if the endpoint requires one.
    pub api_key: Option<String>,

    /// Model to request.
    pub model: String,

    /// Embedding dimension the model produces.
    pub dimension: usize,

    /// Number of texts per vectorizer call.
    pub batch_size: usize,

    /// Maximum number of cached embeddings.
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1".to_string(),
            api_key: None,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: EMBEDDING_DIMENSION,
            batch_size: 32,
            cache_capacity: 10000,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of matches to return.
    pub top_k: usize,

    /// Minimum similarity score for a match to be reported.
    pub min_score: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.0,
        }
    }
}
