//! Error types for the semantic matcher.

use thiserror::Error;

/// Result type alias for matcher operations.
pub type Result<T> = std::result::Result<T, MatcherError>;

/// Errors that can occur in the semantic matcher.
#[derive(Error, Debug)]
pub enum MatcherError {
    /// Embedding engine error.
    #[error("embedding error: {0}")]
    Embedding(#[from] checkmatch_embeddings::EmbeddingError),

    /// A checklist item failed boundary validation.
    #[error("invalid checklist item: {0}")]
    InvalidItem(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
