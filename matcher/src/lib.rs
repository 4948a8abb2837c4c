//! # Semantic Matcher
//!
//! This crate wires the embedding engine to callers that want to rank a
//! corpus of reference checklist items against free-form text:
//!
//! - **Checklist Records**: Strongly-typed items validated at the boundary
//! - **Matching**: Embed a query, rank a caller-supplied corpus
//! - **Configuration**: Endpoint, model, cache and ranking knobs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Semantic Matcher                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ChecklistItem ──► embedding_text ──► BatchEmbedder            │
//! │                                             │                   │
//! │   query text ──► embed_one ─────────────────┤                   │
//! │                                             ▼                   │
//! │   corpus (id, embedding) ────────────────► rank ──► matches     │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkmatch_matcher::SemanticMatcher;
//!
//! let matcher = SemanticMatcher::builder()
//!     .with_endpoint("http://127.0.0.1:8080/v1")
//!     .with_top_k(10)
//!     .build();
//!
//! let matches = matcher.match_text("withdraw is callable reentrantly", corpus).await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::MatcherConfig;
pub use engine::{MatcherStats, SemanticMatcher};
pub use error::{MatcherError, Result};
pub use types::{ChecklistItem, CorpusEntry};

// Re-export from the embedding engine for convenience
pub use checkmatch_embeddings::{Embedding, RankedResult, EMBEDDING_DIMENSION};
