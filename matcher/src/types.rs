//! Checklist records and corpus types.

use serde::{Deserialize, Serialize};

use checkmatch_embeddings::normalize;
use checkmatch_embeddings::Embedding;

use crate::error::{MatcherError, Result};

/// A reference checklist item.
///
/// Items arrive from upstream as loosely structured data; this record pins
/// the field set and is validated at the boundary before anything enters
/// the embedding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Stable identifier, e.g. `"SOL-AM-DOSA-1"`.
    pub id: String,

    /// Category label, e.g. `"Security"`.
    pub category: String,

    /// The checklist question.
    pub question: String,

    /// Longer description of what to check.
    pub description: String,

    /// Suggested remediation.
    pub remediation: String,

    /// Reference URLs.
    #[serde(default)]
    pub references: Vec<String>,
}

impl ChecklistItem {
    /// Validate the record before it enters the engine.
    ///
    /// An item needs a non-blank identifier (matches key on it) and a
    /// non-blank question (there is nothing to embed without one).
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MatcherError::InvalidItem(
                "missing item identifier".to_string(),
            ));
        }
        if self.question.trim().is_empty() {
            return Err(MatcherError::InvalidItem(format!(
                "item '{}' has an empty question",
                self.id
            )));
        }
        Ok(())
    }

    /// The canonical text this item is embedded under.
    ///
    /// Question first (most salient), then description and remediation,
    /// prefixed with the category label when present.
    pub fn embedding_text(&self) -> String {
        normalize(
            Some(&self.category),
            &[&self.question, &self.description, &self.remediation],
        )
    }
}

/// A corpus entry to rank: an identifier and its stored embedding.
///
/// Corpora are supplied by the caller per query, sourced from whatever
/// persistence layer stores the embeddings; the matcher does not own or
/// cache them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Item identifier.
    pub id: String,

    /// Stored embedding for the item.
    pub embedding: Embedding,
}

impl CorpusEntry {
    /// Create a new corpus entry.
    pub fn new(id: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            id: id.into(),
            embedding,
        }
    }
}
