//! Similarity computation and top-k ranking.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{Embedding, ZERO_NORM_EPSILON};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Mismatched lengths and near-zero vectors score 0.0; similarity against a
/// degenerate vector carries no information, and ranking must not fail on
/// one bad corpus entry.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < ZERO_NORM_EPSILON || norm_b < ZERO_NORM_EPSILON {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// A ranked similarity result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// ID of the matched item.
    pub id: String,

    /// Cosine similarity score in [-1.0, 1.0].
    pub score: f32,
}

impl RankedResult {
    /// Create a new ranked result.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Rank a corpus against a query embedding, returning the top-k by
/// descending cosine similarity.
///
/// A zero-vector query (the sentinel for unembeddable input) and an empty
/// corpus both yield an empty result: a zero vector has no direction and
/// must not rank as "similar to everything". Corpus entries with a
/// near-zero or mismatched embedding stay in the pool with score 0.0.
///
/// When the corpus is larger than `top_k`, a partial selection finds the
/// top-k in O(n) expected time before sorting only that subset. Ties break
/// by original corpus order.
pub fn rank(query: &[f32], corpus: &[(String, Embedding)], top_k: usize) -> Vec<RankedResult> {
    if top_k == 0 || corpus.is_empty() {
        return Vec::new();
    }

    let query_norm: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
    if query_norm < ZERO_NORM_EPSILON {
        return Vec::new();
    }

    let mut scored: Vec<(OrderedFloat<f32>, usize)> = corpus
        .iter()
        .enumerate()
        .map(|(index, (_, embedding))| {
            let score = if embedding.len() != query.len() {
                0.0
            } else {
                let dot: f32 = query.iter().zip(embedding.iter()).map(|(x, y)| x * y).sum();
                let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm < ZERO_NORM_EPSILON {
                    0.0
                } else {
                    dot / (query_norm * norm)
                }
            };
            (OrderedFloat(score), index)
        })
        .collect();

    // Total order: score descending, then original corpus position. The
    // index component makes every comparison decisive, so unstable sorting
    // still produces deterministic, input-order-stable ties.
    let by_score_then_position =
        |a: &(OrderedFloat<f32>, usize), b: &(OrderedFloat<f32>, usize)| {
            b.0.cmp(&a.0).then(a.1.cmp(&b.1))
        };

    let k = top_k.min(scored.len());
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_score_then_position);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_score_then_position);

    scored
        .into_iter()
        .map(|(score, index)| RankedResult::new(corpus[index].0.clone(), score.0))
        .collect()
}
