//! Similarity scoring between content signatures

use super::{ContentSignature, RelationType, SignatureType};
use std::collections::HashMap;
use tracing::warn;

/// Compares two signatures and labels how related they are
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score two signatures in `[0, 1]` with a coarse relation label
    pub fn compare(&self, a: &ContentSignature, b: &ContentSignature) -> (f64, RelationType) {
        if a.signature_type != b.signature_type {
            return (0.0, RelationType::DifferentTypes);
        }
        if a.signature == b.signature {
            return (1.0, RelationType::Identical);
        }
        match a.signature_type {
            SignatureType::Text => {
                let score = text_similarity(&a.signature, &b.signature);
                (score, RelationType::from_score(score))
            }
            _ => (0.0, RelationType::Different),
        }
    }

    /// Rank candidates against `target`, keeping those scoring at least `min_similarity`.
    ///
    /// The target itself (same ID) is never included. Results are ordered by
    /// score descending, then path, and truncated to `limit`.
    pub fn rank<'a>(
        &self,
        target: &ContentSignature,
        candidates: impl IntoIterator<Item = &'a ContentSignature>,
        min_similarity: f64,
        limit: usize,
    ) -> Vec<(&'a ContentSignature, f64, RelationType)> {
        let mut ranked: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.id != target.id)
            .map(|c| {
                let (score, relation) = self.compare(target, c);
                (c, score, relation)
            })
            .filter(|(_, score, _)| *score >= min_similarity)
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.file_path.cmp(&b.0.file_path)));
        ranked.truncate(limit);
        ranked
    }
}

/// Dot product over the product of squared magnitudes, clamped to `[0, 1]`.
///
/// Magnitudes are not square-rooted, so large counts push scores toward zero.
fn text_similarity(a: &str, b: &str) -> f64 {
    let (Some(a), Some(b)) = (parse_frequencies(a), parse_frequencies(b)) else {
        return 0.0;
    };

    let dot: f64 = a
        .iter()
        .filter_map(|(term, count)| b.get(term).map(|other| count * other))
        .sum();
    let mag_a: f64 = a.values().map(|v| v * v).sum();
    let mag_b: f64 = b.values().map(|v| v * v).sum();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

fn parse_frequencies(payload: &str) -> Option<HashMap<String, f64>> {
    match serde_json::from_str(payload) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!("Unreadable text signature payload: {}", e);
            None
        }
    }
}
