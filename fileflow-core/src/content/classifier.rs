//! Confidence-weighted classification matching
//!
//! A file earns points per criterion it satisfies. Files with a signature
//! can also borrow classifications from similar files.

use super::{
    ClassificationMatch, ClassificationRegistry, ContentSignature, ContentStore, FileClassification,
    RepositoryContext, Result, SimilarityScorer,
};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

const EXTENSION_WEIGHT: f64 = 0.4;
const NAME_WEIGHT: f64 = 0.3;
const MIME_WEIGHT: f64 = 0.2;
const CONTENT_WEIGHT: f64 = 0.1;

/// Absorbs rounding in summed weights when comparing against thresholds
const EPSILON: f64 = 1e-9;

pub struct ClassificationMatcher {
    registry: Arc<dyn ClassificationRegistry>,
    store: Arc<dyn ContentStore>,
    scorer: SimilarityScorer,
    related_min_similarity: f64,
    related_limit: usize,
}

impl ClassificationMatcher {
    pub fn new(registry: Arc<dyn ClassificationRegistry>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            registry,
            store,
            scorer: SimilarityScorer::new(),
            related_min_similarity: 0.7,
            related_limit: 5,
        }
    }

    /// Tune which similar files classifications may be borrowed from
    pub fn with_related(mut self, min_similarity: f64, limit: usize) -> Self {
        self.related_min_similarity = min_similarity;
        self.related_limit = limit;
        self
    }

    /// Classify a file, returning cached matches when any were recorded.
    ///
    /// Cached matches are never invalidated here; clear them through the store
    /// to force a fresh evaluation.
    pub async fn classify(
        &self,
        path: &Path,
        signature: Option<&ContentSignature>,
    ) -> Result<Vec<ClassificationMatch>> {
        let cached = self.store.get_matches(path).repo_context("get_matches", path)?;
        if !cached.is_empty() {
            trace!("Using {} cached classification matches for {:?}", cached.len(), path);
            return Ok(cached);
        }

        let matches = self.evaluate(path, signature).await?;
        if !matches.is_empty() {
            self.store.save_matches(path, &matches).repo_context("save_matches", path)?;
        }
        debug!("Classified {:?} with {} matches", path, matches.len());
        Ok(matches)
    }

    /// Score every registered classification without consulting the cache
    pub async fn evaluate(
        &self,
        path: &Path,
        signature: Option<&ContentSignature>,
    ) -> Result<Vec<ClassificationMatch>> {
        let classifications = self.registry.list().repo_context("list_classifications", path)?;
        let size = match signature {
            Some(sig) => Some(sig.file_size),
            None => tokio::fs::metadata(path).await.ok().map(|m| m.len()),
        };

        let mut matches = Vec::new();
        for classification in &classifications {
            if !within_size_bounds(classification, size) {
                trace!("{:?} outside size bounds of '{}'", path, classification.id);
                continue;
            }
            let confidence = score(classification, path, signature);
            if confidence > 0.0 && confidence + EPSILON >= classification.confidence_threshold {
                matches.push(new_match(path, &classification.id, confidence.min(1.0)));
            }
        }

        if let Some(sig) = signature {
            self.borrow_from_related(path, sig, size, &mut matches)?;
        }

        matches.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.classification_id.cmp(&b.classification_id))
        });
        Ok(matches)
    }

    /// Add classifications held by similar files, weighted by similarity
    fn borrow_from_related(
        &self,
        path: &Path,
        signature: &ContentSignature,
        size: Option<u64>,
        matches: &mut Vec<ClassificationMatch>,
    ) -> Result<()> {
        let candidates = self.store.list_signatures().repo_context("list_signatures", path)?;
        let related = self.scorer.rank(
            signature,
            &candidates,
            self.related_min_similarity,
            self.related_limit,
        );

        for (other, similarity, _) in related {
            let their_matches = self
                .store
                .get_matches(&other.file_path)
                .repo_context("get_matches", &other.file_path)?;
            for theirs in their_matches {
                if matches.iter().any(|m| m.classification_id == theirs.classification_id) {
                    continue;
                }
                let Ok(classification) = self.registry.get(&theirs.classification_id) else {
                    continue;
                };
                if !within_size_bounds(&classification, size) {
                    continue;
                }
                let borrowed = theirs.confidence * similarity;
                if borrowed + EPSILON >= classification.confidence_threshold {
                    debug!(
                        "{:?} borrows '{}' from {:?} at {:.2}",
                        path, classification.id, other.file_path, borrowed
                    );
                    matches.push(new_match(path, &classification.id, borrowed));
                }
            }
        }
        Ok(())
    }
}

fn new_match(path: &Path, classification_id: &str, confidence: f64) -> ClassificationMatch {
    ClassificationMatch {
        file_path: path.to_path_buf(),
        classification_id: classification_id.to_string(),
        confidence,
        timestamp: Utc::now(),
    }
}

/// Unknown sizes only pass classifications without bounds
fn within_size_bounds(classification: &FileClassification, size: Option<u64>) -> bool {
    let criteria = &classification.criteria;
    if criteria.min_size.is_none() && criteria.max_size.is_none() {
        return true;
    }
    let Some(size) = size else {
        return false;
    };
    criteria.min_size.is_none_or(|min| size >= min)
        && criteria.max_size.is_none_or(|max| size <= max)
}

/// Accumulated criterion weights for one classification
fn score(
    classification: &FileClassification,
    path: &Path,
    signature: Option<&ContentSignature>,
) -> f64 {
    let criteria = &classification.criteria;
    let mut confidence = 0.0;

    let extension =
        path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
    if !extension.is_empty()
        && criteria.extensions.iter().any(|e| e.trim_start_matches('.').to_lowercase() == extension)
    {
        confidence += EXTENSION_WEIGHT;
    }

    let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    if criteria.name_patterns.iter().any(|p| !p.is_empty() && name.contains(&p.to_lowercase())) {
        confidence += NAME_WEIGHT;
    }

    if let Some(sig) = signature {
        if criteria.mime_types.iter().any(|m| mime_matches(m, &sig.mime_type)) {
            confidence += MIME_WEIGHT;
        }
        let payload = sig.signature.to_lowercase();
        if criteria
            .content_signatures
            .iter()
            .any(|c| !c.is_empty() && payload.contains(&c.to_lowercase()))
        {
            confidence += CONTENT_WEIGHT;
        }
    }

    confidence
}

/// Compare MIME essences, ignoring parameters; `type/*` matches any subtype
fn mime_matches(pattern: &str, mime: &str) -> bool {
    let essence = |m: &str| m.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let (pattern, mime) = (essence(pattern), essence(mime));
    match pattern.strip_suffix("/*") {
        Some(top_level) => mime.split('/').next() == Some(top_level),
        None => pattern == mime,
    }
}
