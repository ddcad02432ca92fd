//! Content analysis facade
//!
//! Ties signature generation, similarity scoring, and classification to the
//! content store so callers work in terms of file paths.

use super::{
    ClassificationMatch, ClassificationMatcher, ClassificationRegistry, ContentError, ContentGroup,
    ContentGroupMember, ContentRelationship, ContentSignature, ContentStore, FileClassification,
    MemoryClassificationRegistry, MemoryContentStore, RelationType, RepositoryContext, Result,
    SignatureGenerator, SimilarityScorer,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Minimum similarity for a file to lend its classifications
    pub related_min_similarity: f64,
    /// Maximum number of similar files consulted when classifying
    pub related_limit: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            related_min_similarity: 0.7,
            related_limit: 5,
        }
    }
}

/// A stored file found similar to the one being analyzed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedFile {
    pub path: PathBuf,
    pub signature_id: String,
    pub similarity: f64,
    pub relation_type: RelationType,
}

pub struct ContentAnalyzer {
    generator: SignatureGenerator,
    scorer: SimilarityScorer,
    matcher: ClassificationMatcher,
    registry: Arc<dyn ClassificationRegistry>,
    store: Arc<dyn ContentStore>,
}

impl ContentAnalyzer {
    pub fn new(
        registry: Arc<dyn ClassificationRegistry>,
        store: Arc<dyn ContentStore>,
        config: AnalyzerConfig,
    ) -> Self {
        let matcher = ClassificationMatcher::new(registry.clone(), store.clone())
            .with_related(config.related_min_similarity, config.related_limit);
        Self {
            generator: SignatureGenerator::new(),
            scorer: SimilarityScorer::new(),
            matcher,
            registry,
            store,
        }
    }

    /// Analyzer over built-in classifications and a non-persistent store
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryClassificationRegistry::with_builtins()),
            Arc::new(MemoryContentStore::new()),
            AnalyzerConfig::default(),
        )
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Generate a signature for `path` and record it.
    ///
    /// A path that was analyzed before keeps its signature ID and creation time.
    pub async fn analyze_file(&self, path: &Path) -> Result<ContentSignature> {
        let mut signature = self.generator.generate(path).await?;
        if let Some(existing) =
            self.store.get_signature_by_path(path).repo_context("get_signature_by_path", path)?
        {
            signature.id = existing.id;
            signature.created_at = existing.created_at;
        }
        self.store.save_signature(&signature).repo_context("save_signature", path)?;
        debug!("Analyzed {:?} ({}, {} bytes)", path, signature.mime_type, signature.file_size);
        Ok(signature)
    }

    pub fn compare_similarity(
        &self,
        a: &ContentSignature,
        b: &ContentSignature,
    ) -> (f64, RelationType) {
        self.scorer.compare(a, b)
    }

    /// Analyze two files and compare their signatures
    pub async fn compare_files(&self, a: &Path, b: &Path) -> Result<(f64, RelationType)> {
        let first = self.analyze_file(a).await?;
        let second = self.analyze_file(b).await?;
        Ok(self.compare_similarity(&first, &second))
    }

    /// Stored files at least `min_similarity` similar to `path`, best first.
    ///
    /// Each hit is recorded as a relationship from `path` to the related file.
    pub async fn find_related_files(
        &self,
        path: &Path,
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<RelatedFile>> {
        let signature = self.analyze_file(path).await?;
        let candidates = self.store.list_signatures().repo_context("list_signatures", path)?;

        let mut related = Vec::new();
        for (other, similarity, relation_type) in
            self.scorer.rank(&signature, &candidates, min_similarity, limit)
        {
            let relationship = ContentRelationship {
                source_id: signature.id.clone(),
                target_id: other.id.clone(),
                similarity,
                relation_type,
                created_at: Utc::now(),
            };
            self.store.save_relationship(&relationship).repo_context("save_relationship", path)?;
            related.push(RelatedFile {
                path: other.file_path.clone(),
                signature_id: other.id.clone(),
                similarity,
                relation_type,
            });
        }
        Ok(related)
    }

    /// Classify a file, reusing previously recorded matches
    pub async fn classify_file(&self, path: &Path) -> Result<Vec<ClassificationMatch>> {
        let cached = self.store.get_matches(path).repo_context("get_matches", path)?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        let stored =
            self.store.get_signature_by_path(path).repo_context("get_signature_by_path", path)?;
        let signature = match stored {
            Some(signature) => Some(signature),
            None => self.signature_if_analyzable(path).await?,
        };
        self.matcher.classify(path, signature.as_ref()).await
    }

    /// Discard recorded matches, re-analyze, and classify again
    pub async fn reclassify_file(&self, path: &Path) -> Result<Vec<ClassificationMatch>> {
        self.store.clear_matches(path).repo_context("clear_matches", path)?;
        let signature = self.signature_if_analyzable(path).await?;
        self.matcher.classify(path, signature.as_ref()).await
    }

    /// Empty files classify on name and extension alone
    async fn signature_if_analyzable(&self, path: &Path) -> Result<Option<ContentSignature>> {
        match self.analyze_file(path).await {
            Ok(signature) => Ok(Some(signature)),
            Err(ContentError::InvalidOperation(reason)) => {
                debug!("Classifying {:?} without a signature: {}", path, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Group a file with every stored file at least `min_similarity` similar to it
    pub async fn group_related_files(
        &self,
        path: &Path,
        name: &str,
        min_similarity: f64,
    ) -> Result<ContentGroup> {
        let related = self.find_related_files(path, min_similarity, usize::MAX).await?;
        let anchor = self
            .store
            .get_signature_by_path(path)
            .repo_context("get_signature_by_path", path)?
            .ok_or_else(|| ContentError::FileNotFound(path.to_path_buf()))?;

        let mut members = vec![ContentGroupMember {
            signature_id: anchor.id,
            file_path: path.to_path_buf(),
            membership_score: 1.0,
        }];
        members.extend(related.into_iter().map(|r| ContentGroupMember {
            signature_id: r.signature_id,
            file_path: r.path,
            membership_score: r.similarity,
        }));

        let group = ContentGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: format!("Files related to {}", path.display()),
            members,
            created_at: Utc::now(),
        };
        self.store.save_group(&group).repo_context("save_group", path)?;
        info!("Created group '{}' with {} members", group.name, group.members.len());
        Ok(group)
    }

    /// Drop everything recorded for a path that no longer exists
    pub fn forget_file(&self, path: &Path) -> Result<bool> {
        let known =
            self.store.get_signature_by_path(path).repo_context("get_signature_by_path", path)?;
        if let Some(signature) = &known {
            self.store.delete_signature(&signature.id).repo_context("delete_signature", path)?;
        }
        self.store.clear_matches(path).repo_context("clear_matches", path)?;
        Ok(known.is_some())
    }

    pub fn list_classifications(&self) -> Result<Vec<FileClassification>> {
        self.registry.list()
    }
}
