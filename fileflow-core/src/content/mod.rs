//! Content classification engine
//!
//! Fingerprints files by content, scores how similar two fingerprints are,
//! and labels files against a registry of classifications.

pub mod analyzer;
pub mod classifier;
pub mod mime;
pub mod registry;
pub mod signature;
pub mod similarity;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use analyzer::{AnalyzerConfig, ContentAnalyzer, RelatedFile};
pub use classifier::ClassificationMatcher;
pub use registry::{ClassificationRegistry, MemoryClassificationRegistry};
pub use signature::SignatureGenerator;
pub use similarity::SimilarityScorer;
pub use store::{ContentStore, MemoryContentStore};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Classification not found: {0}")]
    ClassificationNotFound(String),

    #[error("Cannot delete system classification: {0}")]
    ProtectedClassification(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{operation} failed (path: {path:?}): {source}")]
    Repository {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: Box<ContentError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ContentError>;

/// Attach operation and path context to store and registry failures
pub(crate) trait RepositoryContext<T> {
    fn repo_context(self, operation: &'static str, path: &Path) -> Result<T>;
}

impl<T> RepositoryContext<T> for Result<T> {
    fn repo_context(self, operation: &'static str, path: &Path) -> Result<T> {
        self.map_err(|e| ContentError::Repository {
            operation,
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }
}

/// Broad content family a signature was derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureType {
    Text,
    Image,
    Document,
    Binary,
    Generic,
}

impl SignatureType {
    /// Derive the signature type from a MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("text/") {
            SignatureType::Text
        } else if mime.starts_with("image/") {
            SignatureType::Image
        } else if ["document", "pdf", "msword", "officedocument"].iter().any(|k| mime.contains(k)) {
            SignatureType::Document
        } else if mime.starts_with("application/") {
            SignatureType::Binary
        } else {
            SignatureType::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Text => "text",
            SignatureType::Image => "image",
            SignatureType::Document => "document",
            SignatureType::Binary => "binary",
            SignatureType::Generic => "generic",
        }
    }
}

/// A type-specific fingerprint of a file's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSignature {
    pub id: String,
    pub file_path: PathBuf,
    pub mime_type: String,
    pub signature_type: SignatureType,
    /// JSON term-frequency map for text, hex SHA-256 digest otherwise
    pub signature: String,
    /// Most frequent terms, text only
    #[serde(default)]
    pub keywords: Vec<String>,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a file must look like to carry a classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCriteria {
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Case-insensitive substrings of the file name
    #[serde(default)]
    pub name_patterns: Vec<String>,
    /// Exact MIME types or `type/*` wildcards
    #[serde(default)]
    pub mime_types: Vec<String>,
    /// Substrings searched for in the signature payload
    #[serde(default)]
    pub content_signatures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

/// A named rule set used to label files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileClassification {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria: ClassificationCriteria,
    pub confidence_threshold: f64,
    /// Built-in classifications cannot be deleted
    #[serde(default)]
    pub system_defined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMatch {
    pub file_path: PathBuf,
    pub classification_id: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Coarse label for a similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Identical,
    NearlyIdentical,
    VerySimilar,
    Similar,
    SomewhatSimilar,
    Different,
    DifferentTypes,
}

impl RelationType {
    /// Label a text similarity score
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            RelationType::NearlyIdentical
        } else if score >= 0.7 {
            RelationType::VerySimilar
        } else if score >= 0.5 {
            RelationType::Similar
        } else if score >= 0.3 {
            RelationType::SomewhatSimilar
        } else {
            RelationType::Different
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Identical => "identical",
            RelationType::NearlyIdentical => "nearly_identical",
            RelationType::VerySimilar => "very_similar",
            RelationType::Similar => "similar",
            RelationType::SomewhatSimilar => "somewhat_similar",
            RelationType::Different => "different",
            RelationType::DifferentTypes => "different_types",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRelationship {
    pub source_id: String,
    pub target_id: String,
    pub similarity: f64,
    pub relation_type: RelationType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentGroupMember {
    pub signature_id: String,
    pub file_path: PathBuf,
    pub membership_score: f64,
}

/// A named collection of related signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub members: Vec<ContentGroupMember>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_type_from_mime() {
        assert_eq!(SignatureType::from_mime("text/plain; charset=utf-8"), SignatureType::Text);
        assert_eq!(SignatureType::from_mime("image/png"), SignatureType::Image);
        assert_eq!(SignatureType::from_mime("application/pdf"), SignatureType::Document);
        assert_eq!(SignatureType::from_mime("application/msword"), SignatureType::Document);
        assert_eq!(
            SignatureType::from_mime(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            SignatureType::Document
        );
        assert_eq!(SignatureType::from_mime("application/zip"), SignatureType::Binary);
        assert_eq!(SignatureType::from_mime("audio/mpeg"), SignatureType::Generic);
    }

    #[test]
    fn test_relation_thresholds() {
        assert_eq!(RelationType::from_score(0.95), RelationType::NearlyIdentical);
        assert_eq!(RelationType::from_score(0.9), RelationType::NearlyIdentical);
        assert_eq!(RelationType::from_score(0.7), RelationType::VerySimilar);
        assert_eq!(RelationType::from_score(0.5), RelationType::Similar);
        assert_eq!(RelationType::from_score(0.3), RelationType::SomewhatSimilar);
        assert_eq!(RelationType::from_score(0.29), RelationType::Different);
        assert_eq!(RelationType::NearlyIdentical.to_string(), "nearly_identical");
    }

    #[test]
    fn test_repository_context() {
        let failed: Result<()> = Err(ContentError::Storage("locked".to_string()));
        let err = failed.repo_context("save_signature", Path::new("/a/b.txt")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("save_signature"));
        assert!(message.contains("/a/b.txt"));
    }
}
