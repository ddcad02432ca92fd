//! Storage for signatures, classification matches, relationships and groups

use super::{
    ClassificationMatch, ContentError, ContentGroup, ContentRelationship, ContentSignature, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Persistence for everything the content analyzer derives
pub trait ContentStore: Send + Sync {
    fn save_signature(&self, signature: &ContentSignature) -> Result<()>;
    fn get_signature(&self, id: &str) -> Result<Option<ContentSignature>>;
    fn get_signature_by_path(&self, path: &Path) -> Result<Option<ContentSignature>>;
    fn list_signatures(&self) -> Result<Vec<ContentSignature>>;
    /// Also drops relationships that reference the signature
    fn delete_signature(&self, id: &str) -> Result<()>;

    /// Replace the matches recorded for a file
    fn save_matches(&self, path: &Path, matches: &[ClassificationMatch]) -> Result<()>;
    fn get_matches(&self, path: &Path) -> Result<Vec<ClassificationMatch>>;
    fn clear_matches(&self, path: &Path) -> Result<()>;

    /// Insert or replace the relationship between a source and target pair
    fn save_relationship(&self, relationship: &ContentRelationship) -> Result<()>;
    fn relationships_for(&self, signature_id: &str) -> Result<Vec<ContentRelationship>>;

    fn save_group(&self, group: &ContentGroup) -> Result<()>;
    fn get_group(&self, id: &str) -> Result<Option<ContentGroup>>;
    fn list_groups(&self) -> Result<Vec<ContentGroup>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ContentState {
    #[serde(default)]
    signatures: BTreeMap<String, ContentSignature>,
    /// Keyed by file path
    #[serde(default)]
    matches: BTreeMap<String, Vec<ClassificationMatch>>,
    #[serde(default)]
    relationships: Vec<ContentRelationship>,
    #[serde(default)]
    groups: BTreeMap<String, ContentGroup>,
}

/// In-memory store with an optional JSON snapshot on disk
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    state: Mutex<ContentState>,
    snapshot: Option<PathBuf>,
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path` if it exists; every mutation rewrites it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let state: ContentState = serde_json::from_str(&content)?;
            info!("Loaded {} signatures from {:?}", state.signatures.len(), path);
            state
        } else {
            ContentState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ContentState>> {
        self.state
            .lock()
            .map_err(|_| ContentError::Storage("content store lock poisoned".to_string()))
    }

    /// Apply a mutation and persist the result
    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ContentState),
    {
        let mut state = self.lock()?;
        f(&mut state);
        self.persist(&state)
    }

    fn persist(&self, state: &ContentState) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, path)?;
        debug!("Wrote content snapshot {:?}", path);
        Ok(())
    }
}

impl ContentStore for MemoryContentStore {
    fn save_signature(&self, signature: &ContentSignature) -> Result<()> {
        self.mutate(|state| {
            state.signatures.insert(signature.id.clone(), signature.clone());
        })
    }

    fn get_signature(&self, id: &str) -> Result<Option<ContentSignature>> {
        Ok(self.lock()?.signatures.get(id).cloned())
    }

    fn get_signature_by_path(&self, path: &Path) -> Result<Option<ContentSignature>> {
        Ok(self.lock()?.signatures.values().find(|s| s.file_path == path).cloned())
    }

    fn list_signatures(&self) -> Result<Vec<ContentSignature>> {
        Ok(self.lock()?.signatures.values().cloned().collect())
    }

    fn delete_signature(&self, id: &str) -> Result<()> {
        self.mutate(|state| {
            state.signatures.remove(id);
            state.relationships.retain(|r| r.source_id != id && r.target_id != id);
        })
    }

    fn save_matches(&self, path: &Path, matches: &[ClassificationMatch]) -> Result<()> {
        self.mutate(|state| {
            state.matches.insert(path_key(path), matches.to_vec());
        })
    }

    fn get_matches(&self, path: &Path) -> Result<Vec<ClassificationMatch>> {
        Ok(self.lock()?.matches.get(&path_key(path)).cloned().unwrap_or_default())
    }

    fn clear_matches(&self, path: &Path) -> Result<()> {
        self.mutate(|state| {
            state.matches.remove(&path_key(path));
        })
    }

    fn save_relationship(&self, relationship: &ContentRelationship) -> Result<()> {
        self.mutate(|state| {
            state.relationships.retain(|r| {
                !(r.source_id == relationship.source_id && r.target_id == relationship.target_id)
            });
            state.relationships.push(relationship.clone());
        })
    }

    fn relationships_for(&self, signature_id: &str) -> Result<Vec<ContentRelationship>> {
        Ok(self
            .lock()?
            .relationships
            .iter()
            .filter(|r| r.source_id == signature_id || r.target_id == signature_id)
            .cloned()
            .collect())
    }

    fn save_group(&self, group: &ContentGroup) -> Result<()> {
        self.mutate(|state| {
            state.groups.insert(group.id.clone(), group.clone());
        })
    }

    fn get_group(&self, id: &str) -> Result<Option<ContentGroup>> {
        Ok(self.lock()?.groups.get(id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<ContentGroup>> {
        Ok(self.lock()?.groups.values().cloned().collect())
    }
}
