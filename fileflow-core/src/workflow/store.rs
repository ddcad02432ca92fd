//! Workflow persistence
//!
//! One JSON document per workflow, keyed by workflow ID.

use super::{Result, Workflow, WorkflowError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Durable storage for workflow definitions
pub trait WorkflowStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Workflow>>;
    fn save(&self, workflow: &Workflow) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
}

/// Stores each workflow as `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct FileWorkflowStore {
    dir: PathBuf,
}

impl FileWorkflowStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            WorkflowError::Storage(format!("Failed to create workflow directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(WorkflowError::Validation(format!(
                "'{}' cannot be used as a file name",
                id
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl WorkflowStore for FileWorkflowStore {
    fn load_all(&self) -> Result<Vec<Workflow>> {
        let mut workflows = Vec::new();
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();

        for path in entries {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Workflow>(&content) {
                Ok(workflow) => match workflow.validate() {
                    Ok(()) => workflows.push(workflow),
                    Err(e) => warn!("Skipping invalid workflow file {:?}: {}", path, e),
                },
                Err(e) => warn!("Skipping unreadable workflow file {:?}: {}", path, e),
            }
        }

        debug!("Loaded {} workflows from {:?}", workflows.len(), self.dir);
        Ok(workflows)
    }

    fn save(&self, workflow: &Workflow) -> Result<()> {
        let path = self.path_for(&workflow.id)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(workflow)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved workflow '{}' to {:?}", workflow.id, path);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used in tests and when persistence is disabled
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: Mutex<BTreeMap<String, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Workflow>>> {
        self.workflows
            .lock()
            .map_err(|_| WorkflowError::Storage("workflow store lock poisoned".to_string()))
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn load_all(&self) -> Result<Vec<Workflow>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn save(&self, workflow: &Workflow) -> Result<()> {
        self.lock()?.insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }
}
