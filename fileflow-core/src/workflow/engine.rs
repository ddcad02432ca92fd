//! Workflow dispatcher
//!
//! Owns the in-memory workflow list and routes change events through the rule
//! evaluator and action executor. Edits persist to the store first and only then
//! replace the in-memory list; dispatch works on an immutable snapshot taken once
//! per event, so a concurrent edit never tears an evaluation.

use super::{
    ActionExecutor, ExecutionSummary, FileMetadata, Result, RuleEvaluator, RuleOutcome, Workflow,
    WorkflowError, WorkflowResult, WorkflowStore,
    rules::{is_ignored_path, trigger_for},
};
use crate::monitor::FileChange;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub struct WorkflowEngine {
    workflows: RwLock<Arc<Vec<Workflow>>>,
    store: Arc<dyn WorkflowStore>,
    rules: RuleEvaluator,
    executor: ActionExecutor,
    dry_run: AtomicBool,
}

impl WorkflowEngine {
    /// Create an engine with an empty workflow list; call [`load`](Self::load) to read the store
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self::with_executor(store, ActionExecutor::new())
    }

    pub fn with_executor(store: Arc<dyn WorkflowStore>, executor: ActionExecutor) -> Self {
        Self {
            workflows: RwLock::new(Arc::new(Vec::new())),
            store,
            rules: RuleEvaluator::new(),
            executor,
            dry_run: AtomicBool::new(false),
        }
    }

    /// Replace the in-memory list with the store's contents
    pub async fn load(&self) -> Result<usize> {
        let loaded = self.store.load_all()?;
        let count = loaded.len();
        *self.workflows.write().await = Arc::new(loaded);
        info!("Loaded {} workflows", count);
        Ok(count)
    }

    pub fn set_dry_run(&self, enabled: bool) {
        self.dry_run.store(enabled, Ordering::SeqCst);
        info!("Dry run {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    pub async fn add_workflow(&self, workflow: Workflow) -> Result<()> {
        workflow.validate()?;
        let mut guard = self.workflows.write().await;
        if guard.iter().any(|w| w.id == workflow.id) {
            return Err(WorkflowError::AlreadyExists(workflow.id));
        }

        self.store.save(&workflow)?;
        let mut next = Vec::clone(&guard);
        info!("Added workflow '{}' ({})", workflow.id, workflow.name);
        next.push(workflow);
        *guard = Arc::new(next);
        Ok(())
    }

    pub async fn update_workflow(&self, mut workflow: Workflow) -> Result<()> {
        workflow.validate()?;
        let mut guard = self.workflows.write().await;
        let index = guard
            .iter()
            .position(|w| w.id == workflow.id)
            .ok_or_else(|| WorkflowError::NotFound(workflow.id.clone()))?;

        workflow.updated_at = Utc::now();
        self.store.save(&workflow)?;
        let mut next = Vec::clone(&guard);
        info!("Updated workflow '{}'", workflow.id);
        next[index] = workflow;
        *guard = Arc::new(next);
        Ok(())
    }

    pub async fn delete_workflow(&self, id: &str) -> Result<()> {
        let mut guard = self.workflows.write().await;
        let index = guard
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

        self.store.delete(id)?;
        let mut next = Vec::clone(&guard);
        next.remove(index);
        *guard = Arc::new(next);
        info!("Deleted workflow '{}'", id);
        Ok(())
    }

    /// Enable or disable a workflow by ID
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut workflow =
            self.get_workflow(id).await.ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        workflow.enabled = enabled;
        self.update_workflow(workflow).await
    }

    pub async fn get_workflows(&self) -> Vec<Workflow> {
        self.snapshot().await.as_ref().clone()
    }

    pub async fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.snapshot().await.iter().find(|w| w.id == id).cloned()
    }

    async fn snapshot(&self) -> Arc<Vec<Workflow>> {
        self.workflows.read().await.clone()
    }

    /// Route one change event through every workflow in list order.
    ///
    /// Returns `Ok(true)` when at least one workflow ran. Every matching workflow
    /// runs against the event's original path, even if an earlier one moved the
    /// file. The first workflow whose actions fail ends the pass and its error is
    /// returned; workflows after it are not attempted.
    pub async fn process_event(&self, change: &FileChange) -> Result<bool> {
        let path = change.path.as_path();
        if is_ignored_path(path) {
            debug!("Ignoring temp or hidden file {:?}", path);
            return Ok(false);
        }
        if trigger_for(change.change_type).is_none() {
            return Ok(false);
        }

        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("File vanished before processing: {:?}", path);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Ok(false);
        }
        let meta = FileMetadata::from(&meta);

        let workflows = self.snapshot().await;
        let dry_run = self.is_dry_run();
        let mut processed = false;

        for workflow in workflows.iter() {
            match self.rules.evaluate(workflow, change.change_type, path, &meta) {
                RuleOutcome::Matched => {}
                RuleOutcome::InvalidPattern(_) => continue,
                outcome => {
                    debug!("Workflow '{}' skipped for {:?}: {:?}", workflow.id, path, outcome);
                    continue;
                }
            }

            info!("Workflow '{}' triggered by {:?}", workflow.id, path);
            processed = true;
            match self.executor.execute(&workflow.actions, path, dry_run).await {
                Ok(summary) => {
                    let result = success_result(workflow, path, &summary, dry_run);
                    info!("Workflow '{}' completed: {}", workflow.id, result.message);
                }
                Err(e) => {
                    let result = failure_result(workflow, path, &e);
                    error!(
                        "Workflow '{}' failed for {:?}: {}",
                        result.workflow_id,
                        result.file_path,
                        result.error.as_deref().unwrap_or_default()
                    );
                    return Err(WorkflowError::Execution {
                        workflow_id: workflow.id.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(processed)
    }

    /// Run a workflow by hand, skipping the trigger and pattern checks but not the conditions
    pub async fn execute_workflow(&self, id: &str, path: &Path) -> Result<WorkflowResult> {
        let workflow =
            self.get_workflow(id).await.ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        let meta = fs::metadata(path).await?;
        let meta = FileMetadata::from(&meta);

        if !self.rules.conditions_met(&workflow, path, &meta) {
            warn!("Conditions of workflow '{}' not met for {:?}", id, path);
            return Ok(WorkflowResult {
                workflow_id: workflow.id.clone(),
                workflow_name: workflow.name.clone(),
                file_path: path.to_path_buf(),
                success: false,
                message: "Conditions not met".to_string(),
                error: None,
            });
        }

        let dry_run = self.is_dry_run();
        let result = match self.executor.execute(&workflow.actions, path, dry_run).await {
            Ok(summary) => success_result(&workflow, path, &summary, dry_run),
            Err(e) => {
                error!("Workflow '{}' failed for {:?}: {}", id, path, e);
                failure_result(&workflow, path, &e)
            }
        };
        Ok(result)
    }
}

fn success_result(
    workflow: &Workflow,
    path: &Path,
    summary: &ExecutionSummary,
    dry_run: bool,
) -> WorkflowResult {
    let prefix = if dry_run { "Dry run" } else { "Executed" };
    WorkflowResult {
        workflow_id: workflow.id.clone(),
        workflow_name: workflow.name.clone(),
        file_path: path.to_path_buf(),
        success: true,
        message: format!(
            "{prefix} {} action(s): {}",
            summary.actions_run,
            summary.steps.join("; ")
        ),
        error: None,
    }
}

fn failure_result(workflow: &Workflow, path: &Path, err: &WorkflowError) -> WorkflowResult {
    WorkflowResult {
        workflow_id: workflow.id.clone(),
        workflow_name: workflow.name.clone(),
        file_path: path.to_path_buf(),
        success: false,
        message: format!("Workflow '{}' failed", workflow.name),
        error: Some(err.to_string()),
    }
}
