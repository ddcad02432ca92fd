//! Rule evaluation and execution engine
//!
//! A workflow pairs one trigger with an AND-combined list of conditions and an
//! ordered list of actions. When a file-system change arrives, the engine:
//! - filters editor temp files and vanished files
//! - matches the trigger type and optional glob pattern
//! - evaluates every condition against the file's metadata
//! - runs the actions in order, stopping at the first failure

pub mod actions;
pub mod builder;
pub mod condition;
pub mod engine;
pub mod rules;
pub mod store;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub use actions::{ActionExecutor, CommandRunner, ExecutionSummary, LoggingCommandRunner};
pub use builder::WorkflowBuilder;
pub use condition::{ConditionEvaluator, FileMetadata};
pub use engine::WorkflowEngine;
pub use rules::{RuleEvaluator, RuleOutcome};
pub use store::{FileWorkflowStore, MemoryWorkflowStore, WorkflowStore};

/// Option key: create the destination directory of a move or copy if missing
pub const OPTION_CREATE_TARGET_DIR: &str = "createTargetDir";
/// Option key: replace an existing destination instead of uniquifying the name
pub const OPTION_OVERWRITE: &str = "overwrite";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Validation(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow already exists: {0}")]
    AlreadyExists(String),

    #[error("{action:?} action failed for {path:?}: {source}")]
    ActionFailed {
        action: ActionType,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Workflow '{workflow_id}' failed: {source}")]
    Execution {
        workflow_id: String,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// A named, enable-able automation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Advisory only; workflows run in list order
    #[serde(default)]
    pub priority: i32,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Workflow {
    /// Check the invariants every stored workflow must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(WorkflowError::Validation("workflow ID is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "workflow '{}' has no name",
                self.id
            )));
        }
        if self.actions.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "workflow '{}' must have at least one action",
                self.id
            )));
        }
        Ok(())
    }

    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
        self.updated_at = Utc::now();
    }

    /// Remove the condition at `index`, returning it if it existed
    pub fn remove_condition(&mut self, index: usize) -> Option<Condition> {
        if index >= self.conditions.len() {
            return None;
        }
        self.updated_at = Utc::now();
        Some(self.conditions.remove(index))
    }

    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
        self.updated_at = Utc::now();
    }

    /// Remove the action at `index`, returning it if it existed
    pub fn remove_action(&mut self, index: usize) -> Option<Action> {
        if index >= self.actions.len() {
            return None;
        }
        self.updated_at = Utc::now();
        Some(self.actions.remove(index))
    }
}

/// The event class that makes a workflow eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    FileCreated,
    FileModified,
    FilePatternMatch,
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Glob matched against the full event path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Cron-like expression; not consulted by the dispatcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            pattern: None,
            schedule: None,
        }
    }

    pub fn with_pattern(trigger_type: TriggerType, pattern: impl Into<String>) -> Self {
        Self {
            trigger_type,
            pattern: Some(pattern.into()),
            schedule: None,
        }
    }

    /// The pattern, if one is set and non-blank
    pub fn active_pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    FileSize,
    FileName,
    FileType,
    FileAge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    GreaterThan,
    LessThan,
}

/// A predicate over file metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Informational label shown by editors
    #[serde(default)]
    pub field: String,
    pub operator: Operator,
    pub value: String,
    /// KB/MB/GB for sizes, minutes/hours/days for ages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_unit: Option<String>,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        let field = match condition_type {
            ConditionType::FileSize => "size",
            ConditionType::FileName => "name",
            ConditionType::FileType => "extension",
            ConditionType::FileAge => "modified",
        };
        Self {
            condition_type,
            field: field.to_string(),
            operator,
            value: value.into(),
            value_unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.value_unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Move,
    Copy,
    Rename,
    Tag,
    Delete,
    Execute,
}

/// A single file operation performed when a workflow fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Directory, new name, tag text, or command string depending on the type
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl Action {
    pub fn new(action_type: ActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Whether a boolean option is set to `true`
    pub fn option_enabled(&self, key: &str) -> bool {
        self.options.get(key).map(|v| v.trim().eq_ignore_ascii_case("true")).unwrap_or(false)
    }
}

/// Outcome of one workflow execution attempt against one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub workflow_name: String,
    pub file_path: PathBuf,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod model_tests {
    use super::*;

    fn sample() -> Workflow {
        WorkflowBuilder::new("photos", "Sort photos")
            .trigger(Trigger::with_pattern(TriggerType::FileCreated, "*.jpg"))
            .action(Action::new(ActionType::Move, "/tmp/photos"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let mut wf = sample();
        wf.id = String::new();
        assert!(matches!(wf.validate(), Err(WorkflowError::Validation(_))));

        let mut wf = sample();
        wf.name = "  ".to_string();
        assert!(matches!(wf.validate(), Err(WorkflowError::Validation(_))));

        let mut wf = sample();
        wf.actions.clear();
        assert!(matches!(wf.validate(), Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn test_add_and_remove_steps() {
        let mut wf = sample();
        wf.add_condition(Condition::new(ConditionType::FileSize, Operator::GreaterThan, "1"));
        wf.add_action(Action::new(ActionType::Tag, "photo"));
        assert_eq!(wf.conditions.len(), 1);
        assert_eq!(wf.actions.len(), 2);

        assert!(wf.remove_condition(3).is_none());
        assert!(wf.remove_condition(0).is_some());
        assert_eq!(wf.remove_action(1).map(|a| a.action_type), Some(ActionType::Tag));
        assert!(wf.conditions.is_empty());
    }

    #[test]
    fn test_option_parsing() {
        let action = Action::new(ActionType::Copy, "/dest")
            .with_option(OPTION_OVERWRITE, "TRUE")
            .with_option(OPTION_CREATE_TARGET_DIR, "no");
        assert!(action.option_enabled(OPTION_OVERWRITE));
        assert!(!action.option_enabled(OPTION_CREATE_TARGET_DIR));
        assert!(!action.option_enabled("missing"));
    }

    #[test]
    fn test_workflow_document_defaults() {
        let json = r#"{
            "id": "docs",
            "name": "Docs",
            "trigger": { "type": "FilePatternMatch", "pattern": "*.pdf" },
            "actions": [
                { "type": "Copy", "target": "/archive", "options": { "overwrite": "true" } }
            ]
        }"#;
        let wf: Workflow = serde_json::from_str(json).unwrap();
        assert!(wf.enabled);
        assert_eq!(wf.priority, 0);
        assert!(wf.conditions.is_empty());
        assert_eq!(wf.trigger.active_pattern(), Some("*.pdf"));
        assert!(wf.actions[0].option_enabled(OPTION_OVERWRITE));
        wf.validate().unwrap();
    }
}
