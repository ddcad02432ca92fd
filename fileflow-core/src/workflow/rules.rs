//! Trigger, pattern and condition matching for incoming change events

use super::{ConditionEvaluator, FileMetadata, TriggerType, Workflow};
use crate::monitor::ChangeType;
use globset::Glob;
use std::path::Path;
use tracing::{debug, warn};

/// Why a workflow did or did not fire for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Matched,
    Disabled,
    TriggerMismatch,
    PatternMismatch,
    /// The trigger pattern failed to compile; only this workflow is skipped
    InvalidPattern(String),
    ConditionsNotMet,
}

impl RuleOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, RuleOutcome::Matched)
    }
}

/// Editor temp files and dotfiles never reach the workflows
pub fn is_ignored_path(path: &Path) -> bool {
    match path.file_name() {
        Some(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || name.ends_with('~')
        }
        None => true,
    }
}

/// The trigger type a change event maps to, if any
pub fn trigger_for(change_type: ChangeType) -> Option<TriggerType> {
    match change_type {
        ChangeType::Created => Some(TriggerType::FileCreated),
        ChangeType::Modified => Some(TriggerType::FileModified),
        _ => None,
    }
}

/// Decides which workflows an event triggers
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEvaluator {
    conditions: ConditionEvaluator,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        Self {
            conditions: ConditionEvaluator::new(),
        }
    }

    /// Run every filter stage for one workflow, stopping at the first that rejects
    pub fn evaluate(
        &self,
        workflow: &Workflow,
        change_type: ChangeType,
        path: &Path,
        meta: &FileMetadata,
    ) -> RuleOutcome {
        if !workflow.enabled {
            return RuleOutcome::Disabled;
        }
        if !self.trigger_matches(workflow, change_type) {
            return RuleOutcome::TriggerMismatch;
        }
        match self.pattern_matches(workflow, path) {
            Ok(true) => {}
            Ok(false) => return RuleOutcome::PatternMismatch,
            Err(e) => {
                warn!("Invalid pattern in workflow '{}': {}", workflow.id, e);
                return RuleOutcome::InvalidPattern(e.to_string());
            }
        }
        if !self.conditions_met(workflow, path, meta) {
            debug!("Conditions of workflow '{}' not met for {:?}", workflow.id, path);
            return RuleOutcome::ConditionsNotMet;
        }
        RuleOutcome::Matched
    }

    /// Exact trigger-type match, or a pattern trigger on create/modify
    pub fn trigger_matches(&self, workflow: &Workflow, change_type: ChangeType) -> bool {
        let Some(event_trigger) = trigger_for(change_type) else {
            return false;
        };
        workflow.trigger.trigger_type == event_trigger
            || workflow.trigger.trigger_type == TriggerType::FilePatternMatch
    }

    /// Match the trigger's glob against the full path; no pattern always matches
    pub fn pattern_matches(
        &self,
        workflow: &Workflow,
        path: &Path,
    ) -> Result<bool, globset::Error> {
        match workflow.trigger.active_pattern() {
            Some(pattern) => {
                let matcher = Glob::new(pattern)?.compile_matcher();
                Ok(matcher.is_match(path))
            }
            None => Ok(true),
        }
    }

    pub fn conditions_met(&self, workflow: &Workflow, path: &Path, meta: &FileMetadata) -> bool {
        self.conditions.evaluate_all(&workflow.conditions, path, meta)
    }
}
