//! Fluent construction of validated workflows

use super::{Action, Condition, Result, Trigger, TriggerType, Workflow};
use chrono::Utc;

/// Builds a [`Workflow`], validating it on [`build`](WorkflowBuilder::build)
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    /// Start a workflow with a manual trigger and no steps
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            workflow: Workflow {
                id: id.into(),
                name: name.into(),
                description: String::new(),
                enabled: true,
                priority: 0,
                trigger: Trigger::new(TriggerType::Manual),
                conditions: Vec::new(),
                actions: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = description.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.workflow.enabled = enabled;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.workflow.priority = priority;
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.workflow.trigger = trigger;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.workflow.conditions.push(condition);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.workflow.actions.push(action);
        self
    }

    pub fn build(self) -> Result<Workflow> {
        self.workflow.validate()?;
        Ok(self.workflow)
    }
}
