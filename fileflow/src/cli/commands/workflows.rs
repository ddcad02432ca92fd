//! Workflows command - inspect and edit workflow definitions

use super::GlobalOptions;
use crate::cli::WorkflowsCommand;
use anyhow::{Context, Result};
use fileflow_core::service::open_engine;
use fileflow_core::workflow::{Workflow, WorkflowEngine, WorkflowError};
use std::path::Path;

pub async fn handle_workflows_command(
    options: &GlobalOptions,
    command: WorkflowsCommand,
) -> Result<()> {
    let config = options.load_config()?;
    let engine = open_engine(&config).await?;

    match command {
        WorkflowsCommand::List => list(&engine).await,
        WorkflowsCommand::Show { id } => show(&engine, &id).await,
        WorkflowsCommand::Add { file, replace } => add(&engine, &file, replace).await,
        WorkflowsCommand::Remove { id } => {
            engine.delete_workflow(&id).await?;
            println!("Removed workflow '{}'", id);
            Ok(())
        }
        WorkflowsCommand::Enable { id } => {
            engine.set_enabled(&id, true).await?;
            println!("Enabled workflow '{}'", id);
            Ok(())
        }
        WorkflowsCommand::Disable { id } => {
            engine.set_enabled(&id, false).await?;
            println!("Disabled workflow '{}'", id);
            Ok(())
        }
    }
}

async fn list(engine: &WorkflowEngine) -> Result<()> {
    let workflows = engine.get_workflows().await;
    if workflows.is_empty() {
        println!("No workflows defined");
        return Ok(());
    }

    println!(
        "{:<24} {:<8} {:<18} {:<16} {:>5} {:>7}",
        "ID", "ENABLED", "TRIGGER", "PATTERN", "CONDS", "ACTIONS"
    );
    for workflow in workflows {
        println!(
            "{:<24} {:<8} {:<18} {:<16} {:>5} {:>7}",
            workflow.id,
            if workflow.enabled { "yes" } else { "no" },
            format!("{:?}", workflow.trigger.trigger_type),
            workflow.trigger.active_pattern().unwrap_or("*"),
            workflow.conditions.len(),
            workflow.actions.len()
        );
    }
    Ok(())
}

async fn show(engine: &WorkflowEngine, id: &str) -> Result<()> {
    let workflow = engine
        .get_workflow(id)
        .await
        .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&workflow)?);
    Ok(())
}

async fn add(engine: &WorkflowEngine, file: &Path, replace: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let workflow: Workflow = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workflow in {:?}", file))?;
    let id = workflow.id.clone();

    if replace && engine.get_workflow(&id).await.is_some() {
        engine.update_workflow(workflow).await?;
        println!("Updated workflow '{}'", id);
    } else {
        engine.add_workflow(workflow).await?;
        println!("Added workflow '{}'", id);
    }
    Ok(())
}
