//! Watch and run commands - dispatch file changes to workflows

use super::{GlobalOptions, absolute};
use anyhow::{Result, bail};
use fileflow_core::FileflowService;
use fileflow_core::service::{open_analyzer, open_engine};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Watch until Ctrl+C
pub async fn execute(options: &GlobalOptions, paths: Vec<PathBuf>) -> Result<()> {
    let mut config = options.load_config()?;
    if !paths.is_empty() {
        config.watch.paths = paths.iter().map(|p| absolute(p)).collect::<Result<_>>()?;
    }

    let engine = open_engine(&config).await?;
    let workflows = engine.get_workflows().await;
    let enabled = workflows.iter().filter(|w| w.enabled).count();
    if enabled == 0 {
        warn!("No enabled workflows; changes will be observed but nothing will run");
    }
    let analyzer = open_analyzer(&config)?;

    println!("Watching:");
    for path in &config.watch.paths {
        println!("  {}", path.display());
    }
    println!("{} of {} workflow(s) enabled", enabled, workflows.len());
    if engine.is_dry_run() {
        println!("Dry run: no files will be changed");
    }
    println!("Press Ctrl+C to stop");

    let mut service = FileflowService::new(engine, analyzer, config);
    service.start()?;

    tokio::signal::ctrl_c().await?;
    println!("\nStopping...");
    service.stop().await?;
    info!("Watch finished");
    Ok(())
}

/// Run a single workflow against a file
pub async fn run_workflow(options: &GlobalOptions, workflow_id: &str, path: &Path) -> Result<()> {
    let config = options.load_config()?;
    let engine = open_engine(&config).await?;
    let path = absolute(path)?;

    let result = engine.execute_workflow(workflow_id, &path).await?;
    println!("{} ({})", result.workflow_name, result.workflow_id);
    println!("  File:    {}", result.file_path.display());
    println!("  Result:  {}", result.message);

    if !result.success {
        match result.error {
            Some(error) => bail!("Workflow '{}' failed: {}", workflow_id, error),
            None => bail!("Workflow '{}' did not run: {}", workflow_id, result.message),
        }
    }
    Ok(())
}
