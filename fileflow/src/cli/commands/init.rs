//! Init command - write a starter configuration

use super::GlobalOptions;
use anyhow::{Result, bail};
use fileflow_core::FileflowConfig;
use fileflow_core::workflow::{
    Action, ActionType, FileWorkflowStore, OPTION_CREATE_TARGET_DIR, Trigger, TriggerType,
    WorkflowBuilder, WorkflowStore,
};
use tracing::info;

pub const EXAMPLE_WORKFLOW_ID: &str = "example-sort-images";

pub async fn execute(options: &GlobalOptions, force: bool) -> Result<()> {
    let path = &options.config_path;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = FileflowConfig::starter();
    config.save(path)?;
    info!("Wrote configuration to {:?}", path);

    let store = FileWorkflowStore::new(&config.engine.workflows_dir)?;
    let has_workflows = !store.load_all()?.is_empty();
    if !has_workflows {
        let example = WorkflowBuilder::new(EXAMPLE_WORKFLOW_ID, "Sort images")
            .description("Move new JPEG files into an images folder (disabled until you enable it)")
            .enabled(false)
            .trigger(Trigger::with_pattern(TriggerType::FileCreated, "*.jpg"))
            .action(
                Action::new(ActionType::Move, "images")
                    .with_option(OPTION_CREATE_TARGET_DIR, "true"),
            )
            .build()?;
        store.save(&example)?;
    }

    println!("Initialized fileflow");
    println!("  Config:    {}", path.display());
    println!("  Workflows: {}", store.dir().display());
    if !has_workflows {
        println!("\nAn example workflow was added. Enable it with:");
        println!("  fileflow workflows enable {EXAMPLE_WORKFLOW_ID}");
    }
    Ok(())
}
