use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::commands::{self, GlobalOptions};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let options = GlobalOptions {
        config_path: cli.config,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Init { force } => {
            info!("Initializing fileflow");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::init::execute(&options, force))?;
        }
        Commands::Watch { paths } => {
            info!("Watch command: {:?}", paths);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::watch::execute(&options, paths))?;
        }
        Commands::Run { workflow_id, path } => {
            info!("Run command: {} on {:?}", workflow_id, path);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::watch::run_workflow(&options, &workflow_id, &path))?;
        }
        Commands::Workflows(command) => {
            info!("Workflows command: {:?}", command);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::workflows::handle_workflows_command(&options, command))?;
        }
        Commands::Analyze { path, json } => {
            info!("Analyze command: {:?}", path);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::execute(&options, &path, json))?;
        }
        Commands::Compare { first, second } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::compare(&options, &first, &second))?;
        }
        Commands::Related {
            path,
            min_similarity,
            limit,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::related(&options, &path, min_similarity, limit))?;
        }
        Commands::Group {
            path,
            name,
            min_similarity,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::group(&options, &path, &name, min_similarity))?;
        }
        Commands::Classify {
            path,
            refresh,
            json,
        } => {
            info!("Classify command: {:?}", path);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::classify(&options, &path, refresh, json))?;
        }
        Commands::Classifications => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::classifications(&options))?;
        }
    }

    Ok(())
}
