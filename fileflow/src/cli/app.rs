use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fileflow",
    version,
    about = "Fileflow - Organize files automatically as they appear",
    long_about = "Fileflow watches directories and runs user-defined workflows (move, copy, rename, tag, delete, execute) on files that match their trigger, pattern and conditions. It can also fingerprint files by content to find related files and classify them."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = fileflow_core::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Report what workflows would do without touching any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration and workflow directory
    #[command(about = "Initialize fileflow configuration in the current directory")]
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Watch directories and dispatch their changes to workflows
    #[command(about = "Watch directories and run workflows as files change")]
    Watch {
        /// Directories to watch instead of the configured ones
        paths: Vec<PathBuf>,
    },

    /// Run one workflow against one file, ignoring its trigger
    #[command(about = "Run a workflow by hand against a file")]
    Run {
        workflow_id: String,
        path: PathBuf,
    },

    /// Manage workflow definitions
    #[command(subcommand)]
    Workflows(WorkflowsCommand),

    /// Show the content signature of a file
    #[command(about = "Analyze a file's content signature")]
    Analyze {
        path: PathBuf,

        /// Print the signature as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare the content of two files
    #[command(about = "Score how similar two files are")]
    Compare { first: PathBuf, second: PathBuf },

    /// List analyzed files similar to a file
    #[command(about = "Find previously analyzed files related to a file")]
    Related {
        path: PathBuf,

        /// Minimum similarity score (0.0 - 1.0)
        #[arg(long, default_value = "0.7")]
        min_similarity: f64,

        /// Maximum number of results
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Group a file with its related files
    #[command(about = "Create a content group from a file and its related files")]
    Group {
        path: PathBuf,

        /// Name of the new group
        #[arg(long)]
        name: String,

        /// Minimum similarity score (0.0 - 1.0)
        #[arg(long, default_value = "0.7")]
        min_similarity: f64,
    },

    /// Classify a file against the registered classifications
    #[command(about = "Classify a file")]
    Classify {
        path: PathBuf,

        /// Discard recorded matches and classify again
        #[arg(long)]
        refresh: bool,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered classifications
    #[command(about = "List available classifications")]
    Classifications,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowsCommand {
    /// List all workflows
    List,

    /// Print a workflow as JSON
    Show { id: String },

    /// Add a workflow from a JSON file
    Add {
        file: PathBuf,

        /// Replace an existing workflow with the same ID
        #[arg(long)]
        replace: bool,
    },

    /// Remove a workflow
    Remove { id: String },

    /// Enable a workflow
    Enable { id: String },

    /// Disable a workflow
    Disable { id: String },
}
