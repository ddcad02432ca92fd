//! Command implementations

pub mod analyze;
pub mod init;
pub mod watch;
pub mod workflows;

use anyhow::{Context, Result};
use fileflow_core::FileflowConfig;
use std::path::{Path, PathBuf};

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config_path: PathBuf,
    pub dry_run: bool,
}

impl GlobalOptions {
    /// Configured settings, with `--dry-run` layered on top
    pub fn load_config(&self) -> Result<FileflowConfig> {
        let mut config = FileflowConfig::load_or_default(&self.config_path)?;
        if self.dry_run {
            config.engine.dry_run = true;
        }
        Ok(config)
    }
}

/// Absolute form of a user-supplied path, so stored records match watcher paths
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {:?}", path))
}
