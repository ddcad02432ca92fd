//! Configuration for watching, dispatch, and content analysis

use crate::content::AnalyzerConfig;
use crate::monitor::{DebouncerConfig, WatcherConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "fileflow.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileflowConfig {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

impl FileflowConfig {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Configuration written by `fileflow init`: defaults plus a persistent content store
    pub fn starter() -> Self {
        let mut config = Self::default();
        config.content.store_path = Some(PathBuf::from(".fileflow/content.json"));
        config
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    /// Gitignore-style lines
    pub ignore_patterns: Vec<String>,
    /// Quiet period before a change is dispatched; 0 disables debouncing
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        let watcher = WatcherConfig::default();
        Self {
            paths: watcher.paths,
            recursive: watcher.recursive,
            ignore_patterns: watcher.ignore_patterns,
            debounce_ms: DebouncerConfig::default().delay_ms,
        }
    }
}

impl WatchConfig {
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            paths: self.paths.clone(),
            recursive: self.recursive,
            ignore_patterns: self.ignore_patterns.clone(),
            ..WatcherConfig::default()
        }
    }

    pub fn debouncer_config(&self) -> Option<DebouncerConfig> {
        (self.debounce_ms > 0).then(|| DebouncerConfig {
            delay_ms: self.debounce_ms,
            ..DebouncerConfig::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// One `<id>.json` document per workflow
    pub workflows_dir: PathBuf,
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflows_dir: PathBuf::from(".fileflow/workflows"),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// JSON snapshot of analysis results; kept in memory only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Classify files that survive workflow dispatch
    pub classify_on_event: bool,
    pub related_min_similarity: f64,
    pub related_limit: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        let analyzer = AnalyzerConfig::default();
        Self {
            store_path: None,
            classify_on_event: false,
            related_min_similarity: analyzer.related_min_similarity,
            related_limit: analyzer.related_limit,
        }
    }
}

impl ContentConfig {
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            related_min_similarity: self.related_min_similarity,
            related_limit: self.related_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = FileflowConfig::default();
        assert!(config.watch.recursive);
        assert_eq!(config.watch.debounce_ms, 500);
        assert!(config.watch.ignore_patterns.contains(&"*.part".to_string()));
        assert!(!config.engine.dry_run);
        assert_eq!(config.content.related_min_similarity, 0.7);
        assert_eq!(config.content.related_limit, 5);
        assert!(config.content.store_path.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: FileflowConfig = toml::from_str(
            r#"
            [watch]
            paths = ["/home/me/Downloads"]
            debounce_ms = 0

            [engine]
            dry_run = true
            "#,
        )
        .unwrap();

        assert_eq!(config.watch.paths, vec![PathBuf::from("/home/me/Downloads")]);
        assert!(config.watch.recursive);
        assert!(config.watch.debouncer_config().is_none());
        assert!(config.engine.dry_run);
        assert_eq!(config.engine.workflows_dir, PathBuf::from(".fileflow/workflows"));
        assert!(!config.content.classify_on_event);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf").join(DEFAULT_CONFIG_FILE);

        let mut config = FileflowConfig::default();
        config.content.store_path = Some(PathBuf::from("state/content.json"));
        config.content.related_limit = 9;
        config.save(&path).unwrap();

        let loaded = FileflowConfig::from_file(&path).unwrap();
        assert_eq!(loaded.content.related_limit, 9);
        assert_eq!(loaded.content.store_path, Some(PathBuf::from("state/content.json")));
    }

    #[test]
    fn test_starter_persists_content() {
        let config = FileflowConfig::starter();
        assert!(config.content.store_path.is_some());
        assert_eq!(config.watch.debounce_ms, 500);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = FileflowConfig::load_or_default(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.watch.debounce_ms, 500);
        assert!(FileflowConfig::from_file(&temp.path().join("absent.toml")).is_err());
    }
}
