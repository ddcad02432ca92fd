//! Core file system watcher implementation using notify crate

use crate::monitor::{ChangeType, FileChange};
use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    /// Gitignore-style lines; matching paths never produce changes
    pub ignore_patterns: Vec<String>,
    pub watch_hidden: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            recursive: true,
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.part".to_string(),
                "*.crdownload".to_string(),
            ],
            watch_hidden: false,
        }
    }
}

/// Keeps the underlying watcher alive; dropping it stops event delivery
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
}

/// Main file system watcher
pub struct FileWatcher {
    config: WatcherConfig,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    /// Start watching for file changes
    pub fn start(self) -> Result<(WatchHandle, mpsc::UnboundedReceiver<FileChange>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = self.config.paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        let gitignore = build_ignore(&root, &self.config.ignore_patterns)?;
        let watch_hidden = self.config.watch_hidden;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in process_event(event, &gitignore, watch_hidden) {
                    if let Err(e) = tx.send(change) {
                        error!("Failed to send change event: {}", e);
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        for path in &self.config.paths {
            watcher.watch(path, mode).with_context(|| format!("Failed to watch {:?}", path))?;
            info!("Watching path: {:?} (recursive: {})", path, self.config.recursive);
        }

        Ok((WatchHandle { _watcher: watcher }, rx))
    }
}

fn build_ignore(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .with_context(|| format!("Invalid ignore pattern {:?}", pattern))?;
    }
    Ok(builder.build()?)
}

/// Map a notify event kind to the change it represents for each of its paths
fn classify_kind(event: &Event) -> Vec<(PathBuf, ChangeType)> {
    let single = |change_type: ChangeType| -> Vec<(PathBuf, ChangeType)> {
        event.paths.iter().map(|p| (p.clone(), change_type)).collect()
    };
    match event.kind {
        EventKind::Create(_) => single(ChangeType::Created),
        // a file moved into a watched directory is new to it
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(ChangeType::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                (from.clone(), ChangeType::Renamed),
                (to.clone(), ChangeType::Created),
            ],
            _ => single(ChangeType::Renamed),
        },
        EventKind::Modify(ModifyKind::Name(_)) => single(ChangeType::Renamed),
        EventKind::Modify(ModifyKind::Metadata(_)) => single(ChangeType::Other),
        EventKind::Modify(_) => single(ChangeType::Modified),
        EventKind::Remove(_) => single(ChangeType::Deleted),
        _ => single(ChangeType::Other),
    }
}

/// Process a notify event into zero or more FileChanges
fn process_event(event: Event, gitignore: &Gitignore, watch_hidden: bool) -> Vec<FileChange> {
    classify_kind(&event)
        .into_iter()
        .filter(|(_, change_type)| *change_type != ChangeType::Other)
        .filter(|(path, _)| {
            if gitignore.matched(path, path.is_dir()).is_ignore() {
                debug!("Ignoring path due to ignore patterns: {:?}", path);
                return false;
            }
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if name.ends_with('~') || (!watch_hidden && name.starts_with('.')) {
                debug!("Ignoring hidden or temp file: {:?}", path);
                return false;
            }
            true
        })
        .map(|(path, change_type)| FileChange {
            path,
            change_type,
            timestamp: SystemTime::now(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;
    use tokio::time::{Duration, sleep};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    fn no_ignores() -> Gitignore {
        build_ignore(Path::new("/w"), &["*.tmp".to_string()]).unwrap()
    }

    #[test]
    fn test_event_kind_mapping() {
        let ignore = no_ignores();
        let created = process_event(
            event(EventKind::Create(CreateKind::File), &["/w/a.txt"]),
            &ignore,
            false,
        );
        assert_eq!(created[0].change_type, ChangeType::Created);

        let written = process_event(
            event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/w/a.txt"]),
            &ignore,
            false,
        );
        assert_eq!(written[0].change_type, ChangeType::Modified);

        let removed = process_event(
            event(EventKind::Remove(RemoveKind::File), &["/w/a.txt"]),
            &ignore,
            false,
        );
        assert_eq!(removed[0].change_type, ChangeType::Deleted);

        let chmod = process_event(
            event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                &["/w/a.txt"],
            ),
            &ignore,
            false,
        );
        assert!(chmod.is_empty());
    }

    #[test]
    fn test_rename_both_reports_new_path_as_created() {
        let changes = process_event(
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/w/old.txt", "/w/new.txt"],
            ),
            &no_ignores(),
            false,
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].path, PathBuf::from("/w/new.txt"));
        assert_eq!(changes[1].change_type, ChangeType::Created);
    }

    #[test]
    fn test_filtered_paths() {
        let ignore = no_ignores();
        let kind = || EventKind::Create(CreateKind::File);
        assert!(process_event(event(kind(), &["/w/.hidden"]), &ignore, false).is_empty());
        assert!(process_event(event(kind(), &["/w/notes.txt~"]), &ignore, true).is_empty());
        assert!(process_event(event(kind(), &["/w/partial.tmp"]), &ignore, false).is_empty());
        assert_eq!(process_event(event(kind(), &["/w/.hidden"]), &ignore, true).len(), 1);
    }

    #[tokio::test]
    async fn test_file_watcher_detects_changes() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.md");

        let config = WatcherConfig {
            paths: vec![temp_dir.path().to_path_buf()],
            ..WatcherConfig::default()
        };

        let (_handle, mut rx) = FileWatcher::new(config).start().unwrap();

        std::fs::write(&test_file, "test content").unwrap();

        sleep(Duration::from_millis(200)).await;

        if let Ok(change) = rx.try_recv() {
            assert_eq!(change.change_type, ChangeType::Created);
            assert_eq!(change.path.file_name(), test_file.file_name());
        }
    }
}
