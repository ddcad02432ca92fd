//! Ordered action execution with dry-run support
//!
//! Actions run in order against the file's current location; a move or rename
//! relocates the file for the actions after it. The first failing action aborts
//! the rest of the chain and nothing already done is rolled back.

use super::{
    Action, ActionType, OPTION_CREATE_TARGET_DIR, OPTION_OVERWRITE, Result, WorkflowError,
};
use chrono::Local;
use regex_utils::stamped_name;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Runs the command of an `Execute` action
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, file: &Path) -> std::result::Result<(), String>;
}

/// Logs the command instead of spawning a process
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCommandRunner;

impl CommandRunner for LoggingCommandRunner {
    fn run(&self, command: &str, file: &Path) -> std::result::Result<(), String> {
        info!("Execute action for {:?}: {}", file, command);
        Ok(())
    }
}

/// What an action chain did, or would have done in dry-run mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub actions_run: usize,
    /// Where the file ended up after the last action
    pub final_path: PathBuf,
    pub steps: Vec<String>,
}

/// Executes a workflow's actions
pub struct ActionExecutor {
    runner: Arc<dyn CommandRunner>,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(LoggingCommandRunner),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Run `actions` in order against `path`, stopping at the first error
    pub async fn execute(
        &self,
        actions: &[Action],
        path: &Path,
        dry_run: bool,
    ) -> Result<ExecutionSummary> {
        let mut summary = ExecutionSummary {
            actions_run: 0,
            final_path: path.to_path_buf(),
            steps: Vec::new(),
        };

        for action in actions {
            let step = self.execute_one(action, &mut summary.final_path, dry_run).await?;
            if dry_run {
                info!("{}", step);
            } else {
                debug!("{}", step);
            }
            summary.steps.push(step);
            summary.actions_run += 1;
        }

        Ok(summary)
    }

    async fn execute_one(
        &self,
        action: &Action,
        current: &mut PathBuf,
        dry_run: bool,
    ) -> Result<String> {
        match action.action_type {
            ActionType::Move => self.transfer(action, current, dry_run, true).await,
            ActionType::Copy => self.transfer(action, current, dry_run, false).await,
            ActionType::Rename => self.rename(action, current, dry_run).await,
            ActionType::Tag => {
                if dry_run {
                    return Ok(format!(
                        "[dry run] Would tag {:?} with '{}'",
                        current, action.target
                    ));
                }
                info!("Tagging {:?} with '{}'", current, action.target);
                Ok(format!("Tagged {:?} with '{}'", current, action.target))
            }
            ActionType::Delete => {
                if dry_run {
                    return Ok(format!("[dry run] Would delete {:?}", current));
                }
                fs::remove_file(&*current)
                    .await
                    .map_err(|e| failed(ActionType::Delete, current, e))?;
                Ok(format!("Deleted {:?}", current))
            }
            ActionType::Execute => {
                let command = action.target.trim();
                if dry_run {
                    return Ok(format!("[dry run] Would execute '{}' for {:?}", command, current));
                }
                if command.is_empty() {
                    return Err(WorkflowError::Command("empty command".to_string()));
                }
                self.runner.run(command, current).map_err(WorkflowError::Command)?;
                Ok(format!("Executed '{}' for {:?}", command, current))
            }
        }
    }

    /// Move or copy into the directory named by the action target
    async fn transfer(
        &self,
        action: &Action,
        current: &mut PathBuf,
        dry_run: bool,
        is_move: bool,
    ) -> Result<String> {
        let kind = action.action_type;
        let verb = if is_move { "move" } else { "copy" };
        if action.target.trim().is_empty() {
            if dry_run {
                return Ok(format!(
                    "[dry run] Would {verb} {:?} but no target directory is set",
                    current
                ));
            }
            return Err(WorkflowError::Validation(format!("{verb} action has no target directory")));
        }
        let target_dir = PathBuf::from(action.target.trim());
        let file_name = current
            .file_name()
            .ok_or_else(|| WorkflowError::Validation(format!("{:?} has no file name", current)))?
            .to_owned();

        if action.option_enabled(OPTION_CREATE_TARGET_DIR) && !dry_run {
            fs::create_dir_all(&target_dir).await.map_err(|e| failed(kind, &target_dir, e))?;
        }

        let destination = target_dir.join(file_name);
        if is_move && destination == *current {
            return Ok(format!("{:?} is already in {:?}", current, target_dir));
        }
        let destination =
            resolve_destination(kind, destination, action.option_enabled(OPTION_OVERWRITE), dry_run)
                .await?;

        if dry_run {
            return Ok(format!("[dry run] Would {verb} {:?} to {:?}", current, destination));
        }

        if is_move {
            fs::rename(&*current, &destination).await.map_err(|e| failed(kind, current, e))?;
            let step = format!("Moved {:?} to {:?}", current, destination);
            *current = destination;
            Ok(step)
        } else {
            fs::copy(&*current, &destination).await.map_err(|e| failed(kind, current, e))?;
            Ok(format!("Copied {:?} to {:?}", current, destination))
        }
    }

    /// Rename within the file's own directory
    async fn rename(
        &self,
        action: &Action,
        current: &mut PathBuf,
        dry_run: bool,
    ) -> Result<String> {
        let new_name = action.target.trim();
        if new_name.is_empty() {
            if dry_run {
                return Ok(format!("[dry run] Would rename {:?} but no new name is set", current));
            }
            return Err(WorkflowError::Validation("rename action has no new name".to_string()));
        }
        let parent = current.parent().map(Path::to_path_buf).unwrap_or_default();
        let destination = parent.join(new_name);
        if destination == *current {
            return Ok(format!("{:?} already has that name", current));
        }
        let destination = resolve_destination(
            ActionType::Rename,
            destination,
            action.option_enabled(OPTION_OVERWRITE),
            dry_run,
        )
        .await?;

        if dry_run {
            return Ok(format!("[dry run] Would rename {:?} to {:?}", current, destination));
        }

        fs::rename(&*current, &destination)
            .await
            .map_err(|e| failed(ActionType::Rename, current, e))?;
        let step = format!("Renamed {:?} to {:?}", current, destination);
        *current = destination;
        Ok(step)
    }
}

fn failed(action: ActionType, path: &Path, source: std::io::Error) -> WorkflowError {
    WorkflowError::ActionFailed {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Apply the collision policy to a destination path.
///
/// With `overwrite` an existing file is removed up front (not atomic); otherwise a
/// free name with a timestamp suffix is chosen.
async fn resolve_destination(
    kind: ActionType,
    destination: PathBuf,
    overwrite: bool,
    dry_run: bool,
) -> Result<PathBuf> {
    let exists = fs::try_exists(&destination).await.map_err(|e| failed(kind, &destination, e))?;
    if !exists {
        return Ok(destination);
    }
    if overwrite {
        if !dry_run {
            fs::remove_file(&destination).await.map_err(|e| failed(kind, &destination, e))?;
        }
        return Ok(destination);
    }
    unique_destination(kind, &destination).await
}

/// `name.ext` becomes `name_YYYYMMDD_HHMMSS.ext`, with `_N` appended if that is taken too
async fn unique_destination(kind: ActionType, destination: &Path) -> Result<PathBuf> {
    let parent = destination.parent().map(Path::to_path_buf).unwrap_or_default();
    // restamp from the original name instead of stacking suffixes
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = PathBuf::from(stamped_name::original_name(&file_name).unwrap_or(file_name));
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = base.extension().map(|e| format!(".{}", e.to_string_lossy()));
    let ext = ext.as_deref().unwrap_or("");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    let mut candidate = parent.join(format!("{stem}_{stamp}{ext}"));
    let mut seq = 1;
    while fs::try_exists(&candidate).await.map_err(|e| failed(kind, &candidate, e))? {
        candidate = parent.join(format!("{stem}_{stamp}_{seq}{ext}"));
        seq += 1;
    }
    debug!("Destination {:?} exists, using {:?}", destination, candidate);
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingRunner;

    impl CommandRunner for FailingRunner {
        fn run(&self, command: &str, _file: &Path) -> std::result::Result<(), String> {
            Err(format!("'{command}' exited with status 1"))
        }
    }

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_move_into_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        write(&src, "hello");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Move, dest.to_string_lossy())];
        let summary = executor.execute(&actions, &src, false).await.unwrap();

        assert!(!src.exists());
        assert_eq!(summary.final_path, dest.join("a.txt"));
        assert_eq!(std::fs::read_to_string(dest.join("a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_move_without_target_dir_fails() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        write(&src, "x");

        let executor = ActionExecutor::new();
        let missing = temp.path().join("nope");
        let actions = [Action::new(ActionType::Move, missing.to_string_lossy())];
        let err = executor.execute(&actions, &src, false).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::ActionFailed {
                action: ActionType::Move,
                ..
            }
        ));
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_copy_creates_target_dir() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        write(&src, "data");
        let dest = temp.path().join("nested/copies");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Copy, dest.to_string_lossy())
            .with_option(OPTION_CREATE_TARGET_DIR, "true")];
        let summary = executor.execute(&actions, &src, false).await.unwrap();

        assert!(src.exists());
        assert_eq!(summary.final_path, src);
        assert_eq!(std::fs::read_to_string(dest.join("a.txt")).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_collision_uniquifies_name() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x.txt");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        write(&src, "new");
        write(&dest.join("x.txt"), "old");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Move, dest.to_string_lossy())];
        let summary = executor.execute(&actions, &src, false).await.unwrap();

        let name = summary.final_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(stamped_name::is_stamped(&name), "{name}");
        assert_eq!(stamped_name::original_name(&name).as_deref(), Some("x.txt"));
        assert_eq!(std::fs::read_to_string(dest.join("x.txt")).unwrap(), "old");
        assert_eq!(std::fs::read_to_string(&summary.final_path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_stamped_collision_is_restamped_not_stacked() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x_20200101_000000.txt");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        write(&src, "new");
        write(&dest.join("x_20200101_000000.txt"), "old");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Copy, dest.to_string_lossy())];
        executor.execute(&actions, &src, false).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        for name in names {
            assert_eq!(stamped_name::original_name(&name).as_deref(), Some("x.txt"), "{name}");
        }
    }

    #[tokio::test]
    async fn test_collision_with_overwrite_replaces() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x.txt");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        write(&src, "new");
        write(&dest.join("x.txt"), "old");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Copy, dest.to_string_lossy())
            .with_option(OPTION_OVERWRITE, "true")];
        executor.execute(&actions, &src, false).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("x.txt")).unwrap(), "new");
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rename_stays_in_directory_and_chains() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("scan001.pdf");
        write(&src, "pdf");
        let archive = temp.path().join("archive");

        let executor = ActionExecutor::new();
        let actions = [
            Action::new(ActionType::Rename, "invoice.pdf"),
            Action::new(ActionType::Move, archive.to_string_lossy())
                .with_option(OPTION_CREATE_TARGET_DIR, "true"),
        ];
        let summary = executor.execute(&actions, &src, false).await.unwrap();

        assert_eq!(summary.actions_run, 2);
        assert_eq!(summary.final_path, archive.join("invoice.pdf"));
        assert!(!temp.path().join("invoice.pdf").exists());
        assert!(archive.join("invoice.pdf").exists());
    }

    #[tokio::test]
    async fn test_delete_and_tag() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("junk.log");
        write(&src, "x");

        let executor = ActionExecutor::new();
        let actions = [Action::new(ActionType::Tag, "junk"), Action::new(ActionType::Delete, "")];
        let summary = executor.execute(&actions, &src, false).await.unwrap();

        assert_eq!(summary.actions_run, 2);
        assert!(!src.exists());
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x.txt");
        write(&src, "keep");
        let dest = temp.path().join("new-dir");

        let executor = ActionExecutor::new();
        let actions = [
            Action::new(ActionType::Copy, dest.to_string_lossy())
                .with_option(OPTION_CREATE_TARGET_DIR, "true"),
            Action::new(ActionType::Rename, "y.txt"),
            Action::new(ActionType::Move, dest.to_string_lossy())
                .with_option(OPTION_CREATE_TARGET_DIR, "true"),
            Action::new(ActionType::Execute, "notify-send done"),
            Action::new(ActionType::Delete, ""),
        ];
        let summary = executor.execute(&actions, &src, true).await.unwrap();

        assert_eq!(summary.actions_run, 5);
        assert!(summary.steps.iter().all(|s| s.starts_with("[dry run]")));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "keep");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_the_chain() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        write(&src, "x");
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();

        let executor = ActionExecutor::with_runner(Arc::new(FailingRunner));
        let actions = [
            Action::new(ActionType::Execute, "false"),
            Action::new(ActionType::Move, dest.to_string_lossy()),
        ];
        let err = executor.execute(&actions, &src, false).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Command(_)));
        assert!(src.exists());
        assert!(!dest.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_empty_command_is_an_error() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        write(&src, "x");

        let executor = ActionExecutor::new();
        let err = executor
            .execute(&[Action::new(ActionType::Execute, "  ")], &src, false)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Command(_)));
    }
}
