//! End-to-end dispatch scenarios against a real directory tree

use super::*;
use crate::content::{ContentAnalyzer, RelationType};
use crate::monitor::{ChangeType, FileChange};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every command it is asked to run and fails when told to
#[derive(Default)]
struct ScriptedRunner {
    fail: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str, file: &Path) -> std::result::Result<(), String> {
        self.calls.lock().unwrap().push(file.to_path_buf());
        if self.fail {
            Err(format!("'{command}' exited with status 2"))
        } else {
            Ok(())
        }
    }
}

struct Fixture {
    temp: TempDir,
    engine: WorkflowEngine,
}

impl Fixture {
    fn new() -> Self {
        Self::with_runner(Arc::new(ScriptedRunner::default()))
    }

    fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let engine = WorkflowEngine::with_executor(
            Arc::new(MemoryWorkflowStore::new()),
            ActionExecutor::with_runner(runner),
        );
        Self {
            temp: TempDir::new().unwrap(),
            engine,
        }
    }

    fn dir(&self, name: &str) -> PathBuf {
        let dir = self.temp.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn add(&self, workflow: Workflow) {
        self.engine.add_workflow(workflow).await.unwrap();
    }
}

fn on_created(id: &str, pattern: &str) -> WorkflowBuilder {
    WorkflowBuilder::new(id, format!("Workflow {id}"))
        .trigger(Trigger::with_pattern(TriggerType::FileCreated, pattern))
}

fn move_to(dir: &Path) -> Action {
    Action::new(ActionType::Move, dir.to_string_lossy())
}

fn copy_to(dir: &Path) -> Action {
    Action::new(ActionType::Copy, dir.to_string_lossy())
}

#[tokio::test]
async fn test_created_jpg_is_moved() {
    let fx = Fixture::new();
    let photos = fx.dir("photos");
    fx.add(on_created("photos", "*.jpg").action(move_to(&photos)).build().unwrap()).await;

    let photo = fx.file("IMG_0001.jpg", b"jpeg bytes");
    let ran = fx.engine.process_event(&FileChange::created(&photo)).await.unwrap();

    assert!(ran);
    assert!(!photo.exists());
    assert_eq!(std::fs::read(photos.join("IMG_0001.jpg")).unwrap(), b"jpeg bytes");
}

#[tokio::test]
async fn test_pattern_and_trigger_mismatch_leave_file_alone() {
    let fx = Fixture::new();
    let photos = fx.dir("photos");
    fx.add(on_created("photos", "*.jpg").action(move_to(&photos)).build().unwrap()).await;

    let text = fx.file("notes.txt", b"words");
    assert!(!fx.engine.process_event(&FileChange::created(&text)).await.unwrap());

    let photo = fx.file("late.jpg", b"jpeg");
    assert!(!fx.engine.process_event(&FileChange::modified(&photo)).await.unwrap());
    assert!(!fx.engine.process_event(&FileChange::new(&photo, ChangeType::Deleted)).await.unwrap());
    assert!(text.exists() && photo.exists());
}

#[tokio::test]
async fn test_size_condition_blocks_small_file() {
    let fx = Fixture::new();
    let large = fx.dir("large");
    fx.add(
        on_created("big-only", "*")
            .condition(
                Condition::new(ConditionType::FileSize, Operator::GreaterThan, "1").with_unit("MB"),
            )
            .action(move_to(&large))
            .build()
            .unwrap(),
    )
    .await;

    let small = fx.file("small.bin", &[7u8; 512]);
    assert!(!fx.engine.process_event(&FileChange::created(&small)).await.unwrap());
    assert!(small.exists());

    let result = fx.engine.execute_workflow("big-only", &small).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "Conditions not met");
    assert!(result.error.is_none());
    assert!(small.exists());
}

#[tokio::test]
async fn test_identical_text_files_are_related() {
    let fx = Fixture::new();
    let body = b"meeting minutes budget review action items budget owners\n";
    let a = fx.file("minutes_a.txt", body);
    let b = fx.file("minutes_b.txt", body);

    let analyzer = ContentAnalyzer::in_memory();
    let first = analyzer.analyze_file(&a).await.unwrap();
    let second = analyzer.analyze_file(&b).await.unwrap();
    let (score, relation) = analyzer.compare_similarity(&first, &second);

    assert!(score >= 0.9);
    assert!(matches!(relation, RelationType::Identical | RelationType::NearlyIdentical));
}

#[tokio::test]
async fn test_partial_failure_keeps_completed_actions() {
    let runner = Arc::new(ScriptedRunner {
        fail: true,
        ..ScriptedRunner::default()
    });
    let fx = Fixture::with_runner(runner.clone());
    let archive = fx.dir("archive");
    fx.add(
        on_created("archive-and-notify", "*.pdf")
            .action(move_to(&archive))
            .action(Action::new(ActionType::Execute, "notify-send archived"))
            .build()
            .unwrap(),
    )
    .await;

    let invoice = fx.file("invoice.pdf", b"%PDF-1.4");
    let result = fx.engine.execute_workflow("archive-and-notify", &invoice).await.unwrap();

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("exited with status 2"));
    // no rollback of the move
    assert!(!invoice.exists());
    assert!(archive.join("invoice.pdf").exists());
    // the command saw the moved file
    assert_eq!(runner.calls.lock().unwrap().as_slice(), &[archive.join("invoice.pdf")]);

    let second = fx.file("second.pdf", b"%PDF-1.4");
    let err = fx.engine.process_event(&FileChange::created(&second)).await.unwrap_err();
    match err {
        WorkflowError::Execution {
            workflow_id,
            source,
        } => {
            assert_eq!(workflow_id, "archive-and-notify");
            assert!(matches!(*source, WorkflowError::Command(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(archive.join("second.pdf").exists());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let runner = Arc::new(ScriptedRunner::default());
    let fx = Fixture::with_runner(runner.clone());
    let sorted = fx.dir("sorted");
    fx.add(
        on_created("everything", "*")
            .action(move_to(&sorted))
            .action(Action::new(ActionType::Rename, "renamed.txt"))
            .action(Action::new(ActionType::Execute, "echo done"))
            .action(Action::new(ActionType::Delete, ""))
            .build()
            .unwrap(),
    )
    .await;
    fx.engine.set_dry_run(true);

    let file = fx.file("draft.txt", b"draft");
    assert!(fx.engine.process_event(&FileChange::created(&file)).await.unwrap());

    let result = fx.engine.execute_workflow("everything", &file).await.unwrap();
    assert!(result.success);
    assert!(result.message.starts_with("Dry run 4 action(s)"));
    assert_eq!(std::fs::read(&file).unwrap(), b"draft");
    assert_eq!(std::fs::read_dir(&sorted).unwrap().count(), 0);
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_succeeds_with_incomplete_actions() {
    let runner = Arc::new(ScriptedRunner::default());
    let fx = Fixture::with_runner(runner.clone());
    fx.add(
        on_created("half-written", "*")
            .action(Action::new(ActionType::Tag, "t"))
            .action(Action::new(ActionType::Execute, ""))
            .action(Action::new(ActionType::Move, ""))
            .action(Action::new(ActionType::Rename, " "))
            .build()
            .unwrap(),
    )
    .await;
    fx.engine.set_dry_run(true);

    let file = fx.file("notes.txt", b"notes");
    let result = fx.engine.execute_workflow("half-written", &file).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert!(result.message.starts_with("Dry run 4 action(s)"));
    assert_eq!(std::fs::read(&file).unwrap(), b"notes");
    assert!(runner.calls.lock().unwrap().is_empty());

    fx.engine.set_dry_run(false);
    let result = fx.engine.execute_workflow("half-written", &file).await.unwrap();
    assert!(!result.success);
}

#[tokio::test]
async fn test_move_then_rename_chains() {
    let fx = Fixture::new();
    let sorted = fx.dir("sorted");
    fx.add(
        on_created("sort-and-rename", "*.csv")
            .action(move_to(&sorted))
            .action(Action::new(ActionType::Rename, "latest.csv"))
            .build()
            .unwrap(),
    )
    .await;

    let export = fx.file("export.csv", b"a,b\n1,2\n");
    assert!(fx.engine.process_event(&FileChange::created(&export)).await.unwrap());
    assert!(sorted.join("latest.csv").exists());
    assert!(!sorted.join("export.csv").exists());
}

#[tokio::test]
async fn test_collision_gets_stamped_name() {
    let fx = Fixture::new();
    let inbox = fx.dir("inbox");
    fx.add(on_created("collect", "*.txt").action(copy_to(&inbox)).build().unwrap()).await;
    std::fs::write(inbox.join("todo.txt"), "existing").unwrap();

    let todo = fx.file("todo.txt", b"incoming");
    fx.engine.process_event(&FileChange::created(&todo)).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(&inbox)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert_eq!(std::fs::read_to_string(inbox.join("todo.txt")).unwrap(), "existing");
    assert!(names.iter().any(|n| regex_utils::stamped_name::is_stamped(n)));
}

#[tokio::test]
async fn test_first_failure_stops_later_workflows() {
    let fx = Fixture::new();
    let copies = fx.dir("copies");
    let missing = fx.temp.path().join("missing");
    fx.add(on_created("broken", "*").action(move_to(&missing)).build().unwrap()).await;
    fx.add(on_created("backup", "*").action(copy_to(&copies)).build().unwrap()).await;

    let file = fx.file("data.json", b"{}");
    let err = fx.engine.process_event(&FileChange::created(&file)).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Execution { ref workflow_id, .. } if workflow_id == "broken"
    ));
    assert!(file.exists());
    assert_eq!(std::fs::read_dir(&copies).unwrap().count(), 0);
}

#[tokio::test]
async fn test_later_workflow_fails_on_moved_file() {
    let fx = Fixture::new();
    let first = fx.dir("first");
    let copies = fx.dir("copies");
    fx.add(on_created("mover", "*").action(move_to(&first)).build().unwrap()).await;
    fx.add(on_created("copier", "*").action(copy_to(&copies)).build().unwrap()).await;

    let file = fx.file("item.dat", b"x");
    let err = fx.engine.process_event(&FileChange::created(&file)).await.unwrap_err();
    match err {
        WorkflowError::Execution {
            workflow_id,
            source,
        } => {
            assert_eq!(workflow_id, "copier");
            assert!(matches!(
                *source,
                WorkflowError::ActionFailed {
                    action: ActionType::Copy,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(first.join("item.dat").exists());
    assert_eq!(std::fs::read_dir(&copies).unwrap().count(), 0);
}

#[tokio::test]
async fn test_invalid_pattern_skips_only_that_workflow() {
    let fx = Fixture::new();
    let copies = fx.dir("copies");
    fx.add(
        on_created("bad-glob", "[unclosed")
            .action(Action::new(ActionType::Delete, ""))
            .build()
            .unwrap(),
    )
    .await;
    fx.add(on_created("backup", "*.txt").action(copy_to(&copies)).build().unwrap()).await;

    let file = fx.file("keep.txt", b"keep me");
    assert!(fx.engine.process_event(&FileChange::created(&file)).await.unwrap());
    assert!(file.exists());
    assert!(copies.join("keep.txt").exists());
}

#[tokio::test]
async fn test_disabled_workflow_is_skipped_but_runs_manually() {
    let fx = Fixture::new();
    let dest = fx.dir("dest");
    fx.add(on_created("paused", "*").enabled(false).action(copy_to(&dest)).build().unwrap()).await;

    let file = fx.file("a.txt", b"a");
    assert!(!fx.engine.process_event(&FileChange::created(&file)).await.unwrap());
    assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);

    let result = fx.engine.execute_workflow("paused", &file).await.unwrap();
    assert!(result.success);
    assert!(dest.join("a.txt").exists());
}

#[tokio::test]
async fn test_hidden_vanished_and_directory_paths_are_skipped() {
    let fx = Fixture::new();
    fx.add(
        on_created("delete-all", "*")
            .action(Action::new(ActionType::Delete, ""))
            .build()
            .unwrap(),
    )
    .await;

    let hidden = fx.file(".secret", b"s");
    let backup = fx.file("notes.txt~", b"n");
    let folder = fx.dir("folder");
    let vanished = fx.temp.path().join("vanished.txt");

    for path in [&hidden, &backup, &folder, &vanished] {
        assert!(!fx.engine.process_event(&FileChange::created(path)).await.unwrap(), "{path:?}");
    }
    assert!(hidden.exists() && backup.exists() && folder.exists());
}
