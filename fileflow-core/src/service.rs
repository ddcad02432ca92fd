//! Long-running organizer service
//!
//! Feeds watcher events, optionally debounced, into a single dispatch task that
//! handles one change at a time.

use crate::config::FileflowConfig;
use crate::content::{
    ContentAnalyzer, ContentStore, MemoryClassificationRegistry, MemoryContentStore,
};
use crate::monitor::{ChangeType, Debouncer, FileChange, FileWatcher, WatchHandle};
use crate::workflow::{FileWorkflowStore, WorkflowEngine};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Engine over the configured workflow directory, with workflows loaded
pub async fn open_engine(config: &FileflowConfig) -> Result<Arc<WorkflowEngine>> {
    let workflows_dir = &config.engine.workflows_dir;
    let store = FileWorkflowStore::new(workflows_dir)
        .with_context(|| format!("Failed to open workflow store {:?}", workflows_dir))?;
    let engine = WorkflowEngine::new(Arc::new(store));
    engine.load().await.context("Failed to load workflows")?;
    engine.set_dry_run(config.engine.dry_run);
    Ok(Arc::new(engine))
}

/// Analyzer over the built-in classifications and the configured content store
pub fn open_analyzer(config: &FileflowConfig) -> Result<Arc<ContentAnalyzer>> {
    let store: Arc<dyn ContentStore> = match &config.content.store_path {
        Some(path) => Arc::new(
            MemoryContentStore::open(path)
                .with_context(|| format!("Failed to open content store {:?}", path))?,
        ),
        None => Arc::new(MemoryContentStore::new()),
    };
    let registry = Arc::new(MemoryClassificationRegistry::with_builtins());
    Ok(Arc::new(ContentAnalyzer::new(registry, store, config.content.analyzer_config())))
}

struct Running {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    _watch: Option<WatchHandle>,
}

pub struct FileflowService {
    engine: Arc<WorkflowEngine>,
    analyzer: Arc<ContentAnalyzer>,
    config: FileflowConfig,
    running: Option<Running>,
}

impl FileflowService {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        analyzer: Arc<ContentAnalyzer>,
        config: FileflowConfig,
    ) -> Self {
        Self {
            engine,
            analyzer,
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Watch the configured paths and start dispatching their changes
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            bail!("Service is already running");
        }

        let (handle, raw) = FileWatcher::new(self.config.watch.watcher_config()).start()?;
        let events = match self.config.watch.debouncer_config() {
            Some(debounce) => forward_through(raw, Debouncer::new(debounce)),
            None => raw,
        };

        self.spawn_dispatch(events, Some(handle));
        info!("Watching {} path(s)", self.config.watch.paths.len());
        Ok(())
    }

    /// Dispatch changes from any event source instead of the file watcher
    pub fn attach(&mut self, events: mpsc::UnboundedReceiver<FileChange>) -> Result<()> {
        if self.running.is_some() {
            bail!("Service is already running");
        }
        self.spawn_dispatch(events, None);
        Ok(())
    }

    fn spawn_dispatch(
        &mut self,
        mut events: mpsc::UnboundedReceiver<FileChange>,
        watch: Option<WatchHandle>,
    ) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let dispatcher = Dispatcher {
            engine: self.engine.clone(),
            analyzer: self.analyzer.clone(),
            classify_on_event: self.config.content.classify_on_event,
        };

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                    change = events.recv() => match change {
                        Some(change) => dispatcher.handle(&change).await,
                        None => {
                            debug!("Event source closed");
                            break;
                        }
                    },
                }
            }
        });

        self.running = Some(Running {
            shutdown_tx,
            task,
            _watch: watch,
        });
    }

    /// Signal the dispatch task and wait for the event in flight to finish
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        // the task may already have exited on its own
        let _ = running.shutdown_tx.send(()).await;
        running.task.await.context("Dispatch task panicked")?;
        info!("Service stopped");
        Ok(())
    }

    /// Block until the dispatch task ends, e.g. because its event source closed
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(running) = self.running.take() {
            running.task.await.context("Dispatch task panicked")?;
        }
        Ok(())
    }
}

/// Pipe raw watcher events through a debouncer
fn forward_through(
    mut raw: mpsc::UnboundedReceiver<FileChange>,
    debouncer: Debouncer,
) -> mpsc::UnboundedReceiver<FileChange> {
    let (input, output) = debouncer.start();
    tokio::spawn(async move {
        while let Some(change) = raw.recv().await {
            if input.send(change).is_err() {
                break;
            }
        }
    });
    output
}

struct Dispatcher {
    engine: Arc<WorkflowEngine>,
    analyzer: Arc<ContentAnalyzer>,
    classify_on_event: bool,
}

impl Dispatcher {
    /// Failures are logged; the loop keeps going
    async fn handle(&self, change: &FileChange) {
        let path = &change.path;
        match change.change_type {
            ChangeType::Deleted | ChangeType::Renamed => {
                match self.analyzer.forget_file(path) {
                    Ok(true) => debug!("Forgot content of {:?}", path),
                    Ok(false) => {}
                    Err(e) => warn!("Failed to forget {:?}: {}", path, e),
                }
                return;
            }
            ChangeType::Other => return,
            ChangeType::Created | ChangeType::Modified => {}
        }

        match self.engine.process_event(change).await {
            Ok(true) => debug!("Workflows ran for {:?}", path),
            Ok(false) => trace!("No workflow ran for {:?}", path),
            Err(e) => error!("Processing {:?} failed: {}", path, e),
        }

        if self.classify_on_event && path.is_file() {
            match self.analyzer.classify_file(path).await {
                Ok(matches) => {
                    let ids: Vec<&str> =
                        matches.iter().map(|m| m.classification_id.as_str()).collect();
                    info!("Classified {:?}: {:?}", path, ids);
                }
                Err(e) => warn!("Classification of {:?} failed: {}", path, e),
            }
        }
    }
}
