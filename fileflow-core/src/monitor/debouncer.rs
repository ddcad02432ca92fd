//! Event debouncing logic to handle rapid file changes

use crate::monitor::FileChange;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Configuration for the debouncer
#[derive(Debug, Clone)]
pub struct DebouncerConfig {
    /// Delay in milliseconds a path must be quiet before its change is emitted
    pub delay_ms: u64,
    /// Maximum number of paths to hold before the oldest are flushed early
    pub max_buffer_size: usize,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            max_buffer_size: 1000,
        }
    }
}

/// Debouncer for file system events
///
/// Aggregates rapid changes to the same file and emits
/// a single event after a configurable delay
pub struct Debouncer {
    config: DebouncerConfig,
    pending: Arc<DashMap<PathBuf, PendingChange>>,
}

struct PendingChange {
    change: FileChange,
    first_seen: Instant,
    last_update: Instant,
    count: usize,
}

impl Debouncer {
    pub fn new(config: DebouncerConfig) -> Self {
        Self {
            config,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Start the debouncing task.
    ///
    /// Returns the sender to feed raw changes into and the receiver of debounced
    /// changes. Dropping every sender flushes what is pending and ends the task.
    pub fn start(self) -> (mpsc::UnboundedSender<FileChange>, mpsc::UnboundedReceiver<FileChange>) {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let pending = self.pending;
        let config = self.config;
        let tick = Duration::from_millis((config.delay_ms / 4).clamp(10, 50));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = input_rx.recv() => match received {
                        Some(change) => handle_change(change, &pending, &config, &output_tx),
                        None => {
                            flush_all(&pending, &output_tx);
                            debug!("Debouncer input closed");
                            break;
                        }
                    },
                    _ = sleep(tick) => {
                        emit_ready_changes(&pending, &output_tx, &config);
                    }
                }
            }
        });

        (input_tx, output_rx)
    }

    /// Get the number of pending changes
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Handle an incoming change event
fn handle_change(
    change: FileChange,
    pending: &DashMap<PathBuf, PendingChange>,
    config: &DebouncerConfig,
    tx: &mpsc::UnboundedSender<FileChange>,
) {
    let path = change.path.clone();
    let now = Instant::now();

    if pending.len() >= config.max_buffer_size && !pending.contains_key(&path) {
        debug!("Debouncer buffer full, flushing oldest entries");
        flush_oldest(pending, tx, (config.max_buffer_size / 10).max(1));
    }

    pending
        .entry(path.clone())
        .and_modify(|e| {
            e.change.change_type = e.change.change_type.merge(change.change_type);
            e.change.timestamp = change.timestamp;
            e.last_update = now;
            e.count += 1;
            trace!("Updated pending change for {:?} (count: {})", path, e.count);
        })
        .or_insert_with(|| {
            trace!("New pending change for {:?}", path);
            PendingChange {
                change,
                first_seen: now,
                last_update: now,
                count: 1,
            }
        });
}

fn send(tx: &mpsc::UnboundedSender<FileChange>, change: FileChange) {
    if let Err(e) = tx.send(change) {
        debug!("Failed to send debounced change: {}", e);
    }
}

/// Emit changes that have been stable for the configured delay
fn emit_ready_changes(
    pending: &DashMap<PathBuf, PendingChange>,
    tx: &mpsc::UnboundedSender<FileChange>,
    config: &DebouncerConfig,
) {
    let now = Instant::now();
    let delay = Duration::from_millis(config.delay_ms);

    let ready: Vec<PathBuf> = pending
        .iter()
        .filter(|entry| now.duration_since(entry.last_update) >= delay)
        .map(|entry| entry.key().clone())
        .collect();

    for path in ready {
        if let Some((_, pending_change)) = pending.remove(&path) {
            debug!(
                "Emitting debounced change for {:?} (aggregated {} events)",
                path, pending_change.count
            );
            send(tx, pending_change.change);
        }
    }
}

fn flush_oldest(
    pending: &DashMap<PathBuf, PendingChange>,
    tx: &mpsc::UnboundedSender<FileChange>,
    count: usize,
) {
    let mut by_age: Vec<(Instant, PathBuf)> =
        pending.iter().map(|entry| (entry.first_seen, entry.key().clone())).collect();
    by_age.sort();

    for (_, path) in by_age.into_iter().take(count) {
        if let Some((_, pending_change)) = pending.remove(&path) {
            send(tx, pending_change.change);
        }
    }
}

fn flush_all(pending: &DashMap<PathBuf, PendingChange>, tx: &mpsc::UnboundedSender<FileChange>) {
    flush_oldest(pending, tx, usize::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ChangeType;

    #[tokio::test]
    async fn test_debouncer_aggregates_rapid_changes() {
        let config = DebouncerConfig {
            delay_ms: 100,
            max_buffer_size: 100,
        };

        let debouncer = Debouncer::new(config);
        let (tx, mut rx) = debouncer.start();

        tx.send(FileChange::created("download.zip")).unwrap();
        for _ in 0..5 {
            tx.send(FileChange::modified("download.zip")).unwrap();
            sleep(Duration::from_millis(10)).await;
        }

        sleep(Duration::from_millis(250)).await;

        let mut received = Vec::new();
        while let Ok(change) = rx.try_recv() {
            received.push(change);
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].change_type, ChangeType::Created);
    }

    #[tokio::test]
    async fn test_debouncer_separate_files() {
        let config = DebouncerConfig {
            delay_ms: 100,
            max_buffer_size: 100,
        };

        let debouncer = Debouncer::new(config);
        let (tx, mut rx) = debouncer.start();

        tx.send(FileChange::modified("file1.txt")).unwrap();
        tx.send(FileChange::modified("file2.txt")).unwrap();

        sleep(Duration::from_millis(250)).await;

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_closing_input_flushes_pending() {
        let config = DebouncerConfig {
            delay_ms: 60_000,
            max_buffer_size: 100,
        };
        let (tx, mut rx) = Debouncer::new(config).start();

        tx.send(FileChange::created("slow.bin")).unwrap();
        drop(tx);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.path, PathBuf::from("slow.bin"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_buffer_flushes_instead_of_dropping() {
        let config = DebouncerConfig {
            delay_ms: 60_000,
            max_buffer_size: 2,
        };
        let (tx, mut rx) = Debouncer::new(config).start();

        for name in ["a", "b", "c"] {
            tx.send(FileChange::created(name)).unwrap();
        }

        let first = rx.recv().await.unwrap();
        assert_eq!(first.path, PathBuf::from("a"));
    }
}
