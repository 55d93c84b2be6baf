//! Library filesystem watching
//!
//! [`WatcherControl`] is the narrow surface the move orchestrator drives:
//! which roots are watched, stop watching, wait for queued events, start
//! watching again. [`LibraryWatcher`] implements it on top of `notify`.
//!
//! Every raw event is counted against its library root when it is queued and
//! uncounted once it has been handed to the consumer, so
//! [`WatcherControl::wait_for_events_drained`] can tell when nothing for a set
//! of roots is still in flight.

use crate::error::{LibraryError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use folio_config::WatcherConfig;
use folio_core::{Library, LibraryId};
use log::{debug, error, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Error as NotifyError, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// Control surface over the library watcher
#[async_trait]
pub trait WatcherControl: Send + Sync {
    /// Root paths currently watched for any of `ids`
    async fn paths_for_libraries(&self, ids: &[LibraryId]) -> HashSet<PathBuf>;

    async fn is_library_monitored(&self, id: LibraryId) -> bool;

    /// Stops watching `id`. Events already queued may still be delivered.
    async fn unregister_library(&self, id: LibraryId);

    async fn unregister_libraries(&self, ids: &[LibraryId]) {
        for id in ids {
            self.unregister_library(*id).await;
        }
    }

    /// Waits until no queued events remain under `paths`.
    ///
    /// Returns `false` if `timeout` elapsed first.
    async fn wait_for_events_drained(&self, paths: &HashSet<PathBuf>, timeout: Duration) -> bool;

    /// (Re)starts watching `library` if its `watch` flag is set
    async fn register_library(&self, library: &Library) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// A change observed inside a watched library
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub library_id: LibraryId,
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

struct QueuedEvent {
    root: PathBuf,
    event: WatchEvent,
}

struct LibraryWatch {
    roots: Vec<PathBuf>,
    _watcher: RecommendedWatcher,
}

type PendingCounts = Arc<DashMap<PathBuf, usize>>;

/// `notify`-backed watcher with one recursive watch per library
pub struct LibraryWatcher {
    watches: Mutex<HashMap<LibraryId, LibraryWatch>>,
    pending: PendingCounts,
    queue_tx: mpsc::Sender<QueuedEvent>,
    poll_interval: Duration,
}

impl LibraryWatcher {
    /// Creates the watcher and the receiver its events are delivered on.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &WatcherConfig) -> (Self, mpsc::Receiver<WatchEvent>) {
        let capacity = config.event_channel_capacity.max(1);
        let (queue_tx, mut queue_rx) = mpsc::channel::<QueuedEvent>(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let pending: PendingCounts = Arc::new(DashMap::new());

        let counts = pending.clone();
        tokio::spawn(async move {
            while let Some(queued) = queue_rx.recv().await {
                // A closed receiver just means nobody is listening
                let _ = event_tx.send(queued.event).await;
                release(&counts, &queued.root);
            }
            debug!("Watcher dispatch loop finished");
        });

        let watcher = Self {
            watches: Mutex::new(HashMap::new()),
            pending,
            queue_tx,
            poll_interval: config.drain_poll_interval(),
        };
        (watcher, event_rx)
    }

    /// Number of events still queued under any of `paths`
    pub fn pending_events(&self, paths: &HashSet<PathBuf>) -> usize {
        self.pending
            .iter()
            .filter(|entry| {
                paths
                    .iter()
                    .any(|p| entry.key().starts_with(p) || p.starts_with(entry.key()))
            })
            .map(|entry| *entry.value())
            .sum()
    }

    fn create_watcher(&self, library_id: LibraryId, roots: Vec<PathBuf>) -> Result<RecommendedWatcher> {
        let queue_tx = self.queue_tx.clone();
        let pending = self.pending.clone();

        notify::recommended_watcher(move |res: std::result::Result<Event, NotifyError>| {
            match res {
                Ok(event) => {
                    for (kind, path) in classify(&event) {
                        let Some(root) = roots.iter().find(|r| path.starts_with(r)).cloned()
                        else {
                            continue;
                        };

                        *pending.entry(root.clone()).or_insert(0) += 1;
                        let queued = QueuedEvent {
                            root: root.clone(),
                            event: WatchEvent {
                                library_id,
                                kind,
                                path,
                            },
                        };
                        if queue_tx.blocking_send(queued).is_err() {
                            release(&pending, &root);
                        }
                    }
                }
                Err(e) => error!("Watch error for library {}: {}", library_id, e),
            }
        })
        .map_err(|e| LibraryError::WatcherError(format!("Failed to create watcher: {}", e)))
    }
}

#[async_trait]
impl WatcherControl for LibraryWatcher {
    async fn paths_for_libraries(&self, ids: &[LibraryId]) -> HashSet<PathBuf> {
        let watches = self.watches.lock().await;
        ids.iter()
            .filter_map(|id| watches.get(id))
            .flat_map(|watch| watch.roots.iter().cloned())
            .collect()
    }

    async fn is_library_monitored(&self, id: LibraryId) -> bool {
        self.watches.lock().await.contains_key(&id)
    }

    async fn unregister_library(&self, id: LibraryId) {
        if self.watches.lock().await.remove(&id).is_some() {
            info!("Stopped watching library {}", id);
        }
    }

    async fn wait_for_events_drained(&self, paths: &HashSet<PathBuf>, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = self.pending_events(paths);
            if remaining == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    "Drain timed out after {:?} with {} events pending",
                    timeout, remaining
                );
                return false;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn register_library(&self, library: &Library) -> Result<()> {
        if !library.watch {
            if self.watches.lock().await.remove(&library.id).is_some() {
                info!("Library {} no longer watched", library.id);
            } else {
                debug!("Library {} has watching disabled, not registering", library.id);
            }
            return Ok(());
        }

        let roots: Vec<PathBuf> = library
            .root_dirs()
            .into_iter()
            .filter(|root| {
                let exists = root.is_dir();
                if !exists {
                    warn!("Skipping non-existent library root: {}", root.display());
                }
                exists
            })
            .collect();

        let mut watcher = self.create_watcher(library.id, roots.clone())?;
        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| {
                    LibraryError::WatcherError(format!(
                        "Failed to watch path {}: {}",
                        root.display(),
                        e
                    ))
                })?;
            info!("Watching {} for library '{}'", root.display(), library.name);
        }

        self.watches.lock().await.insert(
            library.id,
            LibraryWatch {
                roots,
                _watcher: watcher,
            },
        );
        Ok(())
    }
}

fn release(pending: &DashMap<PathBuf, usize>, root: &Path) {
    if let Some(mut count) = pending.get_mut(root) {
        *count = count.saturating_sub(1);
    }
}

/// Maps a raw notify event onto the changes a consumer cares about
fn classify(event: &Event) -> Vec<(WatchEventKind, PathBuf)> {
    let all = |kind: WatchEventKind| -> Vec<(WatchEventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match event.kind {
        EventKind::Create(_) => all(WatchEventKind::Created),
        EventKind::Remove(_) => all(WatchEventKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(WatchEventKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push((WatchEventKind::Removed, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((WatchEventKind::Created, to.clone()));
            }
            changes
        }
        EventKind::Modify(_) => all(WatchEventKind::Modified),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};
    use tempfile::TempDir;

    fn watched_library(root: &Path) -> Library {
        let mut library = Library::new("Test").with_watch(true);
        library.add_path(root);
        library
    }

    #[test]
    fn test_classify_rename_both() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/lib/a.epub"))
            .add_path(PathBuf::from("/lib/b.epub"));

        assert_eq!(
            classify(&event),
            vec![
                (WatchEventKind::Removed, PathBuf::from("/lib/a.epub")),
                (WatchEventKind::Created, PathBuf::from("/lib/b.epub")),
            ]
        );
    }

    #[test]
    fn test_classify_create_and_modify() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/x"));
        assert_eq!(classify(&created), vec![(WatchEventKind::Created, PathBuf::from("/x"))]);

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/x"));
        assert_eq!(classify(&modified), vec![(WatchEventKind::Modified, PathBuf::from("/x"))]);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any));
        assert!(classify(&access).is_empty());
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let dir = TempDir::new().unwrap();
        let (watcher, _events) = LibraryWatcher::new(&WatcherConfig::default());
        let library = watched_library(dir.path());

        watcher.register_library(&library).await.unwrap();
        assert!(watcher.is_library_monitored(library.id).await);
        let paths = watcher.paths_for_libraries(&[library.id]).await;
        assert!(paths.contains(dir.path()));

        watcher.unregister_library(library.id).await;
        assert!(!watcher.is_library_monitored(library.id).await);
        assert!(watcher.paths_for_libraries(&[library.id]).await.is_empty());
    }

    #[tokio::test]
    async fn test_unwatched_library_is_not_registered() {
        let dir = TempDir::new().unwrap();
        let (watcher, _events) = LibraryWatcher::new(&WatcherConfig::default());
        let library = watched_library(dir.path()).with_watch(false);

        watcher.register_library(&library).await.unwrap();
        assert!(!watcher.is_library_monitored(library.id).await);
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() {
        let dir = TempDir::new().unwrap();
        let (watcher, _events) = LibraryWatcher::new(&WatcherConfig::default());
        let mut library = watched_library(dir.path());
        library.add_path(dir.path().join("missing"));

        watcher.register_library(&library).await.unwrap();
        let paths = watcher.paths_for_libraries(&[library.id]).await;
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_pending() {
        let (watcher, _events) = LibraryWatcher::new(&WatcherConfig::default());
        let paths: HashSet<PathBuf> = [PathBuf::from("/nowhere")].into_iter().collect();
        assert!(watcher.wait_for_events_drained(&paths, Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_events_are_delivered_and_drained() {
        let dir = TempDir::new().unwrap();
        let (watcher, mut events) = LibraryWatcher::new(&WatcherConfig::default());
        let library = watched_library(dir.path());
        watcher.register_library(&library).await.unwrap();

        let file = dir.path().join("new.epub");
        std::fs::write(&file, "x").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                if event.kind == WatchEventKind::Created && event.path == file {
                    return Some(event);
                }
            }
            None
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(received.library_id, library.id);

        watcher.unregister_library(library.id).await;
        let paths: HashSet<PathBuf> = [dir.path().to_path_buf()].into_iter().collect();
        // Drain the receiver so the dispatch loop can finish
        let drain = async {
            loop {
                if watcher.pending_events(&paths) == 0 {
                    break;
                }
                let _ = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drain).await.unwrap();
        assert!(watcher.wait_for_events_drained(&paths, Duration::from_millis(100)).await);
    }
}
