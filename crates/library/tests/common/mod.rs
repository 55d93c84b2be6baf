//! Shared fixtures for reorganization tests

#![allow(dead_code)]

use async_trait::async_trait;
use folio_core::{Book, BookFile, BookMetadata, Library, LibraryId, LibraryPathId};
use folio_database::connection::{connect, DatabaseConfig};
use folio_database::{queries, run_migrations, DbPool};
use folio_library::{FileMoveService, LibraryResult, MoveSettings, WatcherControl};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A watcher call together with what the disk check saw at that moment
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherCall {
    Unregister { library_id: LibraryId, on_disk: bool },
    Drain { paths: HashSet<PathBuf> },
    Register { library_id: LibraryId, watch: bool, on_disk: bool },
}

type DiskCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// In-memory stand-in for the filesystem watcher that records every call
#[derive(Default)]
pub struct RecordingWatcher {
    watched: Mutex<HashMap<LibraryId, Vec<PathBuf>>>,
    calls: Mutex<Vec<WatcherCall>>,
    disk_check: Mutex<Option<DiskCheck>>,
    close_on_drain: Mutex<Option<DbPool>>,
}

impl RecordingWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs `check` on every unregister/register call and records its answer
    pub fn set_disk_check(&self, check: impl Fn() -> bool + Send + Sync + 'static) {
        *self.disk_check.lock().unwrap() = Some(Box::new(check));
    }

    /// Closes `pool` while the next drain is awaited, after libraries were paused
    pub fn close_pool_on_drain(&self, pool: DbPool) {
        *self.close_on_drain.lock().unwrap() = Some(pool);
    }

    pub fn calls(&self) -> Vec<WatcherCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn watched_ids(&self) -> HashSet<LibraryId> {
        self.watched.lock().unwrap().keys().copied().collect()
    }

    fn run_disk_check(&self) -> bool {
        self.disk_check
            .lock()
            .unwrap()
            .as_ref()
            .map(|check| check())
            .unwrap_or(true)
    }
}

#[async_trait]
impl WatcherControl for RecordingWatcher {
    async fn paths_for_libraries(&self, ids: &[LibraryId]) -> HashSet<PathBuf> {
        let watched = self.watched.lock().unwrap();
        ids.iter()
            .filter_map(|id| watched.get(id))
            .flatten()
            .cloned()
            .collect()
    }

    async fn is_library_monitored(&self, id: LibraryId) -> bool {
        self.watched.lock().unwrap().contains_key(&id)
    }

    async fn unregister_library(&self, id: LibraryId) {
        let on_disk = self.run_disk_check();
        self.watched.lock().unwrap().remove(&id);
        self.calls.lock().unwrap().push(WatcherCall::Unregister {
            library_id: id,
            on_disk,
        });
    }

    async fn wait_for_events_drained(&self, paths: &HashSet<PathBuf>, _timeout: Duration) -> bool {
        self.calls.lock().unwrap().push(WatcherCall::Drain {
            paths: paths.clone(),
        });
        let pool = self.close_on_drain.lock().unwrap().take();
        if let Some(pool) = pool {
            pool.close().await;
        }
        true
    }

    async fn register_library(&self, library: &Library) -> LibraryResult<()> {
        let on_disk = self.run_disk_check();
        {
            let mut watched = self.watched.lock().unwrap();
            if library.watch {
                watched.insert(library.id, library.root_dirs());
            } else {
                watched.remove(&library.id);
            }
        }
        self.calls.lock().unwrap().push(WatcherCall::Register {
            library_id: library.id,
            watch: library.watch,
            on_disk,
        });
        Ok(())
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub pool: DbPool,
    pub watcher: Arc<RecordingWatcher>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("folio.db");
        let pool = connect(DatabaseConfig::new(db_path.to_string_lossy().to_string()))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        Self {
            dir,
            pool,
            watcher: RecordingWatcher::new(),
        }
    }

    pub fn settings() -> MoveSettings {
        MoveSettings {
            event_drain_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..MoveSettings::default()
        }
    }

    pub fn service(&self) -> FileMoveService {
        FileMoveService::new(self.pool.clone(), self.watcher.clone(), Self::settings())
    }

    /// Creates a library with one root under the temp dir and stores it
    pub async fn library(
        &self,
        name: &str,
        watch: bool,
        pattern: Option<&str>,
    ) -> (Library, LibraryPathId, PathBuf) {
        let root = self.dir.path().join(name);
        std::fs::create_dir_all(&root).unwrap();

        let mut library = Library::new(name).with_watch(watch);
        if let Some(pattern) = pattern {
            library = library.with_pattern(pattern);
        }
        let path_id = library.add_path(&root);
        queries::create_library(&self.pool, &library).await.unwrap();

        if watch {
            self.watcher.register_library(&library).await.unwrap();
            self.watcher.clear_calls();
        }

        (library, path_id, root)
    }

    /// Stores `book` after writing each of its files under `root`
    pub async fn book(&self, book: Book, root: &Path) -> Book {
        for file in book.files() {
            write_file(&file.full_path(root));
        }
        queries::create_book(&self.pool, &book).await.unwrap();
        book
    }

    pub async fn reload(&self, book: &Book) -> Book {
        queries::get_book(&self.pool, book.id).await.unwrap()
    }
}

pub fn write_file(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
}

/// A book with a primary EPUB, a cover image and a PDF alternate
pub fn dune(library: &Library, path_id: LibraryPathId, sub_path: &str) -> Book {
    let metadata = BookMetadata::new("Dune").with_author("Frank Herbert");
    let book = Book::new(library.id, path_id, metadata, sub_path, "dune.epub");
    let id = book.id;
    book.with_additional_file(BookFile::supplementary(id, sub_path, "cover.jpg"))
        .with_additional_file(BookFile::book_format(id, sub_path, "dune.pdf"))
}

/// Every file under `dir` whose name ends with `suffix`
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.to_string_lossy().ends_with(suffix) {
                found.push(path);
            }
        }
    }
    found
}
