//! Move orchestration
//!
//! Every invocation follows the same shape: stop watching the affected
//! libraries and let their queued events drain, move the files, wait for the
//! filesystem to settle, then watch again. Watching is restored even if the
//! move step panics.

use crate::cache::BookCache;
use crate::error::{LibraryError, Result};
use crate::events::{NotificationHub, Topic};
use crate::file_ops::{self, PlannedMove};
use crate::pattern::{PathPatternResolver, PatternResolver};
use crate::planner::{PathPlanner, PlannedLocation};
use crate::watcher::WatcherControl;
use folio_config::ReorganizeConfig;
use folio_core::{AppError, Book, BookFile, BookId, Library, LibraryId, LibraryPath, LibraryPathId};
use folio_database::{queries, DbPool};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Timing and naming settings for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSettings {
    pub default_pattern: String,
    pub event_drain_timeout: Duration,
    pub settle_delay: Duration,
    pub backup_suffix: String,
}

impl From<&ReorganizeConfig> for MoveSettings {
    fn from(config: &ReorganizeConfig) -> Self {
        Self {
            default_pattern: config.default_file_naming_pattern.clone(),
            event_drain_timeout: config.event_drain_timeout(),
            settle_delay: config.settle_delay(),
            backup_suffix: config.backup_suffix.clone(),
        }
    }
}

impl Default for MoveSettings {
    fn default() -> Self {
        Self::from(&ReorganizeConfig::default())
    }
}

/// One entry of a bulk move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkMoveRequest {
    pub book_id: BookId,
    pub target_library_id: LibraryId,
    pub target_library_path_id: LibraryPathId,
}

/// Counts logged at the end of a bulk move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkMoveSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of [`FileMoveService::move_single_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMoveResult {
    pub moved: bool,
    pub new_file_name: String,
    pub new_file_sub_path: String,
}

impl FileMoveResult {
    fn not_moved(file: &BookFile) -> Self {
        Self {
            moved: false,
            new_file_name: file.file_name.clone(),
            new_file_sub_path: file.file_sub_path.clone(),
        }
    }
}

enum EntryOutcome {
    Moved,
    Unchanged,
}

/// Relocates book files to match their library's naming pattern
pub struct FileMoveService {
    pool: DbPool,
    watcher: Arc<dyn WatcherControl>,
    resolver: Arc<dyn PatternResolver>,
    notifications: NotificationHub,
    cache: Arc<BookCache>,
    settings: MoveSettings,
}

impl FileMoveService {
    pub fn new(pool: DbPool, watcher: Arc<dyn WatcherControl>, settings: MoveSettings) -> Self {
        Self {
            pool,
            watcher,
            resolver: Arc::new(PathPatternResolver::new()),
            notifications: NotificationHub::default(),
            cache: Arc::new(BookCache::new()),
            settings,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PatternResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationHub) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_cache(mut self, cache: Arc<BookCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    pub fn cache(&self) -> &BookCache {
        &self.cache
    }

    pub fn settings(&self) -> &MoveSettings {
        &self.settings
    }

    /// Moves each requested book into its target library path.
    ///
    /// Entries are independent: a missing record or a failed move is logged
    /// and the batch carries on. A failed entry leaves its files and records
    /// exactly as they were. When the affected libraries cannot be loaded at
    /// all, every entry fails and no watcher is touched.
    pub async fn bulk_move_files(&self, moves: &[BulkMoveRequest]) -> BulkMoveSummary {
        if moves.is_empty() {
            return BulkMoveSummary::default();
        }

        let scope = self.affected_libraries(moves).await;
        let snapshot = match self.snapshot_libraries(&scope).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Could not load libraries for bulk move, nothing moved: {}", e);
                return BulkMoveSummary {
                    failed: moves.len(),
                    ..BulkMoveSummary::default()
                };
            }
        };

        let quiesced: Vec<LibraryId> = snapshot.iter().map(|library| library.id).collect();
        let watched = self.watcher.paths_for_libraries(&quiesced).await;
        self.watcher.unregister_libraries(&quiesced).await;
        if !self
            .watcher
            .wait_for_events_drained(&watched, self.settings.event_drain_timeout)
            .await
        {
            debug!(
                "Watcher events for {} paths still pending after {:?}, continuing",
                watched.len(),
                self.settings.event_drain_timeout
            );
        }

        let outcome = AssertUnwindSafe(self.apply_moves(moves, &snapshot))
            .catch_unwind()
            .await;

        tokio::time::sleep(self.settings.settle_delay).await;
        self.resume_libraries(&snapshot).await;

        match outcome {
            Ok(summary) => {
                info!(
                    "Bulk move finished: {} moved, {} skipped, {} failed",
                    summary.moved, summary.skipped, summary.failed
                );
                summary
            }
            Err(panic) => {
                error!("Bulk move aborted by a panic after watchers were restored");
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Renames a book's primary file in place to match the library pattern.
    ///
    /// A failed rename is reported as `moved: false`. Only a library with no
    /// configured paths is returned as an error.
    pub async fn move_single_file(&self, book: &Book) -> Result<FileMoveResult> {
        let library = self.load_library(book.library_id).await?;
        if library.paths.is_empty() {
            return Err(LibraryError::NoLibraryPaths(library.id));
        }
        let root = library_path(&library, book.library_path_id)?.path.clone();

        let plan = PathPlanner::new(self.resolver.as_ref()).plan(
            book,
            &root,
            &root,
            self.pattern_for(&library),
        );
        let primary = plan.primary;
        if !primary.is_changed() {
            debug!("Book {} already at {}", book.id, primary.source.display());
            return Ok(FileMoveResult::not_moved(&book.primary_file));
        }

        let watched = self.watcher.paths_for_libraries(&[library.id]).await;
        let monitored =
            !watched.is_empty() || self.watcher.is_library_monitored(library.id).await;

        if monitored {
            self.watcher.unregister_library(library.id).await;
            if !self
                .watcher
                .wait_for_events_drained(&watched, self.settings.event_drain_timeout)
                .await
            {
                debug!("Watcher events for library {} still pending", library.id);
            }
        }

        let outcome = AssertUnwindSafe(self.relocate_primary(book, &library, &primary))
            .catch_unwind()
            .await;

        if monitored {
            tokio::time::sleep(self.settings.settle_delay).await;
            let mut resumed = library.clone();
            resumed.watch = true;
            if let Err(e) = self.watcher.register_library(&resumed).await {
                error!("Failed to resume watching library {}: {}", library.id, e);
            }
        }

        match outcome {
            Ok(result) => Ok(result),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn relocate_primary(
        &self,
        book: &Book,
        library: &Library,
        primary: &PlannedLocation,
    ) -> FileMoveResult {
        if let Err(e) = file_ops::direct_rename(&primary.source, &primary.target).await {
            error!("Could not move book {}: {}", book.id, e);
            return FileMoveResult::not_moved(&book.primary_file);
        }

        let mut file = book.primary_file.clone();
        file.file_name = primary.new_file_name.clone();
        file.file_sub_path = primary.new_file_sub_path.clone();

        if let Err(e) = queries::update_file_location(&self.pool, &file).await {
            error!(
                "Could not record new location of book {}, restoring file: {}",
                book.id, e
            );
            file_ops::rollback(&primary.target, &primary.source).await;
            return FileMoveResult::not_moved(&book.primary_file);
        }

        self.cache.invalidate(book.id);
        if let Some(parent) = primary.source.parent() {
            let stop_at: HashSet<PathBuf> = library.root_dirs().into_iter().collect();
            file_ops::cleanup_empty_parents(parent, &stop_at).await;
        }

        let mut fallback = book.clone();
        fallback.primary_file = file.clone();
        self.publish_updated(book.id, fallback).await;

        info!(
            "Moved book {}: {} -> {}",
            book.id,
            primary.source.display(),
            primary.target.display()
        );

        FileMoveResult {
            moved: true,
            new_file_name: file.file_name,
            new_file_sub_path: file.file_sub_path,
        }
    }

    async fn apply_moves(
        &self,
        moves: &[BulkMoveRequest],
        libraries: &[Library],
    ) -> BulkMoveSummary {
        let mut summary = BulkMoveSummary::default();
        let libraries: HashMap<LibraryId, &Library> =
            libraries.iter().map(|library| (library.id, library)).collect();

        for request in moves {
            match self.move_entry(request, &libraries).await {
                Ok(EntryOutcome::Moved) => summary.moved += 1,
                Ok(EntryOutcome::Unchanged) => {
                    debug!("Book {} already in place, skipping", request.book_id);
                    summary.skipped += 1;
                }
                Err(e) if e.is_lookup_miss() => {
                    warn!("Skipping move of book {}: {}", request.book_id, e);
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!("Move of book {} rolled back: {}", request.book_id, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Moves one book. Only libraries in `libraries` were quiesced, so any
    /// other library counts as missing.
    async fn move_entry(
        &self,
        request: &BulkMoveRequest,
        libraries: &HashMap<LibraryId, &Library>,
    ) -> Result<EntryOutcome> {
        let book = self.load_book(request.book_id).await?;
        let source_library = *libraries
            .get(&book.library_id)
            .ok_or(LibraryError::LibraryNotFound(book.library_id))?;
        let source_root = library_path(source_library, book.library_path_id)?
            .path
            .clone();
        let target_library = *libraries
            .get(&request.target_library_id)
            .ok_or(LibraryError::LibraryNotFound(request.target_library_id))?;
        let target_root = library_path(target_library, request.target_library_path_id)?
            .path
            .clone();

        let plan = PathPlanner::new(self.resolver.as_ref()).plan(
            &book,
            &source_root,
            &target_root,
            self.pattern_for(target_library),
        );
        if !plan.primary_changed() {
            return Ok(EntryOutcome::Unchanged);
        }

        let mut moves: Vec<PlannedMove> = Vec::new();
        for location in plan.changed() {
            match file_ops::backup_rename(&location.source, &self.settings.backup_suffix).await {
                Ok(temp) => moves.push(PlannedMove::new(
                    location.file_id,
                    location.source.clone(),
                    temp,
                    location.target.clone(),
                )),
                Err(e) => {
                    file_ops::rollback_all(&moves).await;
                    return Err(e);
                }
            }
        }
        if moves.is_empty() {
            return Ok(EntryOutcome::Unchanged);
        }

        let mut updated = book.clone();
        plan.apply_to(&mut updated);
        updated.library_id = request.target_library_id;
        updated.library_path_id = request.target_library_path_id;

        let mut stop_at: HashSet<PathBuf> = source_library.root_dirs().into_iter().collect();
        if let Err(e) = self.commit_entry(&updated, &mut moves).await {
            stop_at.extend(target_library.root_dirs());
            file_ops::rollback_and_prune(&moves, &stop_at).await;
            return Err(e);
        }

        self.cache.invalidate(book.id);

        let parents: BTreeSet<PathBuf> = moves
            .iter()
            .filter_map(|m| m.source.parent().map(Path::to_path_buf))
            .collect();
        for parent in &parents {
            file_ops::cleanup_empty_parents(parent, &stop_at).await;
        }

        self.publish_updated(book.id, updated).await;
        info!(
            "Moved book {} ({} files) into library '{}'",
            book.id,
            moves.len(),
            target_library.name
        );
        Ok(EntryOutcome::Moved)
    }

    /// Writes the new locations and commits the files inside one transaction.
    ///
    /// The transaction is only committed after every file is in place; on
    /// error it is dropped and rolled back.
    async fn commit_entry(&self, updated: &Book, moves: &mut [PlannedMove]) -> Result<()> {
        let mut tx = folio_database::begin(&self.pool).await?;

        let files: Vec<BookFile> = updated.files().cloned().collect();
        queries::update_file_locations(&mut *tx, &files).await?;
        queries::update_book_location(
            &mut *tx,
            updated.id,
            updated.library_id,
            updated.library_path_id,
        )
        .await?;

        for planned in moves.iter_mut() {
            file_ops::commit(&planned.temp, &planned.target).await?;
            planned.committed = true;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit book move", e))?;
        Ok(())
    }

    async fn publish_updated(&self, book_id: BookId, fallback: Book) {
        let book = match self.load_book(book_id).await {
            Ok(book) => book,
            Err(e) => {
                warn!("Could not reload book {} after move: {}", book_id, e);
                fallback
            }
        };
        self.notifications.publish(Topic::BookUpdated, book);
    }

    async fn affected_libraries(&self, moves: &[BulkMoveRequest]) -> Vec<LibraryId> {
        let mut seen = HashSet::new();
        let mut scope = Vec::new();

        for request in moves {
            if let Ok(book) = self.load_book(request.book_id).await {
                if seen.insert(book.library_id) {
                    scope.push(book.library_id);
                }
            }
            if seen.insert(request.target_library_id) {
                scope.push(request.target_library_id);
            }
        }

        scope
    }

    /// Loads the libraries in `scope`, in the same order
    async fn snapshot_libraries(&self, scope: &[LibraryId]) -> Result<Vec<Library>> {
        let snapshot = queries::find_libraries_by_ids(&self.pool, scope).await?;
        if snapshot.len() < scope.len() {
            warn!(
                "{} of {} libraries not found, they will not be paused",
                scope.len() - snapshot.len(),
                scope.len()
            );
        }
        Ok(snapshot)
    }

    /// Registers every quiesced library again, exactly once each.
    ///
    /// Fresh records are preferred; the snapshot taken before the move is
    /// used for any library that cannot be reloaded.
    async fn resume_libraries(&self, snapshot: &[Library]) {
        let ids: Vec<LibraryId> = snapshot.iter().map(|library| library.id).collect();
        let fresh = match queries::find_libraries_by_ids(&self.pool, &ids).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Could not reload libraries, resuming from snapshot: {}", e);
                Vec::new()
            }
        };

        for stale in snapshot {
            let library = fresh
                .iter()
                .find(|library| library.id == stale.id)
                .unwrap_or(stale);
            if let Err(e) = self.watcher.register_library(library).await {
                error!("Failed to resume watching library {}: {}", library.id, e);
            }
        }
    }

    fn pattern_for<'a>(&'a self, library: &'a Library) -> &'a str {
        library
            .file_naming_pattern
            .as_deref()
            .unwrap_or(&self.settings.default_pattern)
    }

    async fn load_book(&self, id: BookId) -> Result<Book> {
        if let Some(book) = self.cache.get(id) {
            return Ok(book);
        }
        match queries::get_book(&self.pool, id).await {
            Ok(book) => {
                self.cache.insert(book.clone());
                Ok(book)
            }
            Err(e) if e.is_not_found() => Err(LibraryError::BookNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_library(&self, id: LibraryId) -> Result<Library> {
        match queries::get_library(&self.pool, id).await {
            Ok(library) => Ok(library),
            Err(e) if e.is_not_found() => Err(LibraryError::LibraryNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn library_path(library: &Library, path_id: LibraryPathId) -> Result<&LibraryPath> {
    library
        .path(path_id)
        .ok_or(LibraryError::LibraryPathNotFound {
            library_id: library.id,
            path_id,
        })
}
