//! Folio Library Reorganization
//!
//! Moves book files on disk to match their library's naming pattern while a
//! filesystem watcher observes the same directories. The orchestrator in
//! [`mover`] pauses the watcher around its own moves so they are never
//! mistaken for external changes.

pub mod cache;
pub mod error;
pub mod events;
pub mod file_ops;
pub mod mover;
pub mod pattern;
pub mod planner;
pub mod watcher;

pub use cache::BookCache;
pub use error::{LibraryError, LibraryResult};
pub use events::{BookEvent, NotificationHub, Topic};
pub use file_ops::PlannedMove;
pub use mover::{BulkMoveRequest, BulkMoveSummary, FileMoveResult, FileMoveService, MoveSettings};
pub use pattern::{PathPatternResolver, PatternResolver};
pub use planner::{MovePlan, PathPlanner, PlannedLocation};
pub use watcher::{LibraryWatcher, WatchEvent, WatchEventKind, WatcherControl};
