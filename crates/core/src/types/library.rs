//! Library and library path domain models

use super::common::define_id;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

define_id!(
    /// Unique identifier for a library
    LibraryId
);

define_id!(
    /// Unique identifier for a library root path
    LibraryPathId
);

/// One root directory belonging to exactly one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryPath {
    pub id: LibraryPathId,
    pub library_id: LibraryId,
    pub path: PathBuf,
}

impl LibraryPath {
    pub fn new(library_id: LibraryId, path: impl Into<PathBuf>) -> Self {
        Self {
            id: LibraryPathId::new(),
            library_id,
            path: path.into(),
        }
    }
}

/// A collection of books stored under one or more root directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    /// Whether the filesystem watcher should observe this library's roots
    pub watch: bool,
    /// Naming pattern for book files; `None` means the configured default
    pub file_naming_pattern: Option<String>,
    pub paths: Vec<LibraryPath>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LibraryId::new(),
            name: name.into(),
            watch: false,
            file_naming_pattern: None,
            paths: Vec::new(),
        }
    }

    /// Adds a root directory and returns its id
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> LibraryPathId {
        let library_path = LibraryPath::new(self.id, path);
        let id = library_path.id;
        self.paths.push(library_path);
        id
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_naming_pattern = Some(pattern.into());
        self
    }

    /// Looks up one of this library's roots
    pub fn path(&self, id: LibraryPathId) -> Option<&LibraryPath> {
        self.paths.iter().find(|p| p.id == id)
    }

    /// All root directories of this library
    pub fn root_dirs(&self) -> Vec<PathBuf> {
        self.paths.iter().map(|p| p.path.clone()).collect()
    }
}
