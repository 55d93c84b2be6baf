use folio_core::{AppError, BookId, LibraryId, LibraryPathId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] AppError),

    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    #[error("Library not found: {0}")]
    LibraryNotFound(LibraryId),

    #[error("Library path {path_id} not found in library {library_id}")]
    LibraryPathNotFound {
        library_id: LibraryId,
        path_id: LibraryPathId,
    },

    #[error("Library {0} has no configured paths")]
    NoLibraryPaths(LibraryId),

    #[error("Failed to {operation} {} -> {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        operation: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watcher error: {0}")]
    WatcherError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    /// Missing book, library or library path
    pub fn is_lookup_miss(&self) -> bool {
        match self {
            Self::BookNotFound(_) | Self::LibraryNotFound(_) | Self::LibraryPathNotFound { .. } => {
                true
            }
            Self::Database(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Problems the caller has to fix before retrying
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NoLibraryPaths(_) => true,
            Self::Database(e) => e.is_critical(),
            _ => false,
        }
    }

    pub(crate) fn move_failed(
        operation: &'static str,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::MoveFailed {
            operation,
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
