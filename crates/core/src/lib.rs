//! Folio core domain types
//!
//! Shared records for libraries, library paths, books and their files, plus the
//! workspace-wide error type.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{
    Book, BookFile, BookFileId, BookId, BookMetadata, BookType, Library, LibraryId, LibraryPath,
    LibraryPathId, Timestamp, Validator,
};
