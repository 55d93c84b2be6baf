//! Book and book file domain models

use super::common::define_id;
use crate::types::{BookMetadata, LibraryId, LibraryPathId, Timestamp, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

define_id!(
    /// Unique identifier for a book
    BookId
);

define_id!(
    /// Unique identifier for one physical file of a book
    BookFileId
);

/// Format family of a book-format file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookType {
    Epub,
    Pdf,
    Cbx,
    Fb2,
    Mobi,
    Azw3,
    Audiobook,
}

impl BookType {
    /// Detects the book type from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            "cbz" | "cbr" | "cb7" => Some(Self::Cbx),
            "fb2" => Some(Self::Fb2),
            "mobi" => Some(Self::Mobi),
            "azw3" | "azw" => Some(Self::Azw3),
            "m4b" | "m4a" | "mp3" => Some(Self::Audiobook),
            _ => None,
        }
    }

    /// Stable name used for persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "EPUB",
            Self::Pdf => "PDF",
            Self::Cbx => "CBX",
            Self::Fb2 => "FB2",
            Self::Mobi => "MOBI",
            Self::Azw3 => "AZW3",
            Self::Audiobook => "AUDIOBOOK",
        }
    }

    /// Parses the persisted name produced by [`BookType::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EPUB" => Some(Self::Epub),
            "PDF" => Some(Self::Pdf),
            "CBX" => Some(Self::Cbx),
            "FB2" => Some(Self::Fb2),
            "MOBI" => Some(Self::Mobi),
            "AZW3" => Some(Self::Azw3),
            "AUDIOBOOK" => Some(Self::Audiobook),
            _ => None,
        }
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical file on disk, located relative to a library root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookFile {
    pub id: BookFileId,
    pub book_id: BookId,
    pub file_name: String,
    /// Directory relative to the library root; empty for the root itself
    pub file_sub_path: String,
    /// `true` for book-format files, `false` for supplementary assets
    pub is_book: bool,
    pub book_type: Option<BookType>,
}

impl BookFile {
    /// Creates a book-format file, detecting its type from the extension
    pub fn book_format(
        book_id: BookId,
        file_sub_path: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into();
        let book_type = extension_of(&file_name).and_then(BookType::from_extension);
        Self {
            id: BookFileId::new(),
            book_id,
            file_name,
            file_sub_path: file_sub_path.into(),
            is_book: true,
            book_type,
        }
    }

    /// Creates a supplementary file (cover art, companion document, ...)
    pub fn supplementary(
        book_id: BookId,
        file_sub_path: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: BookFileId::new(),
            book_id,
            file_name: file_name.into(),
            file_sub_path: file_sub_path.into(),
            is_book: false,
            book_type: None,
        }
    }

    /// Resolves the absolute path of this file under `root`
    pub fn full_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        if !self.file_sub_path.is_empty() {
            path.push(&self.file_sub_path);
        }
        path.push(&self.file_name);
        path
    }

    /// The file extension without the dot, if any
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.file_name)
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    Path::new(file_name).extension().and_then(|e| e.to_str())
}

/// A book: one primary file plus any additional files, stored in one library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub library_id: LibraryId,
    pub library_path_id: LibraryPathId,
    pub metadata: BookMetadata,
    pub primary_file: BookFile,
    pub additional_files: Vec<BookFile>,
    pub added_date: Timestamp,
}

impl Book {
    /// Creates a book whose primary file lives at `file_sub_path/file_name`
    pub fn new(
        library_id: LibraryId,
        library_path_id: LibraryPathId,
        metadata: BookMetadata,
        file_sub_path: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let id = BookId::new();
        Self {
            id,
            library_id,
            library_path_id,
            metadata,
            primary_file: BookFile::book_format(id, file_sub_path, file_name),
            additional_files: Vec::new(),
            added_date: Timestamp::now(),
        }
    }

    /// Attaches an additional file owned by this book
    pub fn with_additional_file(mut self, mut file: BookFile) -> Self {
        file.book_id = self.id;
        self.additional_files.push(file);
        self
    }

    /// Primary file first, then additional files in order
    pub fn files(&self) -> impl Iterator<Item = &BookFile> {
        std::iter::once(&self.primary_file).chain(self.additional_files.iter())
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut BookFile> {
        std::iter::once(&mut self.primary_file).chain(self.additional_files.iter_mut())
    }

    /// Absolute path of the primary file under `root`
    pub fn primary_path(&self, root: &Path) -> PathBuf {
        self.primary_file.full_path(root)
    }
}

impl Validator for Book {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.metadata.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }

        for file in self.files() {
            if file.file_name.trim().is_empty() {
                errors.push(format!("File {} has an empty name", file.id));
            }
            if Path::new(&file.file_sub_path).is_absolute() {
                errors.push(format!(
                    "File {} has an absolute sub-path: {}",
                    file.id, file.file_sub_path
                ));
            }
            if file.book_id != self.id {
                errors.push(format!("File {} belongs to another book", file.id));
            }
        }

        if !self.primary_file.is_book {
            errors.push("Primary file must be a book-format file".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
