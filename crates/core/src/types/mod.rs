//! Domain types for Folio
//!
//! - `library`: libraries and their root paths
//! - `book`: books and the files they own
//! - `metadata`: descriptive metadata fed into naming patterns
//! - `common`: identifiers, timestamps and validation

mod book;
mod common;
mod library;
mod metadata;

pub use book::{Book, BookFile, BookFileId, BookId, BookType};
pub use common::{Timestamp, Validator};
pub use library::{Library, LibraryId, LibraryPath, LibraryPathId};
pub use metadata::BookMetadata;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ids_are_distinct() {
        assert_ne!(BookId::new(), BookId::new());
        assert_ne!(BookFileId::new(), BookFileId::new());
        assert_ne!(LibraryId::new(), LibraryId::new());
        assert_ne!(LibraryPathId::new(), LibraryPathId::new());
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let t2 = Timestamp::now();
        assert!(t2 > t1);
    }
}
