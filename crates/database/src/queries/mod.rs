//! Database query operations organized by entity

pub mod book_files;
pub mod books;
pub mod libraries;

use folio_core::AppError;
use std::str::FromStr;

// Re-export commonly used query functions
pub use book_files::{get_book_file, list_files_for_book, update_file_location, update_file_locations};
pub use books::{create_book, delete_book, get_book, list_books_in_library, update_book_location};
pub use libraries::{
    add_library_path, create_library, find_libraries_by_ids, get_library, get_library_path,
    list_libraries, set_library_watch,
};

/// Parses a stored identifier column
pub(crate) fn parse_id<T: FromStr>(field: &str, value: &str) -> Result<T, AppError> {
    value.parse().map_err(|_| AppError::InvalidStoredValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::BookId;

    #[test]
    fn test_parse_id() {
        let id = BookId::new();
        let parsed: BookId = parse_id("books.id", &id.as_string()).unwrap();
        assert_eq!(parsed, id);

        let err = parse_id::<BookId>("books.id", "garbage").unwrap_err();
        assert!(matches!(err, AppError::InvalidStoredValue { .. }));
    }
}
