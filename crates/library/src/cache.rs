//! In-process book cache
//!
//! Reads go through the cache; every mutation invalidates the entry so the
//! next read comes from the database.

use dashmap::DashMap;
use folio_core::{Book, BookId};

#[derive(Debug, Default)]
pub struct BookCache {
    books: DashMap<BookId, Book>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: BookId) -> Option<Book> {
        self.books.get(&id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, book: Book) {
        self.books.insert(book.id, book);
    }

    /// Drops the cached copy; returns whether one existed
    pub fn invalidate(&self, id: BookId) -> bool {
        self.books.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{BookMetadata, LibraryId, LibraryPathId};

    #[test]
    fn test_insert_get_invalidate() {
        let cache = BookCache::new();
        let book = Book::new(
            LibraryId::new(),
            LibraryPathId::new(),
            BookMetadata::new("Dune"),
            "",
            "dune.epub",
        );
        let id = book.id;

        assert!(cache.get(id).is_none());
        cache.insert(book.clone());
        assert_eq!(cache.get(id), Some(book));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(id));
        assert!(!cache.invalidate(id));
        assert!(cache.is_empty());
    }
}
