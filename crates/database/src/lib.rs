//! Folio Database Layer
//!
//! SQLite persistence for libraries, library paths, books and book files,
//! using sqlx for queries and transactions.

pub mod connection;
pub mod migrations;
pub mod queries;

pub use connection::{begin, DbPool, DbTransaction};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{books, libraries};
    use connection::create_test_db;
    use folio_core::{AppError, Book, BookMetadata, Library};

    #[tokio::test]
    async fn test_database_migrations() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::database("Failed to count migrations", e))?;

        assert_eq!(count, current_version());
        Ok(())
    }

    #[tokio::test]
    async fn test_full_database_workflow() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;

        let mut library = Library::new("Fiction").with_watch(true);
        let path_id = library.add_path("/books/fiction");
        libraries::create_library(&pool, &library).await?;

        let book = Book::new(
            library.id,
            path_id,
            BookMetadata::new("Workflow Book").with_author("Test Author"),
            "Test Author",
            "workflow.epub",
        );
        books::create_book(&pool, &book).await?;

        let retrieved = books::get_book(&pool, book.id).await?;
        assert_eq!(retrieved.metadata.title, "Workflow Book");
        assert_eq!(retrieved.metadata.authors, vec!["Test Author".to_string()]);
        assert_eq!(retrieved.primary_file.file_sub_path, "Test Author");

        let stored_library = libraries::get_library(&pool, library.id).await?;
        assert!(stored_library.watch);
        assert_eq!(stored_library.paths.len(), 1);

        Ok(())
    }
}
