//! Book database operations

use super::{book_files, parse_id};
use crate::DbPool;
use folio_core::{
    AppError, Book, BookId, BookMetadata, LibraryId, LibraryPathId, Timestamp,
};
use sqlx::{Row, SqliteConnection};

const BOOK_COLUMNS: &str = r#"
    id, library_id, library_path_id, title, subtitle, authors, series_name,
    series_number, published_year, language, publisher, isbn, added_date
"#;

/// Creates a new book together with all of its files
pub async fn create_book(pool: &DbPool, book: &Book) -> Result<(), AppError> {
    let authors_json = serde_json::to_string(&book.metadata.authors)
        .map_err(|e| AppError::database("Failed to serialize authors", e))?;

    let mut tx = crate::begin(pool).await?;

    sqlx::query(
        r#"
        INSERT INTO books (
            id, library_id, library_path_id, title, subtitle, authors, series_name,
            series_number, published_year, language, publisher, isbn, added_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(book.id.as_string())
    .bind(book.library_id.as_string())
    .bind(book.library_path_id.as_string())
    .bind(&book.metadata.title)
    .bind(&book.metadata.subtitle)
    .bind(authors_json)
    .bind(&book.metadata.series_name)
    .bind(book.metadata.series_number)
    .bind(book.metadata.published_year)
    .bind(&book.metadata.language)
    .bind(&book.metadata.publisher)
    .bind(&book.metadata.isbn)
    .bind(book.added_date.as_millis())
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::database("Failed to create book", e))?;

    book_files::insert_file(&mut tx, &book.primary_file, 0, true).await?;
    for (position, file) in book.additional_files.iter().enumerate() {
        book_files::insert_file(&mut tx, file, position as i64 + 1, false).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit book", e))?;

    Ok(())
}

/// Gets a book by ID, including its primary and additional files
pub async fn get_book(pool: &DbPool, id: BookId) -> Result<Book, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch book", e))?
        .ok_or_else(|| AppError::not_found("Book", id))?;

    let files = book_files::list_files_for_book(pool, id).await?;
    row_to_book(row, files)
}

/// Lists every book stored in a library
pub async fn list_books_in_library(
    pool: &DbPool,
    library_id: LibraryId,
) -> Result<Vec<Book>, AppError> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM books WHERE library_id = ? ORDER BY title")
            .bind(library_id.as_string())
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::database("Failed to list books", e))?;

    let mut books = Vec::with_capacity(ids.len());
    for id in ids {
        books.push(get_book(pool, parse_id("books.id", &id)?).await?);
    }
    Ok(books)
}

/// Points a book at a new library and library path
///
/// Runs on the caller's connection so it can join a wider transaction.
pub async fn update_book_location(
    conn: &mut SqliteConnection,
    id: BookId,
    library_id: LibraryId,
    library_path_id: LibraryPathId,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE books SET library_id = ?, library_path_id = ? WHERE id = ?")
        .bind(library_id.as_string())
        .bind(library_path_id.as_string())
        .bind(id.as_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to update book location", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Book", id));
    }
    Ok(())
}

/// Replaces a book's descriptive metadata
pub async fn update_book_metadata(
    pool: &DbPool,
    id: BookId,
    metadata: &BookMetadata,
) -> Result<(), AppError> {
    let authors_json = serde_json::to_string(&metadata.authors)
        .map_err(|e| AppError::database("Failed to serialize authors", e))?;

    let result = sqlx::query(
        r#"
        UPDATE books SET
            title = ?, subtitle = ?, authors = ?, series_name = ?, series_number = ?,
            published_year = ?, language = ?, publisher = ?, isbn = ?
        WHERE id = ?
        "#,
    )
    .bind(&metadata.title)
    .bind(&metadata.subtitle)
    .bind(authors_json)
    .bind(&metadata.series_name)
    .bind(metadata.series_number)
    .bind(metadata.published_year)
    .bind(&metadata.language)
    .bind(&metadata.publisher)
    .bind(&metadata.isbn)
    .bind(id.as_string())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update book metadata", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Book", id));
    }
    Ok(())
}

/// Deletes a book and its file records (hard delete)
pub async fn delete_book(pool: &DbPool, id: BookId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id.as_string())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete book", e))?;

    Ok(())
}

/// Converts a book row plus its file rows into a Book
fn row_to_book(
    row: sqlx::sqlite::SqliteRow,
    files: Vec<(bool, folio_core::BookFile)>,
) -> Result<Book, AppError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing book ID", e))?;
    let id: BookId = parse_id("books.id", &id_str)?;

    let library_id: String = row
        .try_get("library_id")
        .map_err(|e| AppError::database("Missing library ID", e))?;
    let library_path_id: String = row
        .try_get("library_path_id")
        .map_err(|e| AppError::database("Missing library path ID", e))?;

    let authors_json: String = row
        .try_get("authors")
        .map_err(|e| AppError::database("Missing authors", e))?;
    let authors: Vec<String> = serde_json::from_str(&authors_json)
        .map_err(|e| AppError::database("Failed to deserialize authors", e))?;

    let added_date_ms: i64 = row
        .try_get("added_date")
        .map_err(|e| AppError::database("Missing added date", e))?;

    let mut primary_file = None;
    let mut additional_files = Vec::new();
    for (is_primary, file) in files {
        if is_primary && primary_file.is_none() {
            primary_file = Some(file);
        } else {
            additional_files.push(file);
        }
    }
    let primary_file = primary_file.ok_or_else(|| AppError::InvalidStoredValue {
        field: "book_files.is_primary".to_string(),
        value: format!("no primary file for book {}", id),
    })?;

    Ok(Book {
        id,
        library_id: parse_id("books.library_id", &library_id)?,
        library_path_id: parse_id("books.library_path_id", &library_path_id)?,
        metadata: BookMetadata {
            title: row
                .try_get("title")
                .map_err(|e| AppError::database("Missing title", e))?,
            subtitle: row.try_get("subtitle").ok().flatten(),
            authors,
            series_name: row.try_get("series_name").ok().flatten(),
            series_number: row.try_get("series_number").ok().flatten(),
            published_year: row.try_get("published_year").ok().flatten(),
            language: row.try_get("language").ok().flatten(),
            publisher: row.try_get("publisher").ok().flatten(),
            isbn: row.try_get("isbn").ok().flatten(),
        },
        primary_file,
        additional_files,
        added_date: Timestamp::from_millis(added_date_ms),
    })
}
