//! Book file database operations

use super::parse_id;
use crate::DbPool;
use folio_core::{AppError, BookFile, BookFileId, BookId, BookType};
use sqlx::{Row, SqliteConnection};

const FILE_COLUMNS: &str =
    "id, book_id, file_name, file_sub_path, is_book, is_primary, book_type, position";

/// Inserts one file row for a book
pub(crate) async fn insert_file(
    conn: &mut SqliteConnection,
    file: &BookFile,
    position: i64,
    is_primary: bool,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO book_files (
            id, book_id, file_name, file_sub_path, is_book, is_primary, book_type, position
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.id.as_string())
    .bind(file.book_id.as_string())
    .bind(&file.file_name)
    .bind(&file.file_sub_path)
    .bind(file.is_book as i64)
    .bind(is_primary as i64)
    .bind(file.book_type.map(|t| t.as_str()))
    .bind(position)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to create book file", e))?;

    Ok(())
}

/// Gets a single book file by ID
pub async fn get_book_file(pool: &DbPool, id: BookFileId) -> Result<BookFile, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM book_files WHERE id = ?", FILE_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch book file", e))?
        .ok_or_else(|| AppError::not_found("BookFile", id))?;

    row_to_book_file(&row)
}

/// Lists a book's files, primary first, as `(is_primary, file)` pairs
pub async fn list_files_for_book(
    pool: &DbPool,
    book_id: BookId,
) -> Result<Vec<(bool, BookFile)>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM book_files WHERE book_id = ? ORDER BY is_primary DESC, position",
        FILE_COLUMNS
    ))
    .bind(book_id.as_string())
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list book files", e))?;

    rows.iter()
        .map(|row| {
            let is_primary: i64 = row
                .try_get("is_primary")
                .map_err(|e| AppError::database("Missing is_primary", e))?;
            Ok((is_primary != 0, row_to_book_file(row)?))
        })
        .collect()
}

/// Updates the name and sub-path of every given file on one connection
///
/// Callers pass a transaction so the whole set commits or rolls back together.
pub async fn update_file_locations(
    conn: &mut SqliteConnection,
    files: &[BookFile],
) -> Result<(), AppError> {
    for file in files {
        let result =
            sqlx::query("UPDATE book_files SET file_name = ?, file_sub_path = ? WHERE id = ?")
                .bind(&file.file_name)
                .bind(&file.file_sub_path)
                .bind(file.id.as_string())
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::database("Failed to update book file location", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("BookFile", file.id));
        }
    }
    Ok(())
}

/// Updates the name and sub-path of a single file
pub async fn update_file_location(pool: &DbPool, file: &BookFile) -> Result<(), AppError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| AppError::database("Failed to acquire connection", e))?;
    update_file_locations(&mut conn, std::slice::from_ref(file)).await
}

fn row_to_book_file(row: &sqlx::sqlite::SqliteRow) -> Result<BookFile, AppError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing book file ID", e))?;
    let book_id: String = row
        .try_get("book_id")
        .map_err(|e| AppError::database("Missing book ID", e))?;
    let is_book: i64 = row
        .try_get("is_book")
        .map_err(|e| AppError::database("Missing is_book", e))?;
    let book_type: Option<String> = row.try_get("book_type").ok().flatten();

    Ok(BookFile {
        id: parse_id("book_files.id", &id)?,
        book_id: parse_id("book_files.book_id", &book_id)?,
        file_name: row
            .try_get("file_name")
            .map_err(|e| AppError::database("Missing file name", e))?,
        file_sub_path: row
            .try_get("file_sub_path")
            .map_err(|e| AppError::database("Missing file sub-path", e))?,
        is_book: is_book != 0,
        book_type: book_type.as_deref().and_then(BookType::parse),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use crate::queries::{books::create_book, libraries::create_library};
    use folio_core::{Book, BookMetadata, Library};

    async fn setup_book() -> Result<(DbPool, Book), AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;

        let mut library = Library::new("Main");
        let path_id = library.add_path("/lib");
        create_library(&pool, &library).await?;

        let book = Book::new(library.id, path_id, BookMetadata::new("T"), "A", "t.epub")
            .with_additional_file(BookFile::supplementary(BookId::new(), "A", "cover.jpg"));
        create_book(&pool, &book).await?;
        Ok((pool, book))
    }

    #[tokio::test]
    async fn test_list_files_primary_first() -> Result<(), AppError> {
        let (pool, book) = setup_book().await?;
        let files = list_files_for_book(&pool, book.id).await?;

        assert_eq!(files.len(), 2);
        assert!(files[0].0);
        assert_eq!(files[0].1.file_name, "t.epub");
        assert_eq!(files[0].1.book_type, Some(BookType::Epub));
        assert!(!files[1].0);
        assert!(!files[1].1.is_book);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_locations_in_transaction() -> Result<(), AppError> {
        let (pool, book) = setup_book().await?;

        let mut moved: Vec<BookFile> = book.files().cloned().collect();
        for file in &mut moved {
            file.file_sub_path = "B".to_string();
        }

        let mut tx = crate::begin(&pool).await?;
        update_file_locations(&mut tx, &moved).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::database("commit", e))?;

        let stored = get_book_file(&pool, book.primary_file.id).await?;
        assert_eq!(stored.file_sub_path, "B");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_unknown_file_fails() -> Result<(), AppError> {
        let (pool, book) = setup_book().await?;
        let mut stray = book.primary_file.clone();
        stray.id = BookFileId::new();

        let result = update_file_location(&pool, &stray).await;
        assert!(matches!(result, Err(AppError::RecordNotFound { .. })));
        Ok(())
    }
}
