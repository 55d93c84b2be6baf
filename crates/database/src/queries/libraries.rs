//! Library and library path database operations

use super::parse_id;
use crate::DbPool;
use folio_core::{AppError, Library, LibraryId, LibraryPath, LibraryPathId};
use sqlx::Row;
use std::path::PathBuf;

/// Creates a library together with its root paths
pub async fn create_library(pool: &DbPool, library: &Library) -> Result<(), AppError> {
    let mut tx = crate::begin(pool).await?;

    sqlx::query(
        "INSERT INTO libraries (id, name, watch, file_naming_pattern) VALUES (?, ?, ?, ?)",
    )
    .bind(library.id.as_string())
    .bind(&library.name)
    .bind(library.watch as i64)
    .bind(&library.file_naming_pattern)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::database("Failed to create library", e))?;

    for path in &library.paths {
        insert_library_path(&mut tx, path).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit library", e))?;

    Ok(())
}

/// Adds a root path to an existing library
pub async fn add_library_path(pool: &DbPool, path: &LibraryPath) -> Result<(), AppError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| AppError::database("Failed to acquire connection", e))?;
    insert_library_path(&mut conn, path).await
}

async fn insert_library_path(
    conn: &mut sqlx::SqliteConnection,
    path: &LibraryPath,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO library_paths (id, library_id, path) VALUES (?, ?, ?)")
        .bind(path.id.as_string())
        .bind(path.library_id.as_string())
        .bind(path.path.to_string_lossy().into_owned())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to create library path", e))?;
    Ok(())
}

/// Gets a library with all of its root paths
pub async fn get_library(pool: &DbPool, id: LibraryId) -> Result<Library, AppError> {
    let row = sqlx::query(
        "SELECT id, name, watch, file_naming_pattern FROM libraries WHERE id = ?",
    )
    .bind(id.as_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch library", e))?
    .ok_or_else(|| AppError::not_found("Library", id))?;

    let mut library = row_to_library(row)?;
    library.paths = paths_for_library(pool, id).await?;
    Ok(library)
}

/// Lists every library ordered by name
pub async fn list_libraries(pool: &DbPool) -> Result<Vec<Library>, AppError> {
    let rows = sqlx::query("SELECT id, name, watch, file_naming_pattern FROM libraries ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list libraries", e))?;

    let mut libraries = Vec::with_capacity(rows.len());
    for row in rows {
        let mut library = row_to_library(row)?;
        library.paths = paths_for_library(pool, library.id).await?;
        libraries.push(library);
    }
    Ok(libraries)
}

/// Loads every library in `ids` that still exists; missing ids are skipped
pub async fn find_libraries_by_ids(
    pool: &DbPool,
    ids: &[LibraryId],
) -> Result<Vec<Library>, AppError> {
    let mut libraries = Vec::with_capacity(ids.len());
    for id in ids {
        match get_library(pool, *id).await {
            Ok(library) => libraries.push(library),
            Err(e) if e.is_not_found() => {
                log::debug!("Library {} no longer exists", id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(libraries)
}

/// Sets the persisted watch flag of a library
pub async fn set_library_watch(pool: &DbPool, id: LibraryId, watch: bool) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE libraries SET watch = ? WHERE id = ?")
        .bind(watch as i64)
        .bind(id.as_string())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to update library watch flag", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Library", id));
    }
    Ok(())
}

/// Gets a single library path
pub async fn get_library_path(pool: &DbPool, id: LibraryPathId) -> Result<LibraryPath, AppError> {
    let row = sqlx::query("SELECT id, library_id, path FROM library_paths WHERE id = ?")
        .bind(id.as_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch library path", e))?
        .ok_or_else(|| AppError::not_found("LibraryPath", id))?;

    row_to_library_path(row)
}

async fn paths_for_library(pool: &DbPool, id: LibraryId) -> Result<Vec<LibraryPath>, AppError> {
    let rows = sqlx::query(
        "SELECT id, library_id, path FROM library_paths WHERE library_id = ? ORDER BY path",
    )
    .bind(id.as_string())
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch library paths", e))?;

    rows.into_iter().map(row_to_library_path).collect()
}

fn row_to_library(row: sqlx::sqlite::SqliteRow) -> Result<Library, AppError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing library ID", e))?;
    let watch: i64 = row
        .try_get("watch")
        .map_err(|e| AppError::database("Missing watch flag", e))?;

    Ok(Library {
        id: parse_id("libraries.id", &id)?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing library name", e))?,
        watch: watch != 0,
        file_naming_pattern: row.try_get("file_naming_pattern").ok().flatten(),
        paths: Vec::new(),
    })
}

fn row_to_library_path(row: sqlx::sqlite::SqliteRow) -> Result<LibraryPath, AppError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing library path ID", e))?;
    let library_id: String = row
        .try_get("library_id")
        .map_err(|e| AppError::database("Missing library ID", e))?;
    let path: String = row
        .try_get("path")
        .map_err(|e| AppError::database("Missing path", e))?;

    Ok(LibraryPath {
        id: parse_id("library_paths.id", &id)?,
        library_id: parse_id("library_paths.library_id", &library_id)?,
        path: PathBuf::from(path),
    })
}
