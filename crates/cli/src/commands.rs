use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use console::style;
use folio_config::{Config, ConfigManager};
use folio_core::{Book, BookFile, BookId, BookMetadata, BookType, Library, LibraryId, LibraryPathId};
use folio_database::{
    connection::{close, connect, DatabaseConfig},
    optimize, queries, verify_integrity, DbPool,
};
use folio_library::{
    BulkMoveRequest, FileMoveService, LibraryWatcher, MoveSettings, WatchEventKind, WatcherControl,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Write a default config file if none exists, then check and optimize the
/// database. `existed` tells whether the database file was there before this
/// run created it.
pub async fn init(db_path: &str, existed: bool, manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;

    let pool = connect_db(db_path).await?;
    verify_integrity(&pool)
        .await
        .context("Database integrity check failed")?;
    optimize(&pool).await.context("Failed to optimize database")?;
    close(pool).await;

    if existed {
        println!("{} Database at {} is healthy", style("✓").green().bold(), db_path);
    } else {
        println!("{} Database created at {}", style("✓").green().bold(), db_path);
    }
    if created {
        println!("Config written to {}", manager.config_path().display());
    } else {
        println!("Using existing config at {}", manager.config_path().display());
    }
    Ok(())
}

/// Create a library
pub async fn add_library(db_path: &str, matches: &ArgMatches) -> Result<()> {
    let name = required(matches, "name")?;
    let mut library = Library::new(name).with_watch(matches.get_flag("watch"));
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        library = library.with_pattern(pattern.as_str());
    }

    for dir in matches.get_many::<String>("path").into_iter().flatten() {
        let root = std::fs::canonicalize(dir)
            .with_context(|| format!("Library root not found: {}", dir))?;
        if !root.is_dir() {
            bail!("Library root is not a directory: {}", root.display());
        }
        library.add_path(root);
    }

    let pool = connect_db(db_path).await?;
    queries::create_library(&pool, &library)
        .await
        .context("Failed to create library")?;

    println!("{} Library created: {}", style("✓").green().bold(), library.name);
    print_library(&library);
    Ok(())
}

/// List every library with its roots
pub async fn list_libraries(db_path: &str) -> Result<()> {
    let pool = connect_db(db_path).await?;
    let libraries = queries::list_libraries(&pool)
        .await
        .context("Failed to list libraries")?;

    if libraries.is_empty() {
        println!("No libraries yet. Use 'library add' to create one.");
        return Ok(());
    }

    println!("\n{} Libraries", style(libraries.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for library in &libraries {
        print_library(library);
    }
    Ok(())
}

/// Register an existing file, and optionally its companions, as a book
pub async fn add_book(db_path: &str, matches: &ArgMatches) -> Result<()> {
    let library_id: LibraryId = parse_id(required(matches, "library")?, "library")?;
    let file = required(matches, "file")?;

    let pool = connect_db(db_path).await?;
    let library = queries::get_library(&pool, library_id)
        .await
        .context("Failed to load library")?;

    let file = std::fs::canonicalize(file).with_context(|| format!("File not found: {}", file))?;
    let (path_id, sub_path, file_name) = locate(&library, &file)?;

    let title = matches
        .get_one::<String>("title")
        .cloned()
        .unwrap_or_else(|| file_stem(&file_name));
    let mut metadata = BookMetadata::new(title);
    for author in matches.get_many::<String>("author").into_iter().flatten() {
        metadata = metadata.with_author(author.as_str());
    }
    if let Some(series) = matches.get_one::<String>("series") {
        metadata = metadata.with_series(
            series.as_str(),
            matches.get_one::<f32>("series-index").copied(),
        );
    }

    let mut book = Book::new(library.id, path_id, metadata, sub_path, file_name);
    for extra in matches.get_many::<String>("extra").into_iter().flatten() {
        let extra = std::fs::canonicalize(extra)
            .with_context(|| format!("File not found: {}", extra))?;
        let (extra_path_id, sub_path, file_name) = locate(&library, &extra)?;
        if extra_path_id != path_id {
            bail!(
                "{} is under a different library root than the primary file",
                extra.display()
            );
        }
        let file = companion_file(book.id, sub_path, file_name);
        book = book.with_additional_file(file);
    }

    queries::create_book(&pool, &book)
        .await
        .context("Failed to add book to database")?;

    println!("{} Book added successfully!", style("✓").green().bold());
    println!("  ID: {}", book.id);
    println!("  Title: {}", book.metadata.title);
    println!("  Files: {}", book.files().count());
    Ok(())
}

/// Show a book and the absolute paths of its files
pub async fn show_book(db_path: &str, matches: &ArgMatches) -> Result<()> {
    let book_id: BookId = parse_id(required(matches, "id")?, "book")?;

    let pool = connect_db(db_path).await?;
    let book = queries::get_book(&pool, book_id)
        .await
        .context("Failed to get book")?;
    let library = queries::get_library(&pool, book.library_id)
        .await
        .context("Failed to load the book's library")?;

    println!("\n{}", style("Book Information").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("ID: {}", book.id);
    println!("Title: {}", style(&book.metadata.title).bold());
    if !book.metadata.authors.is_empty() {
        println!("Authors: {}", book.metadata.authors_display());
    }
    if let Some(series) = &book.metadata.series_name {
        match book.metadata.series_number_display() {
            Some(number) => println!("Series: {} (#{})", series, number),
            None => println!("Series: {}", series),
        }
    }
    println!("Library: {} ({})", library.name, library.id);

    let root = library.path(book.library_path_id).map(|p| p.path.clone());
    println!("\nFiles:");
    for file in book.files() {
        let marker = if file.id == book.primary_file.id { "*" } else { " " };
        println!("  {} {}", marker, describe_file(file, root.as_deref()));
    }
    Ok(())
}

/// Rename a book's primary file to match its library pattern
pub async fn move_book(db_path: &str, config: &Config, matches: &ArgMatches) -> Result<()> {
    let book_id: BookId = parse_id(required(matches, "id")?, "book")?;

    let pool = connect_db(db_path).await?;
    let book = queries::get_book(&pool, book_id)
        .await
        .context("Failed to get book")?;

    let service = move_service(pool, config);
    let result = service
        .move_single_file(&book)
        .await
        .context("Failed to move book")?;

    let location = join_location(&result.new_file_sub_path, &result.new_file_name);
    if result.moved {
        println!("{} Moved to {}", style("✓").green().bold(), location);
    } else {
        println!("Not moved, file stays at {}", location);
    }
    Ok(())
}

/// Move books, with all their files, into a target library path
pub async fn bulk_move(db_path: &str, config: &Config, matches: &ArgMatches) -> Result<()> {
    let target_library_id: LibraryId = parse_id(required(matches, "library")?, "library")?;
    let target_library_path_id: LibraryPathId = parse_id(required(matches, "path")?, "library path")?;

    let requests = matches
        .get_many::<String>("books")
        .into_iter()
        .flatten()
        .map(|id| {
            Ok(BulkMoveRequest {
                book_id: parse_id(id, "book")?,
                target_library_id,
                target_library_path_id,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let pool = connect_db(db_path).await?;
    let summary = move_service(pool, config).bulk_move_files(&requests).await;

    println!(
        "{} moved, {} skipped, {} failed",
        style(summary.moved).green().bold(),
        style(summary.skipped).yellow(),
        style(summary.failed).red()
    );
    if summary.failed > 0 {
        bail!("{} of {} books could not be moved", summary.failed, requests.len());
    }
    Ok(())
}

/// Watch every library that has watching enabled and print changes until Ctrl-C
pub async fn watch(db_path: &str, config: &Config) -> Result<()> {
    let pool = connect_db(db_path).await?;
    let libraries = queries::list_libraries(&pool)
        .await
        .context("Failed to list libraries")?;

    let (watcher, mut events) = LibraryWatcher::new(&config.watcher);
    let mut watched = 0;
    for library in libraries.iter().filter(|l| l.watch) {
        watcher
            .register_library(library)
            .await
            .with_context(|| format!("Failed to watch library '{}'", library.name))?;
        watched += 1;
    }

    if watched == 0 {
        println!("No library has watching enabled.");
        return Ok(());
    }
    println!(
        "Watching {} libraries, press Ctrl-C to stop",
        style(watched).bold().cyan()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!(
                    "{:>8}  {}  ({})",
                    kind_label(event.kind),
                    event.path.display(),
                    event.library_id
                ),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                println!("\nStopped watching");
                break;
            }
        }
    }
    Ok(())
}

/// Service for the one-shot `move` and `bulk-move` commands.
///
/// Its watcher belongs to this process and starts out empty, so pausing
/// libraries here does not reach a `folio watch` running elsewhere. That
/// process reports the moves as external changes.
fn move_service(pool: DbPool, config: &Config) -> FileMoveService {
    let (watcher, _events) = LibraryWatcher::new(&config.watcher);
    FileMoveService::new(
        pool,
        Arc::new(watcher),
        MoveSettings::from(&config.reorganize),
    )
}

async fn connect_db(db_path: &str) -> Result<DbPool> {
    let config = DatabaseConfig::new(db_path);
    connect(config)
        .await
        .context("Failed to connect to database")
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing required argument: {}", name))
}

fn parse_id<T>(value: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {} ID: {}", what, value))
}

/// Finds the library root containing `file` and splits the rest into
/// `(sub_path, file_name)` with `/` separators
fn locate(library: &Library, file: &Path) -> Result<(LibraryPathId, String, String)> {
    for root in &library.paths {
        let Ok(relative) = file.strip_prefix(&root.path) else {
            continue;
        };
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Not a file: {}", file.display()))?;
        let sub_path = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        return Ok((root.id, sub_path, file_name));
    }
    bail!(
        "{} is not inside any root of library '{}'",
        file.display(),
        library.name
    )
}

fn companion_file(book_id: BookId, sub_path: String, file_name: String) -> BookFile {
    let is_book = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(BookType::from_extension)
        .is_some();
    if is_book {
        BookFile::book_format(book_id, sub_path, file_name)
    } else {
        BookFile::supplementary(book_id, sub_path, file_name)
    }
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

fn join_location(sub_path: &str, file_name: &str) -> String {
    if sub_path.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", sub_path, file_name)
    }
}

fn describe_file(file: &BookFile, root: Option<&Path>) -> String {
    let kind = match file.book_type {
        Some(book_type) => book_type.as_str(),
        None if file.is_book => "BOOK",
        None => "EXTRA",
    };
    let location = match root {
        Some(root) => file.full_path(root),
        None => PathBuf::from(join_location(&file.file_sub_path, &file.file_name)),
    };
    format!("[{}] {}", kind, location.display())
}

fn kind_label(kind: WatchEventKind) -> &'static str {
    match kind {
        WatchEventKind::Created => "created",
        WatchEventKind::Modified => "modified",
        WatchEventKind::Removed => "removed",
    }
}

fn print_library(library: &Library) {
    println!("\n{}", style(&library.name).bold());
    println!(
        "  ID: {} | Watch: {} | Pattern: {}",
        library.id,
        if library.watch { "on" } else { "off" },
        library.file_naming_pattern.as_deref().unwrap_or("(default)")
    );
    for path in &library.paths {
        println!("  Path {}: {}", path.id, path.path.display());
    }
}

#[cfg(test)]
mod tests;
