use super::*;
use folio_database::migrations::run_migrations;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    db_path: String,
    pool: DbPool,
}

async fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("folio.db").to_string_lossy().to_string();
    let pool = connect(DatabaseConfig::new(db_path.as_str())).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Fixture { dir, db_path, pool }
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.reorganize.event_drain_timeout_ms = 0;
    config.reorganize.settle_delay_ms = 0;
    config
}

fn sub_matches(args: &[&str]) -> ArgMatches {
    let mut argv = vec!["folio"];
    argv.extend_from_slice(args);
    let mut matches = crate::build_cli().try_get_matches_from(argv).unwrap();
    let mut current = matches.remove_subcommand().unwrap().1;
    while let Some((_, sub)) = current.remove_subcommand() {
        current = sub;
    }
    current
}

/// Stores a library rooted at `<tmp>/<name>` and returns it with its root
async fn stored_library(fixture: &Fixture, name: &str, pattern: &str) -> (Library, PathBuf) {
    let root = fixture.dir.path().join(name);
    std::fs::create_dir_all(&root).unwrap();
    let root = std::fs::canonicalize(root).unwrap();

    let mut library = Library::new(name).with_pattern(pattern);
    library.add_path(&root);
    queries::create_library(&fixture.pool, &library).await.unwrap();
    (library, root)
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"data").unwrap();
}

#[test]
fn test_locate_splits_sub_path_and_name() {
    let mut library = Library::new("Fiction");
    let path_id = library.add_path("/books");

    let (id, sub_path, name) = locate(&library, Path::new("/books/Frank Herbert/Dune/dune.epub")).unwrap();
    assert_eq!(id, path_id);
    assert_eq!(sub_path, "Frank Herbert/Dune");
    assert_eq!(name, "dune.epub");

    let (_, sub_path, name) = locate(&library, Path::new("/books/loose.pdf")).unwrap();
    assert_eq!(sub_path, "");
    assert_eq!(name, "loose.pdf");
}

#[test]
fn test_locate_rejects_files_outside_library() {
    let mut library = Library::new("Fiction");
    library.add_path("/books");

    assert!(locate(&library, Path::new("/elsewhere/dune.epub")).is_err());
    assert!(locate(&library, Path::new("/bookshelf/dune.epub")).is_err());
}

#[test]
fn test_companion_file_kind_follows_extension() {
    let id = BookId::new();
    assert!(companion_file(id, String::new(), "dune.pdf".to_string()).is_book);
    assert!(!companion_file(id, String::new(), "cover.jpg".to_string()).is_book);
}

#[test]
fn test_parse_id_reports_what_was_invalid() {
    let err = parse_id::<BookId>("not-a-uuid", "book").unwrap_err();
    assert!(err.to_string().contains("Invalid book ID"));

    let id = BookId::new();
    assert_eq!(parse_id::<BookId>(&id.to_string(), "book").unwrap(), id);
}

#[test]
fn test_location_helpers() {
    assert_eq!(join_location("", "a.epub"), "a.epub");
    assert_eq!(join_location("x/y", "a.epub"), "x/y/a.epub");
    assert_eq!(file_stem("Dune.epub"), "Dune");
    assert_eq!(kind_label(WatchEventKind::Removed), "removed");
}

#[tokio::test]
async fn test_add_book_then_move_renames_file() {
    let fixture = setup().await;
    let (library, root) = stored_library(&fixture, "fiction", "{authors}/{title}").await;
    let primary = root.join("incoming/dune.epub");
    let cover = root.join("incoming/cover.jpg");
    touch(&primary);
    touch(&cover);

    let library_id = library.id.to_string();
    let primary_arg = primary.to_string_lossy().to_string();
    let cover_arg = cover.to_string_lossy().to_string();
    let args = sub_matches(&[
        "book", "add", &library_id, &primary_arg, "--title", "Dune", "--author", "Frank Herbert",
        "--extra", &cover_arg,
    ]);
    add_book(&fixture.db_path, &args).await.unwrap();

    let books = queries::list_books_in_library(&fixture.pool, library.id)
        .await
        .unwrap();
    assert_eq!(books.len(), 1);
    let book = &books[0];
    assert_eq!(book.primary_file.file_sub_path, "incoming");
    assert_eq!(book.additional_files.len(), 1);

    let book_id = book.id.to_string();
    let args = sub_matches(&["move", &book_id]);
    move_book(&fixture.db_path, &quiet_config(), &args)
        .await
        .unwrap();

    assert!(root.join("Frank Herbert/Dune.epub").is_file());
    assert!(!primary.exists());
    let stored = queries::get_book(&fixture.pool, book.id).await.unwrap();
    assert_eq!(stored.primary_file.file_sub_path, "Frank Herbert");
    assert_eq!(stored.primary_file.file_name, "Dune.epub");
}

#[tokio::test]
async fn test_bulk_move_carries_companion_files() {
    let fixture = setup().await;
    let (source, source_root) = stored_library(&fixture, "inbox", "{title}").await;
    let (target, target_root) = stored_library(&fixture, "shelf", "{authors}/{title}").await;

    touch(&source_root.join("dune.epub"));
    touch(&source_root.join("cover.jpg"));
    let book = Book::new(
        source.id,
        source.paths[0].id,
        BookMetadata::new("Dune").with_author("Frank Herbert"),
        "",
        "dune.epub",
    );
    let book = book.with_additional_file(BookFile::supplementary(BookId::new(), "", "cover.jpg"));
    queries::create_book(&fixture.pool, &book).await.unwrap();

    let target_id = target.id.to_string();
    let path_id = target.paths[0].id.to_string();
    let book_id = book.id.to_string();
    let args = sub_matches(&["bulk-move", "--library", &target_id, "--path", &path_id, &book_id]);
    bulk_move(&fixture.db_path, &quiet_config(), &args)
        .await
        .unwrap();

    assert!(target_root.join("Frank Herbert/Dune.epub").is_file());
    assert!(target_root.join("Frank Herbert/cover.jpg").is_file());
    assert!(!source_root.join("dune.epub").exists());
    assert!(source_root.is_dir());
}

#[tokio::test]
async fn test_add_book_outside_library_fails() {
    let fixture = setup().await;
    let (library, _root) = stored_library(&fixture, "fiction", "{title}").await;
    let stray = fixture.dir.path().join("stray/book.epub");
    touch(&stray);

    let library_id = library.id.to_string();
    let stray_arg = stray.to_string_lossy().to_string();
    let args = sub_matches(&["book", "add", &library_id, &stray_arg]);

    assert!(add_book(&fixture.db_path, &args).await.is_err());
    assert!(queries::list_books_in_library(&fixture.pool, library.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_init_checks_existing_database() {
    let fixture = setup().await;
    let manager = ConfigManager::with_directory(fixture.dir.path().join("config")).unwrap();

    init(&fixture.db_path, true, &manager).await.unwrap();
    assert!(manager.config_path().is_file());

    // Second run keeps the config and checks the database again
    init(&fixture.db_path, true, &manager).await.unwrap();
}

#[tokio::test]
async fn test_init_rejects_a_file_that_is_not_a_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("folio.db");
    std::fs::write(&db_path, "definitely not sqlite ".repeat(64)).unwrap();
    let manager = ConfigManager::with_directory(dir.path().join("config")).unwrap();

    let result = init(&db_path.to_string_lossy(), true, &manager).await;
    assert!(result.is_err());
}
