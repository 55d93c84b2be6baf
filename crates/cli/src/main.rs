use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use console::style;
use folio_config::{Config, ConfigManager};
use folio_core::AppError;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

const MOVE_WATCH_NOTE: &str = "Stop a running 'folio watch' for the affected libraries first. \
     This command pauses only watchers in its own process, so another process would see the \
     moves as external changes.";

fn id_arg(name: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).value_name(value_name).help(help)
}

fn build_cli() -> Command {
    Command::new("folio")
        .version("0.1.0")
        .about("Ebook library manager that keeps files named after their metadata")
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the database file (overrides app.database_path)")
                .global(true),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml")
                .global(true),
        )
        .subcommand(
            Command::new("init")
                .about("Create the database and a default config file, then check the database"),
        )
        .subcommand(
            Command::new("library")
                .about("Manage libraries")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Create a library with one or more root directories")
                        .arg(Arg::new("name").required(true).value_name("NAME").help("Library name"))
                        .arg(
                            Arg::new("path")
                                .short('p')
                                .long("path")
                                .value_name("DIR")
                                .required(true)
                                .action(ArgAction::Append)
                                .help("Root directory (repeatable)"),
                        )
                        .arg(
                            Arg::new("pattern")
                                .long("pattern")
                                .value_name("PATTERN")
                                .help("File naming pattern, e.g. \"{authors}/{title}\""),
                        )
                        .arg(
                            Arg::new("watch")
                                .short('w')
                                .long("watch")
                                .help("Watch the library for external changes")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("list").about("List libraries and their root directories")),
        )
        .subcommand(
            Command::new("book")
                .about("Manage books")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Register an existing file under one of a library's roots")
                        .arg(id_arg("library", "LIBRARY_ID", "Library ID (UUID)"))
                        .arg(Arg::new("file").required(true).value_name("FILE").help("Primary book file"))
                        .arg(Arg::new("title").short('t').long("title").value_name("TITLE").help("Book title (defaults to the file name)"))
                        .arg(
                            Arg::new("author")
                                .short('a')
                                .long("author")
                                .value_name("AUTHOR")
                                .action(ArgAction::Append)
                                .help("Author (repeatable)"),
                        )
                        .arg(Arg::new("series").long("series").value_name("SERIES").help("Series name"))
                        .arg(
                            Arg::new("series-index")
                                .long("series-index")
                                .value_name("NUMBER")
                                .value_parser(clap::value_parser!(f32))
                                .help("Position within the series"),
                        )
                        .arg(
                            Arg::new("extra")
                                .short('x')
                                .long("extra")
                                .value_name("FILE")
                                .action(ArgAction::Append)
                                .help("Additional file belonging to the book (repeatable)"),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show a book and where its files live")
                        .arg(id_arg("id", "BOOK_ID", "Book ID (UUID)")),
                ),
        )
        .subcommand(
            Command::new("move")
                .about("Rename a book's primary file to match its library pattern")
                .after_help(MOVE_WATCH_NOTE)
                .arg(id_arg("id", "BOOK_ID", "Book ID (UUID)")),
        )
        .subcommand(
            Command::new("bulk-move")
                .about("Move books and all their files into a library path")
                .after_help(MOVE_WATCH_NOTE)
                .arg(
                    Arg::new("library")
                        .short('l')
                        .long("library")
                        .value_name("LIBRARY_ID")
                        .required(true)
                        .help("Target library ID"),
                )
                .arg(
                    Arg::new("path")
                        .short('p')
                        .long("path")
                        .value_name("PATH_ID")
                        .required(true)
                        .help("Target library path ID"),
                )
                .arg(
                    Arg::new("books")
                        .required(true)
                        .num_args(1..)
                        .value_name("BOOK_ID")
                        .help("Books to move"),
                ),
        )
        .subcommand(Command::new("watch").about("Watch every library with watching enabled until Ctrl-C"))
}

fn load_config(config_dir: Option<&String>) -> Result<(ConfigManager, Config)> {
    let manager = match config_dir {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    }
    .context("Failed to locate config directory")?;

    let config = match manager.load_with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring unusable config file: {}", e);
            Config::default()
        }
    };
    Ok((manager, config))
}

async fn ensure_database_ready(db_path: &str) -> Result<()> {
    use folio_database::{
        connection::{close, connect, DatabaseConfig},
        migrations::run_migrations,
    };
    let config = DatabaseConfig::new(db_path);
    let pool = connect(config).await.context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;
    close(pool).await;
    Ok(())
}

/// The storage error behind `error`, if there is one
fn app_error(error: &anyhow::Error) -> Option<&AppError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AppError>())
}

/// Lines printed to stderr when a command fails
fn describe_error(error: &anyhow::Error) -> Vec<String> {
    let mut lines = vec![format!("{} {:#}", style("Error:").red().bold(), error)];
    if let Some(app) = app_error(error) {
        lines.push(format!("  {}", app.user_message()));
        lines.push(format!("  {}", app.recovery_action()));
    }
    lines
}

/// `EX_TEMPFAIL` for errors worth retrying, 1 otherwise
fn exit_status(error: &anyhow::Error) -> u8 {
    if app_error(error).is_some_and(AppError::is_retryable) {
        75
    } else {
        1
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            for line in describe_error(&e) {
                eprintln!("{}", line);
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    let (manager, config) = load_config(matches.get_one::<String>("config-dir"))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    let db_path = matches
        .get_one::<String>("database")
        .cloned()
        .unwrap_or_else(|| config.app.database_path.to_string_lossy().to_string());
    let existed = folio_database::connection::database_exists(&db_path);
    ensure_database_ready(&db_path)
        .await
        .context("Failed to initialize database")?;

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&db_path, existed, &manager).await,
        Some(("library", sub)) => match sub.subcommand() {
            Some(("add", args)) => commands::add_library(&db_path, args).await,
            Some(("list", _)) => commands::list_libraries(&db_path).await,
            _ => show_help(),
        },
        Some(("book", sub)) => match sub.subcommand() {
            Some(("add", args)) => commands::add_book(&db_path, args).await,
            Some(("show", args)) => commands::show_book(&db_path, args).await,
            _ => show_help(),
        },
        Some(("move", args)) => commands::move_book(&db_path, &config, args).await,
        Some(("bulk-move", args)) => commands::bulk_move(&db_path, &config, args).await,
        Some(("watch", _)) => commands::watch(&db_path, &config).await,
        _ => show_help(),
    }
}

fn show_help() -> Result<()> {
    build_cli().print_help()?;
    Ok(())
}
