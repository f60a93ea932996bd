use std::fmt;
use std::sync::Arc;

use assess_core::model::{StatsSnapshot, SyncStatus};
use services::{AppServices, Clock, GatewayConfig, StaticContentCatalog, SyncConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    EmptyToken,
    MissingBaseUrl,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::EmptyToken => write!(f, "--token must not be empty"),
            ArgsError::MissingBaseUrl => write!(f, "ASSESS_API_BASE_URL is not set"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status  [--db <sqlite_url>] [--token <token>]");
    eprintln!("  cargo run -p app -- refresh [--db <sqlite_url>] [--token <token>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://assess.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_API_BASE_URL (required), ASSESS_API_TIMEOUT_SECS, ASSESS_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve the cache, refreshing only when stale.
    Status,
    /// Fetch from the remote service regardless of staleness.
    Refresh,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    token: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://assess.sqlite3".into(), normalize_sqlite_url);
        let mut token = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--token" => {
                    let value = require_value(args, "--token")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::EmptyToken);
                    }
                    token = Some(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, token })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_snapshot(snapshot: &StatsSnapshot) {
    let status = match &snapshot.status {
        SyncStatus::Error { message } => format!("error: {message}"),
        other => format!("{other:?}").to_lowercase(),
    };
    println!("status: {status}");
    match snapshot.last_updated_at {
        Some(at) => println!("last updated: {}", at.to_rfc3339()),
        None => println!("last updated: never"),
    }
    println!();
    println!("{:<20} {:>8} {:>9}", "topic", "best", "accuracy");
    for stat in snapshot.data_or_catalog() {
        let best = stat.highest_score.map_or_else(|| "-".into(), |v| v.to_string());
        let accuracy = stat.accuracy.map_or_else(|| "-".into(), |v| format!("{v}%"));
        println!("{:<20} {best:>8} {accuracy:>9}", stat.title);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.to_string())
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let gateway_config = GatewayConfig::from_env()?.ok_or(ArgsError::MissingBaseUrl)?;

    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(
        &parsed.db_url,
        &gateway_config,
        Arc::new(StaticContentCatalog::new()),
        Clock::default_clock(),
        SyncConfig::default(),
    )
    .await?;

    if let Some(token) = &parsed.token {
        app.storage().set_auth_token(token).await?;
        info!("auth token stored");
    }

    let initial = app.start().await;
    let snapshot = match cmd {
        Command::Status => {
            if let Some(handle) = initial {
                if let Err(err) = handle.await {
                    warn!(error = %err, "initial refresh task failed");
                }
            }
            app.snapshot()
        }
        Command::Refresh => {
            if let Some(handle) = initial {
                handle.abort();
            }
            app.refresh_now().await
        }
    };

    print_snapshot(&snapshot);
    app.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
