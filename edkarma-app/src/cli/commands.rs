use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::config::ServerConfig;

use anyhow::{Context, Result};
use edkarma_client::HttpConnector;
use edkarma_core::{
    Course, ErrorConfig, ErrorKind, ErrorReporter, Notifier, ScoreMap, StoreRouter,
    Summary,
};
use edkarma_sqlite::SqliteScoreRepo;
use edkarma_sync::JsonTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BACKUPS_KEPT: usize = 10;

/// Cooldown applied to the server error kinds.
const SERVER_ERROR_COOLDOWN_SECS: u64 = 600;

pub async fn run_cli(args: Cli) -> Result<()> {
    let table = args.table;
    match args.cmd {
        Command::Serve(cmd) => serve_cmd(cmd).await,
        Command::Keys(cmd) => keys_cmd(cmd),
        Command::Course(cmd) => course_cmd(&open_router(table).await?, cmd).await,
        Command::Score(cmd) => score_cmd(&open_router(table).await?, cmd).await,
        Command::Summary(cmd) => summary_cmd(&open_router(table).await?, cmd).await,
        Command::Sync { course } => {
            open_router(table).await?.sync_to_server(course).await?;
            println!("ok");
            Ok(())
        }
    }
}

pub async fn open_router(table: Option<PathBuf>) -> Result<StoreRouter> {
    let table = match table {
        Some(path) => {
            let backups = path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups");
            JsonTable::open_with(path, backups, BACKUPS_KEPT).await?
        }
        None => JsonTable::open_default().await?,
    };
    let connector = HttpConnector::new()?;
    Ok(StoreRouter::new(Arc::new(table), Arc::new(connector)))
}

/// Prints surfaced messages as one line on stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: ErrorKind, message: &str) {
        eprintln!("edkarma: {message} ({kind})");
    }
}

pub fn error_reporter() -> ErrorReporter {
    let reporter = ErrorReporter::new(Box::new(ConsoleNotifier));
    for kind in [
        ErrorKind::ServerUnauthorised,
        ErrorKind::ServerUnavailable,
        ErrorKind::ServerUnauthorisedSavedLocally,
        ErrorKind::ServerUnavailableSavedLocally,
    ] {
        reporter.configure(kind, ErrorConfig::cooldown(SERVER_ERROR_COOLDOWN_SECS));
    }
    reporter
}

async fn course_cmd(router: &StoreRouter, cmd: CourseCmd) -> Result<()> {
    match cmd {
        CourseCmd::List => {
            for c in router.get_all_courses().await?.into_values() {
                print_course(&c);
            }
        }
        CourseCmd::Show { course } => match router.get_course_details(course).await? {
            Some(c) => println!("{}", serde_json::to_string_pretty(&c)?),
            None => println!("course {course} not found"),
        },
        CourseCmd::Info(i) => {
            router
                .set_course_info(i.course, &i.code, &i.name, i.status.into())
                .await?;
            println!("ok");
        }
        CourseCmd::Settings(s) => {
            router
                .set_course_settings(s.course, s.storage.into(), &s.base_url, &s.api_key)
                .await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn score_cmd(router: &StoreRouter, cmd: ScoreCmd) -> Result<()> {
    match cmd {
        ScoreCmd::Get {
            course,
            posts,
            replies,
        } => {
            let scores = router.get_scores(course, &posts, &replies).await?;
            print_scores("post", &scores.posts);
            print_scores("reply", &scores.replies);
        }
        ScoreCmd::Post(a) => {
            router
                .update_post(a.course, a.id, a.user_id, &a.user_name, a.karma)
                .await?;
            println!("ok");
        }
        ScoreCmd::Reply(a) => {
            router
                .update_reply(a.course, a.id, a.user_id, &a.user_name, a.karma)
                .await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn summary_cmd(router: &StoreRouter, cmd: SummaryCmd) -> Result<()> {
    let summary = router.get_summary(cmd.course).await?;
    match cmd.csv {
        Some(path) => {
            write_summary_csv(&summary, &path)?;
            println!("wrote {}", path.display());
        }
        None => {
            for row in summary.values() {
                println!(
                    "{}\t{}\tposts={}\treplies={}\tkarma={}",
                    row.id, row.name, row.posts, row.replies, row.karma
                );
            }
        }
    }
    Ok(())
}

async fn serve_cmd(cmd: ServeCmd) -> Result<()> {
    let config = ServerConfig::load(&cmd.config)?;
    if config.api_keys.is_empty() {
        tracing::warn!(config = %cmd.config.display(), "no API keys configured; every request will be rejected");
    }
    let repo = open_repository(&config, &cmd.config).await?;
    let addr: std::net::SocketAddr = cmd.addr.parse()?;
    api_server::run(Arc::new(repo), config.api_keys, addr).await
}

/// Opens the server's database, creating its directory if needed.
pub async fn open_repository(config: &ServerConfig, config_path: &Path) -> Result<SqliteScoreRepo> {
    let db = config.database_path(config_path);
    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    SqliteScoreRepo::open_file(&db)
        .await
        .with_context(|| format!("opening {}", db.display()))
}

fn keys_cmd(cmd: KeysCmd) -> Result<()> {
    let mut config = ServerConfig::load_or_default(&cmd.config)?;
    let issued = config.add_users(cmd.users.iter().map(String::as_str));
    config.save(&cmd.config)?;
    for (user, key) in &issued {
        println!("{user}\t{key}");
    }
    tracing::info!(issued = issued.len(), config = %cmd.config.display(), "updated API keys");
    Ok(())
}

// ===== Helpers =====
fn print_course(c: &Course) {
    let status = match c.status {
        edkarma_core::CourseStatus::Active => "active",
        edkarma_core::CourseStatus::Archived => "archived",
    };
    let storage = match c.settings.storage.kind {
        edkarma_core::StorageType::Local => "local".to_string(),
        edkarma_core::StorageType::Server => format!("server {}", c.settings.storage.base_url),
    };
    println!("{}\t{}\t{}\t{}\t{}", c.id, c.code, c.name, status, storage);
}

fn print_scores(label: &str, map: &ScoreMap) {
    for e in map.values() {
        println!("{label}\t{}\t{}\t{}\tkarma={}", e.id, e.user_id, e.user_name, e.karma);
    }
}

pub fn write_summary_csv(summary: &Summary, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["userId", "userName", "posts", "replies", "karma"])?;
    for row in summary.values() {
        wtr.write_record([
            row.id.to_string(),
            row.name.clone(),
            row.posts.to_string(),
            row.replies.to_string(),
            row.karma.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
