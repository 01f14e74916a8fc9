use clap::{Args, Parser, Subcommand, ValueEnum};
use edkarma_core::{CourseId, CourseStatus, StorageType};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Active,
    Archived,
}

impl From<StatusArg> for CourseStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Active => CourseStatus::Active,
            StatusArg::Archived => CourseStatus::Archived,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StorageArg {
    Local,
    Server,
}

impl From<StorageArg> for StorageType {
    fn from(s: StorageArg) -> Self {
        match s {
            StorageArg::Local => StorageType::Local,
            StorageArg::Server => StorageType::Server,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(name = "edkarma", version, about = "Ed Karma score store and server")]
pub struct Cli {
    /// Course table file (defaults to the app data dir)
    #[arg(long, global = true)]
    pub table: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Course metadata and storage settings
    #[command(subcommand)]
    Course(CourseCmd),
    /// Read or award scores
    #[command(subcommand)]
    Score(ScoreCmd),
    /// Per-user karma totals for a course
    Summary(SummaryCmd),
    /// Push locally saved scores to the course's server
    Sync { course: CourseId },
    /// Run the karma server
    Serve(ServeCmd),
    /// Issue API keys for server users
    Keys(KeysCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum CourseCmd {
    List,
    Show { course: CourseId },
    Info(CourseInfo),
    Settings(CourseSettingsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CourseInfo {
    pub course: CourseId,
    #[arg(long)]
    pub code: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, value_enum, default_value_t = StatusArg::Active)]
    pub status: StatusArg,
}

#[derive(Debug, Args, Clone)]
pub struct CourseSettingsArgs {
    pub course: CourseId,
    #[arg(long, value_enum)]
    pub storage: StorageArg,
    #[arg(long, default_value = "")]
    pub base_url: String,
    #[arg(long, default_value = "")]
    pub api_key: String,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ScoreCmd {
    Get {
        course: CourseId,
        #[arg(long = "post")]
        posts: Vec<i64>,
        #[arg(long = "reply")]
        replies: Vec<i64>,
    },
    Post(ScoreAward),
    Reply(ScoreAward),
}

#[derive(Debug, Args, Clone)]
pub struct ScoreAward {
    pub course: CourseId,
    /// Post or reply id
    pub id: i64,
    #[arg(long)]
    pub user_id: i64,
    #[arg(long)]
    pub user_name: String,
    #[arg(long)]
    pub karma: i64,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryCmd {
    pub course: CourseId,
    /// Write the summary as CSV instead of printing it
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ServeCmd {
    #[arg(long)]
    pub config: PathBuf,
    /// Bind address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
}

#[derive(Debug, Args, Clone)]
pub struct KeysCmd {
    #[arg(long)]
    pub config: PathBuf,
    #[arg(required = true)]
    pub users: Vec<String>,
}
