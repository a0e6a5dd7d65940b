use std::ffi::OsStr;
use std::path::PathBuf;

use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use pulse_core::RepositoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: table, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ImportArgs {
    #[arg(help = "JSON file with commits, patches, rewrites and pull_request_commits arrays")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RecalculateArgs {
    #[arg(
        long = "repository",
        value_name = "ID",
        required_unless_present = "all",
        conflicts_with = "all",
        help = "Repository to recalculate; repeat for several"
    )]
    pub repositories: Vec<RepositoryId>,

    #[arg(long, help = "Recalculate every repository with raw records")]
    pub all: bool,

    #[arg(
        long,
        value_parser = parse_horizon_end,
        help = "End of the lookback horizon as RFC 3339 (default: now)"
    )]
    pub horizon_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ReportArgs {
    #[arg(long, value_name = "ID", help = "Repository to report on")]
    pub repository: RepositoryId,

    #[arg(
        long,
        default_value_t = 20,
        help = "Number of most recent commits to show (clamped to 1..1000)"
    )]
    pub limit: u32,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AuthorsArgs {
    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct MergeAuthorsArgs {
    #[arg(long, value_name = "ID", help = "Identity that survives the merge")]
    pub keep: i64,

    #[arg(
        long,
        value_delimiter = ',',
        value_name = "ID",
        required = true,
        help = "Comma-separated identities folded into --keep"
    )]
    pub merge: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Load raw commit history records into the workspace store
    Import(ImportArgs),
    /// Recompute derived commit and patch metrics
    Recalculate(RecalculateArgs),
    /// Print calculated commits for a repository
    Report(ReportArgs),
    /// List resolved author identities
    Authors(AuthorsArgs),
    /// Merge author identities into one
    MergeAuthors(MergeAuthorsArgs),
    /// Merge identities whose aliases evidently belong to the same person
    DedupeAuthors,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Pulse commit analytics engine")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding the .pulse directory"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_horizon_end(value: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|timestamp| timestamp.timestamp())
        .map_err(|err| format!("invalid horizon end '{value}': {err}"))
}
