//! CLI argument parsing using clap (spec.md §6 "EXTERNAL INTERFACES").

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// InfoTracker - T-SQL column lineage extraction.
#[derive(Parser, Debug)]
#[command(name = "infotracker")]
#[command(about = "Extract column-level lineage from T-SQL", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to infotracker.yml (defaults: ./infotracker.yml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Minimum log level emitted to stderr
    #[arg(long, global = true, default_value = "info", value_enum)]
    pub log_level: LogLevel,

    /// Output rendering for diagnostics and command results
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract lineage for every SQL file under --sql-dir.
    Extract(ExtractArgs),
    /// Walk the column graph produced by `extract` from a starting column.
    Impact(ImpactArgs),
    /// Compare two corpus snapshots and classify schema/lineage changes.
    Diff(DiffArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    /// Directory to scan for SQL files.
    #[arg(long, value_name = "PATH")]
    pub sql_dir: Option<PathBuf>,

    /// Directory the per-file OpenLineage JSONs, column_graph.json, and
    /// object_db_map.json are written to.
    #[arg(long, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    /// SQL dialect used for parsing (InfoTracker is T-SQL-first).
    #[arg(long, value_enum)]
    pub adapter: Option<AdapterArg>,

    /// Catalog YAML seeding the schema registry before extraction.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Glob(s) of files to include (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob(s) of files to exclude (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Input text encoding, or auto-detect.
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Exit with code 1 if any warning was produced.
    #[arg(long)]
    pub fail_on_warn: bool,

    /// Treat every input file as a compiled dbt model.
    #[arg(long)]
    pub dbt: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Column selector, e.g. "dbo.Orders.OrderID" or "+dbo.Orders.OrderID+".
    #[arg(short = 's', long = "selector", value_name = "SELECTOR")]
    pub selector: String,

    /// Direction to walk when the selector doesn't already pin one with `+`.
    #[arg(long, value_enum)]
    pub direction: Option<DirectionArg>,

    /// Maximum walk depth.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Directory column_graph.json was written to by `extract`.
    #[arg(long, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct DiffArgs {
    /// Earlier git revision (e.g. a commit, tag, or branch).
    #[arg(long, value_name = "REV")]
    pub base: String,

    /// Later git revision.
    #[arg(long, value_name = "REV")]
    pub head: String,

    /// Minimum severity that raises the exit code to 2.
    #[arg(long, value_enum, default_value = "potentially-breaking")]
    pub severity_threshold: SeverityArg,

    /// Directory to scan for SQL files at each revision (defaults to sql_dir from config).
    #[arg(long, value_name = "PATH")]
    pub sql_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdapterArg {
    Mssql,
}

impl From<AdapterArg> for infotracker_core::Dialect {
    fn from(_: AdapterArg) -> Self {
        infotracker_core::Dialect::Mssql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Auto,
    #[value(name = "utf-8")]
    Utf8,
    #[value(name = "utf-8-sig")]
    Utf8Sig,
    #[value(name = "utf-16le")]
    Utf16Le,
    #[value(name = "utf-16be")]
    Utf16Be,
    Cp1250,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Upstream,
    Downstream,
    Both,
}

impl From<DirectionArg> for infotracker_core::Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Upstream => infotracker_core::Direction::Upstream,
            DirectionArg::Downstream => infotracker_core::Direction::Downstream,
            DirectionArg::Both => infotracker_core::Direction::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeverityArg {
    NonBreaking,
    PotentiallyBreaking,
    Breaking,
}

impl From<SeverityArg> for infotracker_core::ChangeSeverity {
    fn from(s: SeverityArg) -> Self {
        match s {
            SeverityArg::NonBreaking => infotracker_core::ChangeSeverity::NonBreaking,
            SeverityArg::PotentiallyBreaking => infotracker_core::ChangeSeverity::PotentiallyBreaking,
            SeverityArg::Breaking => infotracker_core::ChangeSeverity::Breaking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extract_subcommand() {
        let cli = Cli::parse_from(["infotracker", "extract", "--sql-dir", "sql", "--out-dir", "out", "--dbt"]);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.sql_dir.unwrap().to_str().unwrap(), "sql");
                assert!(args.dbt);
            }
            _ => panic!("expected Extract"),
        }
    }

    #[test]
    fn parses_impact_subcommand_with_direction() {
        let cli = Cli::parse_from(["infotracker", "impact", "-s", "dbo.Orders.OrderID", "--direction", "upstream"]);
        match cli.command {
            Command::Impact(args) => {
                assert_eq!(args.selector, "dbo.Orders.OrderID");
                assert_eq!(args.direction, Some(DirectionArg::Upstream));
            }
            _ => panic!("expected Impact"),
        }
    }

    #[test]
    fn parses_diff_subcommand_with_default_threshold() {
        let cli = Cli::parse_from(["infotracker", "diff", "--base", "main", "--head", "HEAD"]);
        match cli.command {
            Command::Diff(args) => {
                assert_eq!(args.base, "main");
                assert_eq!(args.severity_threshold, SeverityArg::PotentiallyBreaking);
            }
            _ => panic!("expected Diff"),
        }
    }
}
