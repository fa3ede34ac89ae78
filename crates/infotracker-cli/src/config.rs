//! `infotracker.yml` config file (spec.md §6) plus the CLI-flag overlay that
//! produces the final, fully-resolved set of options a command runs with.
//!
//! The YAML shape follows spec.md §6's field list directly, loaded with
//! `serde_yaml` the way `infotracker-core`'s own catalog loader does; parsed
//! args are converted into the core's plain option structs, with any
//! explicitly-set CLI flag overriding the config file's value.

use crate::cli::{DiffArgs, ExtractArgs, ImpactArgs};
use anyhow::{Context, Result};
use infotracker_core::ChangeSeverity;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigFile {
    pub default_adapter: Option<String>,
    pub default_database: Option<String>,
    pub default_schema: Option<String>,
    pub sql_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub severity_threshold: Option<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub catalog: Option<PathBuf>,
    pub log_level: Option<String>,
    pub output_format: Option<String>,
    #[serde(default)]
    pub dbt_mode: bool,
}

impl ConfigFile {
    /// Loads `path` if given, else looks for `./infotracker.yml`. Absence of
    /// either is not an error: every field has a sensible built-in default.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let candidate = explicit_path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("infotracker.yml"));
        match std::fs::read_to_string(&candidate) {
            Ok(text) => serde_yaml::from_str(&text).with_context(|| format!("failed to parse {}", candidate.display())),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound && explicit_path.is_none() => Ok(Self::default()),
            Err(source) => Err(source).with_context(|| format!("failed to read {}", candidate.display())),
        }
    }
}

/// Fully resolved options for the `extract` command: config file values
/// overridden by any CLI flag that was actually set.
#[derive(Debug, Clone)]
pub struct ResolvedExtract {
    pub sql_dir: PathBuf,
    pub out_dir: PathBuf,
    pub default_database: String,
    pub default_schema: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub ignore: Vec<String>,
    pub catalog: Option<PathBuf>,
    pub fail_on_warn: bool,
    pub dbt_mode: bool,
}

impl ResolvedExtract {
    pub fn resolve(config: &ConfigFile, args: &ExtractArgs) -> Result<Self> {
        let sql_dir = args
            .sql_dir
            .clone()
            .or_else(|| config.sql_dir.clone())
            .context("--sql-dir is required (or set sql_dir in infotracker.yml)")?;
        let out_dir = args
            .out_dir
            .clone()
            .or_else(|| config.out_dir.clone())
            .context("--out-dir is required (or set out_dir in infotracker.yml)")?;

        Ok(Self {
            sql_dir,
            out_dir,
            default_database: config.default_database.clone().unwrap_or_else(|| "InfoTrackerDW".to_string()),
            default_schema: config.default_schema.clone().unwrap_or_else(|| "dbo".to_string()),
            include: merged(&config.include, &args.include),
            exclude: merged(&config.exclude, &args.exclude),
            ignore: config.ignore.clone(),
            catalog: args.catalog.clone().or_else(|| config.catalog.clone()),
            fail_on_warn: args.fail_on_warn,
            dbt_mode: args.dbt || config.dbt_mode,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedImpact {
    pub out_dir: PathBuf,
}

impl ResolvedImpact {
    pub fn resolve(config: &ConfigFile, args: &ImpactArgs) -> Result<Self> {
        let out_dir = args
            .out_dir
            .clone()
            .or_else(|| config.out_dir.clone())
            .context("--out-dir is required (or set out_dir in infotracker.yml)")?;
        Ok(Self { out_dir })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedDiff {
    pub sql_dir: PathBuf,
    pub severity_threshold: ChangeSeverity,
}

impl ResolvedDiff {
    pub fn resolve(config: &ConfigFile, args: &DiffArgs) -> Result<Self> {
        let sql_dir = args
            .sql_dir
            .clone()
            .or_else(|| config.sql_dir.clone())
            .context("--sql-dir is required (or set sql_dir in infotracker.yml)")?;
        Ok(Self {
            sql_dir,
            severity_threshold: ChangeSeverity::from(args.severity_threshold),
        })
    }
}

fn merged(from_config: &[String], from_args: &[String]) -> Vec<String> {
    if from_args.is_empty() {
        from_config.to_vec()
    } else {
        from_args.to_vec()
    }
}
