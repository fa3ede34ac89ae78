//! InfoTracker CLI - T-SQL column lineage extraction

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use infotracker_cli::cli::{Cli, Command, DiffArgs, ExtractArgs, ImpactArgs, OutputFormat};
use infotracker_cli::config::{ConfigFile, ResolvedDiff, ResolvedExtract, ResolvedImpact};
use infotracker_cli::pipeline::{build_column_graph, extract_corpus, CorpusInput};
use infotracker_cli::{catalog, discovery, encoding, output, revision};
use infotracker_core::{parse_selector, walk as impact_walk, ExtractOptions, ObjectDbRegistry, SchemaRegistry};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_filter());

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("infotracker: error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<u8> {
    let config = ConfigFile::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Extract(args) => run_extract(&config, args, cli.format),
        Command::Impact(args) => run_impact(&config, args, cli.format),
        Command::Diff(args) => run_diff(&config, args, cli.format),
    }
}

fn run_extract(config: &ConfigFile, args: &ExtractArgs, format: OutputFormat) -> Result<u8> {
    let resolved = ResolvedExtract::resolve(config, args)?;

    let mut schema_registry = SchemaRegistry::new();
    if let Some(catalog_path) = &resolved.catalog {
        catalog::load_into(catalog_path, &resolved.default_database, &mut schema_registry)?;
    }

    let object_db_registry = infotracker_export::load_object_db_registry(&resolved.out_dir, &resolved.default_database)?;

    let ignore = {
        let mut patterns = resolved.ignore.clone();
        patterns.extend(discovery::load_ignore_file(&resolved.sql_dir)?);
        patterns
    };
    let matcher = discovery::FileMatcher::new(&resolved.include, &resolved.exclude, &ignore)?;
    let paths = discovery::discover_sql_files(&resolved.sql_dir, &matcher)?;

    let encoding_arg = args.encoding;
    let mut inputs = Vec::with_capacity(paths.len());
    for relative_path in &paths {
        let bytes = std::fs::read(resolved.sql_dir.join(relative_path))
            .with_context(|| format!("failed to read {}", relative_path.display()))?;
        let content = encoding::decode_and_normalize(&bytes, encoding_arg)
            .with_context(|| format!("failed to decode {}", relative_path.display()))?;
        inputs.push(CorpusInput { relative_path: relative_path.clone(), content });
    }

    let options = ExtractOptions {
        dialect: infotracker_core::Dialect::Mssql,
        default_database: resolved.default_database.clone(),
        default_schema: resolved.default_schema.clone(),
        dbt_mode: resolved.dbt_mode,
        rename_hints: Default::default(),
    };
    let corpus = extract_corpus(inputs, &options, schema_registry, object_db_registry, Utc::now());

    for (relative_path, document) in &corpus.documents {
        infotracker_export::write_object_document(&resolved.out_dir, &relative_path.to_string_lossy(), document)?;
    }
    let graph = build_column_graph(&corpus.objects);
    infotracker_export::write_column_graph(&resolved.out_dir, &graph)?;
    infotracker_export::save_object_db_registry(&resolved.out_dir, &corpus.object_db_registry)?;

    output::print_extract_summary(format, corpus.documents.len(), &corpus.issues, &resolved.out_dir);
    if format == OutputFormat::Text {
        // issues are already printed to stderr by print_extract_summary's text branch
    }
    Ok(output::exit_code_for_extract(&corpus.issues, resolved.fail_on_warn))
}

fn run_impact(config: &ConfigFile, args: &ImpactArgs, format: OutputFormat) -> Result<u8> {
    let resolved = ResolvedImpact::resolve(config, args)?;
    let graph = infotracker_export::load_column_graph(&resolved.out_dir)
        .with_context(|| format!("no column_graph.json under {} — run `extract` first", resolved.out_dir.display()))?;

    let default_database = config.default_database.clone().unwrap_or_else(|| "InfoTrackerDW".to_string());
    let (reference, selector_direction) =
        parse_selector(&args.selector, &default_database).with_context(|| format!("invalid selector {:?}", args.selector))?;
    let direction = selector_direction
        .or_else(|| args.direction.map(Into::into))
        .unwrap_or(infotracker_core::Direction::Downstream);

    let nodes = impact_walk(&graph, &reference, direction, args.max_depth);
    output::print_impact(format, &nodes);
    Ok(0)
}

fn run_diff(config: &ConfigFile, args: &DiffArgs, format: OutputFormat) -> Result<u8> {
    let resolved = ResolvedDiff::resolve(config, args)?;
    let repo_path = std::env::current_dir().context("failed to resolve current directory")?;

    let default_database = config.default_database.clone().unwrap_or_else(|| "InfoTrackerDW".to_string());
    let default_schema = config.default_schema.clone().unwrap_or_else(|| "dbo".to_string());
    let options = ExtractOptions {
        dialect: infotracker_core::Dialect::Mssql,
        default_database: default_database.clone(),
        default_schema,
        dbt_mode: config.dbt_mode,
        rename_hints: Default::default(),
    };

    let base_objects = extract_revision(&repo_path, &args.base, &resolved.sql_dir, &options)?;
    let head_objects = extract_revision(&repo_path, &args.head, &resolved.sql_dir, &options)?;

    let report = infotracker_core::diff::diff_corpus(&base_objects, &head_objects);
    output::print_diff(format, &report);
    Ok(output::exit_code_for_diff(&report, resolved.severity_threshold) as u8)
}

fn extract_revision(
    repo_path: &Path,
    revision_name: &str,
    sql_dir: &Path,
    options: &ExtractOptions,
) -> Result<Vec<infotracker_core::ObjectInfo>> {
    let files = revision::read_sql_at_revision(repo_path, revision_name, sql_dir)
        .with_context(|| format!("failed to read sql_dir at revision {revision_name:?}"))?;
    let inputs = files
        .into_iter()
        .map(|f| {
            let content = encoding::decode_and_normalize(&f.bytes, None)?;
            Ok(CorpusInput { relative_path: f.relative_path, content })
        })
        .collect::<Result<Vec<_>, encoding::EncodingDetectError>>()
        .with_context(|| format!("failed to decode sql files at revision {revision_name:?}"))?;

    let corpus = extract_corpus(inputs, options, SchemaRegistry::new(), ObjectDbRegistry::new(&options.default_database), Utc::now());
    Ok(corpus.objects)
}
