//! Corpus-level extraction orchestration: turns a list of `(relative_path,
//! text)` pairs into extracted objects, threading the shared
//! `SchemaRegistry`/`ObjectDbRegistry` across files in dependency order
//! (spec.md §5), then assembles the OpenLineage documents and column graph.
//!
//! Grounded on `infotracker_core::driver::extract_file` for the per-file
//! pipeline itself; this module only supplies the corpus-level loop the
//! core deliberately leaves to its caller (see `infotracker-core/src/lib.rs`'s
//! doc comment: "never touches a filesystem... `infotracker-cli` crate is
//! responsible for globbing files... and turning results into an exit code").

use chrono::{DateTime, Utc};
use infotracker_core::{
    emit_openlineage, extract_file, with_warnings, ColumnGraph, ExtractOptions, ExtractedFile, FileSource, Issue,
    ObjectDbRegistry, ObjectInfo, OpenLineageDocument, SchemaRegistry,
};
use std::path::{Path, PathBuf};

/// One input file's object hint, derived the same way
/// `infotracker_core::driver`'s private `derive_hint` does (file stem, no
/// directory, no extension) — duplicated here because the core keeps that
/// helper private to its own pipeline, and the CLI needs the same value to
/// stamp the emitted document's job path independently of the object's
/// `qualified_name`.
pub fn derive_object_hint(relative_path: &Path) -> String {
    let file_name = relative_path.file_name().and_then(|n| n.to_str()).unwrap_or("unnamed");
    file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name).to_string()
}

pub struct CorpusInput {
    pub relative_path: PathBuf,
    pub content: String,
}

pub struct ExtractedCorpus {
    pub objects: Vec<ObjectInfo>,
    pub documents: Vec<(PathBuf, OpenLineageDocument)>,
    pub issues: Vec<Issue>,
    pub object_db_registry: ObjectDbRegistry,
}

/// Runs the full per-file driver over `inputs` in dependency order, sharing
/// one `SchemaRegistry`/`ObjectDbRegistry` across the whole corpus (spec.md
/// §5's "mutated cooperatively by the extractor of each file").
pub fn extract_corpus(
    inputs: Vec<CorpusInput>,
    options: &ExtractOptions,
    mut schema_registry: SchemaRegistry,
    mut object_db_registry: ObjectDbRegistry,
    event_time: DateTime<Utc>,
) -> ExtractedCorpus {
    let order_inputs: Vec<(PathBuf, String)> =
        inputs.iter().map(|i| (i.relative_path.clone(), i.content.clone())).collect();
    let order = crate::toposort::order_by_dependencies(&order_inputs);

    let mut objects = Vec::with_capacity(inputs.len());
    let mut documents = Vec::with_capacity(inputs.len());
    let mut issues = Vec::new();

    for index in order {
        let input = &inputs[index];
        let object_hint = derive_object_hint(&input.relative_path);
        let source = FileSource::new(input.relative_path.display().to_string(), input.content.clone()).with_object_hint(object_hint.clone());

        let ExtractedFile { object, issues: file_issues } =
            extract_file(&source, options, &mut schema_registry, &mut object_db_registry);

        let document = with_warnings(
            emit_openlineage(&object, &object_hint, options.dbt_mode, event_time),
            file_issues.clone(),
        );

        documents.push((input.relative_path.clone(), document));
        issues.extend(file_issues);
        objects.push(object);
    }

    ExtractedCorpus { objects, documents, issues, object_db_registry }
}

/// Builds the corpus-level column graph from every extracted object (spec.md
/// §4.10); callers typically write this alongside the per-file documents.
pub fn build_column_graph(objects: &[ObjectInfo]) -> ColumnGraph {
    ColumnGraph::build(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use infotracker_core::Dialect;

    fn options() -> ExtractOptions {
        ExtractOptions {
            dialect: Dialect::Mssql,
            default_database: "InfoTrackerDW".to_string(),
            default_schema: "dbo".to_string(),
            dbt_mode: false,
            rename_hints: Default::default(),
        }
    }

    #[test]
    fn extracts_corpus_in_dependency_order_and_resolves_cross_file_references() {
        let inputs = vec![
            CorpusInput { relative_path: PathBuf::from("stg_orders.sql"), content: "CREATE VIEW dbo.stg_orders AS SELECT o.OrderID FROM dbo.Orders AS o".to_string() },
            CorpusInput { relative_path: PathBuf::from("orders.sql"), content: "CREATE TABLE dbo.Orders (OrderID INT, CustomerID INT)".to_string() },
        ];
        let corpus = extract_corpus(inputs, &options(), SchemaRegistry::new(), ObjectDbRegistry::new("InfoTrackerDW"), Utc::now());
        assert_eq!(corpus.objects.len(), 2);
        assert_eq!(corpus.documents.len(), 2);
        let stg = corpus.objects.iter().find(|o| o.qualified_name == "dbo.stg_orders").unwrap();
        assert!(stg.dependencies.contains("dbo.Orders"));
    }

    #[test]
    fn builds_deduplicated_column_graph_across_objects() {
        let inputs = vec![
            CorpusInput { relative_path: PathBuf::from("orders.sql"), content: "CREATE TABLE dbo.Orders (OrderID INT)".to_string() },
            CorpusInput { relative_path: PathBuf::from("stg.sql"), content: "CREATE VIEW dbo.stg AS SELECT o.OrderID FROM dbo.Orders AS o".to_string() },
        ];
        let corpus = extract_corpus(inputs, &options(), SchemaRegistry::new(), ObjectDbRegistry::new("InfoTrackerDW"), Utc::now());
        let graph = build_column_graph(&corpus.objects);
        assert_eq!(graph.edges.len(), 1);
    }
}
