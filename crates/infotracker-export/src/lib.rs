//! Atomic on-disk writers for InfoTracker's corpus artifacts (spec.md §6, §5
//! "Resource discipline"): one OpenLineage JSON per input SQL file, the
//! corpus-level `column_graph.json`, and the persistent `object_db_map.json`
//! that `ObjectDbRegistry` carries across runs. Kept as its own crate
//! (rather than folded into `infotracker-cli`) because these are a stable
//! on-disk contract consumed by external tooling, not an implementation
//! detail of the CLI binary.
//!
//! This crate never parses SQL or computes lineage; it only serializes
//! `infotracker-core` types to bytes and writes them out atomically.

pub mod atomic;
pub mod error;
pub mod naming;

pub use error::ExportError;

use infotracker_core::{ColumnGraph, ObjectDbRegistry, OpenLineageDocument};
use std::path::{Path, PathBuf};

/// Writes one input file's OpenLineage document, returning the path it was
/// written to.
pub fn write_object_document(
    out_dir: &Path,
    relative_sql_path: &str,
    document: &OpenLineageDocument,
) -> Result<PathBuf, ExportError> {
    let path = naming::object_output_path(out_dir, relative_sql_path);
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|source| ExportError::Serialization { what: "OpenLineage document", source })?;
    atomic::write_atomic(&path, &bytes)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), "wrote OpenLineage document");
    Ok(path)
}

/// Writes the corpus-level column graph, returning the path it was written to.
pub fn write_column_graph(out_dir: &Path, graph: &ColumnGraph) -> Result<PathBuf, ExportError> {
    let path = naming::column_graph_path(out_dir);
    let bytes =
        serde_json::to_vec_pretty(graph).map_err(|source| ExportError::Serialization { what: "column graph", source })?;
    atomic::write_atomic(&path, &bytes)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), edges = graph.edges.len(), "wrote column graph");
    Ok(path)
}

/// Writes the persistent object→database registry atomically at the end of
/// a successful run (spec.md §5).
pub fn save_object_db_registry(out_dir: &Path, registry: &ObjectDbRegistry) -> Result<PathBuf, ExportError> {
    let path = naming::object_db_map_path(out_dir);
    let json = registry
        .to_json()
        .map_err(|source| ExportError::Serialization { what: "object/database registry", source })?;
    atomic::write_atomic(&path, json.as_bytes())?;
    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), "saved object/database registry");
    Ok(path)
}

/// Loads the persistent object→database registry from `out_dir`, or an empty
/// registry if none exists yet (the first run of a corpus has no prior
/// registry, which is not an error condition).
pub fn load_object_db_registry(out_dir: &Path, default_database: &str) -> Result<ObjectDbRegistry, ExportError> {
    let path = naming::object_db_map_path(out_dir);
    match std::fs::read_to_string(&path) {
        Ok(json) => ObjectDbRegistry::from_json(&json, default_database)
            .map_err(|source| ExportError::Serialization { what: "object/database registry", source }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(ObjectDbRegistry::new(default_database)),
        Err(source) => Err(ExportError::Io { path, source }),
    }
}

/// Loads `column_graph.json` from `out_dir`, for the `impact` subcommand to
/// walk. Missing file is an error here (unlike the registry): `impact` has
/// nothing useful to do without a graph a prior `extract` run produced.
pub fn load_column_graph(out_dir: &Path) -> Result<ColumnGraph, ExportError> {
    let path = naming::column_graph_path(out_dir);
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io { path: path.clone(), source })?;
    serde_json::from_str(&json).map_err(|source| ExportError::Serialization { what: "column graph", source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use infotracker_core::emitter::{DatasetInfo, JobInfo, RunInfo};

    fn sample_document() -> OpenLineageDocument {
        OpenLineageDocument {
            event_type: "COMPLETE".to_string(),
            event_time: chrono::Utc::now(),
            run: RunInfo { run_id: "00000000-0000-0000-0000-000000000000".to_string() },
            job: JobInfo { namespace: "infotracker".to_string(), name: "warehouse/sql/dbo.Orders.sql".to_string() },
            inputs: Vec::new(),
            outputs: vec![DatasetInfo { namespace: "mssql://localhost/DW".to_string(), name: "dbo.Orders".to_string(), facets: None }],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn writes_object_document_at_mirrored_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_object_document(dir.path(), "staging/orders.sql", &sample_document()).unwrap();
        assert_eq!(path, dir.path().join("staging/orders.json"));
        assert!(path.exists());
    }

    #[test]
    fn round_trips_object_db_registry_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ObjectDbRegistry::new("Default");
        registry.learn_from_create("table", "dbo.Orders", "DW");
        save_object_db_registry(dir.path(), &registry).unwrap();

        let loaded = load_object_db_registry(dir.path(), "Default").unwrap();
        assert_eq!(loaded.resolve("table", "dbo.Orders"), "DW");
    }

    #[test]
    fn missing_registry_file_loads_as_empty_rather_than_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_object_db_registry(dir.path(), "Default").unwrap();
        assert_eq!(loaded.resolve("table", "dbo.Anything"), "Default");
    }

    #[test]
    fn writes_column_graph() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ColumnGraph::new();
        let path = write_column_graph(dir.path(), &graph).unwrap();
        assert!(path.ends_with("column_graph.json"));
        assert!(path.exists());
    }

    #[test]
    fn round_trips_column_graph_through_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let graph = ColumnGraph::new();
        write_column_graph(dir.path(), &graph).unwrap();
        let loaded = load_column_graph(dir.path()).unwrap();
        assert_eq!(loaded.edges.len(), 0);
    }

    #[test]
    fn missing_column_graph_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_column_graph(dir.path()).is_err());
    }
}
