//! Catalog YAML loading (spec.md §6 `--catalog`): seeds a [`SchemaRegistry`]
//! with externally-known table shapes before extraction begins, so that a
//! corpus which only ever references an upstream table (never defines it)
//! still resolves real column names instead of falling back to `SELECT *`
//! guesses.
//!
//! Grounded on `infotracker_core::types::CatalogFile`'s YAML shape, which
//! already exists for exactly this purpose; this module is just the
//! file-read plus the `CatalogTable -> TableSchema` conversion the core
//! deliberately leaves to its caller.

use anyhow::{Context, Result};
use infotracker_core::{namespace_for_database, SchemaRegistry, TableSchema};
use std::path::Path;

/// Reads `path` as a [`infotracker_core::CatalogFile`] and registers every
/// table it names into `registry`. A table with no explicit `namespace`
/// resolves against `default_database`.
pub fn load_into(path: &Path, default_database: &str, registry: &mut SchemaRegistry) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog: infotracker_core::CatalogFile =
        serde_yaml::from_str(&text).with_context(|| format!("failed to parse catalog {}", path.display()))?;

    for table in catalog.tables {
        let namespace = table.namespace.unwrap_or_else(|| namespace_for_database(default_database));
        let mut columns = table.columns;
        columns.sort_by_key(|c| c.ordinal.unwrap_or(usize::MAX));
        let mut schema = TableSchema::new(namespace, table.name);
        for column in columns {
            let data_type = column.data_type.unwrap_or_else(|| "sql_variant".to_string());
            schema.push(column.name, data_type, column.nullable.unwrap_or(true));
        }
        registry.register(schema);
    }
    Ok(())
}
