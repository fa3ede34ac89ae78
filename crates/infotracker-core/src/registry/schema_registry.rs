//! [`SchemaRegistry`]: mapping `(namespace, qualified_name)` → [`TableSchema`].
//!
//! Built incrementally during a run (every DDL handler registers the schema it
//! produces) and seeded up front from the catalog YAML. Lookups are
//! case-insensitive, matching T-SQL identifier semantics.

use crate::types::TableSchema;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, TableSchema>,
}

fn key(namespace: &str, qualified_name: &str) -> String {
    format!("{}::{}", namespace.to_lowercase(), qualified_name.to_lowercase())
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TableSchema) {
        let k = key(&schema.namespace, &schema.qualified_name);
        self.schemas.insert(k, schema);
    }

    pub fn get(&self, namespace: &str, qualified_name: &str) -> Option<&TableSchema> {
        self.schemas.get(&key(namespace, qualified_name))
    }

    /// Looks a table up ignoring namespace, returning the first match. Used
    /// by the resolver when a reference's namespace hasn't been determined
    /// yet but a unique schema.table hit exists somewhere in the registry.
    pub fn get_any_namespace(&self, qualified_name: &str) -> Option<&TableSchema> {
        let needle = qualified_name.to_lowercase();
        self.schemas
            .values()
            .find(|s| s.qualified_name.to_lowercase() == needle)
    }

    pub fn contains(&self, namespace: &str, qualified_name: &str) -> bool {
        self.schemas.contains_key(&key(namespace, qualified_name))
    }

    pub fn all(&self) -> impl Iterator<Item = &TableSchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Merges another registry's entries into this one (later entries win),
    /// used when merging per-level results back at a concurrency barrier.
    pub fn merge(&mut self, other: SchemaRegistry) {
        self.schemas.extend(other.schemas);
    }
}
