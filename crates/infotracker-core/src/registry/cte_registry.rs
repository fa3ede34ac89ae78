//! [`CteRegistry`]: CTE name → output column list, local to a single parse.
//!
//! Unlike [`super::schema_registry::SchemaRegistry`] this dies with the parse
//! that created it — CTEs are not visible outside the statement that defines
//! them (spec.md §3).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CteRegistry {
    ctes: HashMap<String, Vec<String>>,
}

impl CteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, columns: Vec<String>) {
        self.ctes.insert(name.into().to_lowercase(), columns);
    }

    pub fn columns(&self, name: &str) -> Option<&[String]> {
        self.ctes.get(&name.to_lowercase()).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctes.contains_key(&name.to_lowercase())
    }

    pub fn clear(&mut self) {
        self.ctes.clear();
    }
}
