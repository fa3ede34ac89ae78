//! [`TempRegistry`]: per-procedure, versioned, append-only state for temp
//! tables (`#foo`, table variables).
//!
//! A logical temp table is redefined many times across a procedure body
//! (`SELECT ... INTO #x`, then later `TRUNCATE TABLE #x; INSERT INTO #x ...`).
//! Each redefinition is committed as a new, immutable version; reading `#x`
//! always resolves to its latest version. Versions are kept in a flat arena
//! (`Vec`) indexed by integer so the latest-version lookup is O(1) and every
//! past version remains inspectable for diagnostics, per spec.md's Design
//! Notes — mirroring the `name@v` scheme in the original `temp_utils.py`.

use crate::types::{ColumnLineage, TableSchema};
use std::collections::{BTreeSet, HashMap};

/// One immutable, committed version of a temp table's schema and lineage.
#[derive(Debug, Clone)]
pub struct TempVersion {
    pub version: u32,
    pub schema: TableSchema,
    pub lineage: Vec<ColumnLineage>,
    /// Persistent/temp tables this version's data was pulled from, used when
    /// a later statement reads `#x` without going through column lineage
    /// (e.g. `EXEC` against a temp table as a parameter).
    pub base_dependencies: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TempRegistry {
    arena: Vec<TempVersion>,
    latest: HashMap<String, usize>,
    history: HashMap<String, Vec<usize>>,
}

/// Normalizes a temp table name to its canonical `#name` form, lowercased
/// for keying purposes (display should use the original casing from the SQL).
pub fn normalize_temp_name(name: &str) -> String {
    let trimmed = name.trim();
    let with_hash = if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    };
    with_hash.to_lowercase()
}

impl TempRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits a new version of `name`, returning the version number assigned.
    pub fn commit(
        &mut self,
        name: &str,
        schema: TableSchema,
        lineage: Vec<ColumnLineage>,
        base_dependencies: BTreeSet<String>,
    ) -> u32 {
        let key = normalize_temp_name(name);
        let version = self
            .latest
            .get(&key)
            .map(|&idx| self.arena[idx].version + 1)
            .unwrap_or(1);

        let idx = self.arena.len();
        self.arena.push(TempVersion {
            version,
            schema,
            lineage,
            base_dependencies,
        });
        self.latest.insert(key.clone(), idx);
        self.history.entry(key).or_default().push(idx);
        version
    }

    pub fn current(&self, name: &str) -> Option<&TempVersion> {
        let key = normalize_temp_name(name);
        self.latest.get(&key).map(|&idx| &self.arena[idx])
    }

    pub fn current_schema(&self, name: &str) -> Option<&TableSchema> {
        self.current(name).map(|v| &v.schema)
    }

    /// All committed versions of `name`, oldest first, for diagnostics.
    pub fn history(&self, name: &str) -> Vec<&TempVersion> {
        let key = normalize_temp_name(name);
        self.history
            .get(&key)
            .map(|indices| indices.iter().map(|&i| &self.arena[i]).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.latest.contains_key(&normalize_temp_name(name))
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

/// Expands any temp-table references in `lineage`'s input fields to the base
/// sources recorded when that temp version was committed (spec.md §4.6, P3):
/// a later read of `#x` traces through to `#x`'s own inputs, so `#x` itself
/// never leaks out as a dependency of the enclosing persistent output.
///
/// Since every commit already runs its own lineage through this same
/// expansion before being stored, a single level of substitution is enough
/// even when `#x` was itself built from another temp table.
pub fn expand_lineage(lineage: Vec<ColumnLineage>, temp_registry: &TempRegistry) -> Vec<ColumnLineage> {
    lineage
        .into_iter()
        .map(|mut l| {
            let mut expanded = Vec::with_capacity(l.input_fields.len());
            for input in l.input_fields {
                if input.is_temp() {
                    if let Some(found) = temp_registry
                        .current(&input.table_name)
                        .and_then(|v| v.lineage.iter().find(|cl| cl.output_column.eq_ignore_ascii_case(&input.column_name)))
                    {
                        expanded.extend(found.input_fields.iter().cloned());
                        continue;
                    }
                }
                expanded.push(input);
            }
            l.input_fields = expanded;
            l.dedup_inputs_preserving_order();
            l
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSchema;

    fn schema_with(col: &str) -> TableSchema {
        let mut t = TableSchema::new(crate::types::TEMP_NAMESPACE, "#staging");
        t.push(col, "int", true);
        t
    }

    #[test]
    fn redefinition_bumps_version_and_latest_wins() {
        let mut reg = TempRegistry::new();
        let v1 = reg.commit("#staging", schema_with("A"), vec![], BTreeSet::new());
        let v2 = reg.commit("#staging", schema_with("B"), vec![], BTreeSet::new());

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        assert_eq!(
            reg.current("#staging").unwrap().schema.columns[0].name,
            "B"
        );
        assert_eq!(reg.history("#staging").len(), 2);
    }

    #[test]
    fn name_normalization_is_hash_prefixed_and_case_insensitive() {
        let mut reg = TempRegistry::new();
        reg.commit("Staging", schema_with("A"), vec![], BTreeSet::new());
        assert!(reg.contains("#STAGING"));
        assert!(reg.current("#staging").is_some());
    }

    #[test]
    fn past_versions_remain_inspectable() {
        let mut reg = TempRegistry::new();
        reg.commit("#x", schema_with("A"), vec![], BTreeSet::new());
        reg.commit("#x", schema_with("B"), vec![], BTreeSet::new());
        let history = reg.history("#x");
        assert_eq!(history[0].schema.columns[0].name, "A");
        assert_eq!(history[1].schema.columns[0].name, "B");
        let _: &ColumnSchema = &history[0].schema.columns[0];
    }
}
