//! [`ParseContext`]: the per-file state threaded through extraction.
//!
//! Grounded on spec.md §9's explicit re-architecture note: the Python
//! original hangs working state off the parser instance itself
//! (`self.current_database`, `self.cte_registry`, `self.temp_registry`,
//! `self._proc_acc`, see `original_source/src/infotracker/parser.py`'s
//! `SqlParser.__init__`); here that becomes one explicit value threaded
//! through the traversal instead of mutable `self` fields, matching this
//! crate's registries (`CteRegistry`/`TempRegistry`) which are already
//! built as owned, per-parse values rather than global state.

use crate::registry::{CteRegistry, TempRegistry};
use crate::types::{ColumnReference, ExtractOptions};
use std::collections::{BTreeSet, HashMap};

/// Accumulates per-output-column input sets across every branch that writes
/// to the same persistent target inside a procedure body (spec.md §4.4's
/// "procedure accumulator").
#[derive(Debug, Clone, Default)]
pub struct ProcAccumulator {
    targets: HashMap<String, HashMap<String, BTreeSet<ColumnReference>>>,
}

impl ProcAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target_fqn: &str, output_column: &str, inputs: impl IntoIterator<Item = ColumnReference>) {
        let cols = self.targets.entry(target_fqn.to_string()).or_default();
        cols.entry(output_column.to_string()).or_default().extend(inputs);
    }

    pub fn has_target(&self, target_fqn: &str) -> bool {
        self.targets.contains_key(target_fqn)
    }

    /// Finalizes a target into one [`crate::types::ColumnLineage`] per output
    /// column, sorted inputs, kind IDENTITY, per spec.md §4.4.
    pub fn finalize(&self, target_fqn: &str) -> Vec<crate::types::ColumnLineage> {
        let Some(cols) = self.targets.get(target_fqn) else {
            return Vec::new();
        };
        let mut names: Vec<&String> = cols.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let inputs: Vec<ColumnReference> = cols[name].iter().cloned().collect();
                crate::types::ColumnLineage::new(
                    name.clone(),
                    inputs,
                    crate::types::TransformationKind::Identity,
                    "merged from multiple branches",
                )
            })
            .collect()
    }
}

/// The per-file working state passed by reference through every handler in
/// the traversal. Owns the per-parse registries (CTE, temp, accumulator) and
/// holds the resolved database context; shared cross-file registries are
/// referenced separately by the driver rather than embedded here, since they
/// outlive any single `ParseContext` (spec.md §3's ownership summary).
pub struct ParseContext {
    pub options: ExtractOptions,
    /// Database named by a leading `USE` statement, or the configured default.
    pub current_database: String,
    pub cte_registry: CteRegistry,
    pub temp_registry: TempRegistry,
    pub proc_accumulator: ProcAccumulator,
    pub diagnostics: Vec<crate::types::Issue>,
}

impl ParseContext {
    pub fn new(options: ExtractOptions, detected_database: Option<String>) -> Self {
        let current_database = detected_database.unwrap_or_else(|| options.default_database.clone());
        Self {
            options,
            current_database,
            cte_registry: CteRegistry::new(),
            temp_registry: TempRegistry::new(),
            proc_accumulator: ProcAccumulator::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn namespace(&self) -> String {
        crate::types::reference::namespace_for_database(&self.current_database)
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        self.diagnostics.push(crate::types::Issue::warning(code, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_merges_across_branches() {
        let mut acc = ProcAccumulator::new();
        acc.add("DW.dbo.Dim", "c", vec![ColumnReference::in_database("DW", "dbo.Stage", "c")]);
        acc.add("DW.dbo.Dim", "c", vec![ColumnReference::in_database("DW", "dbo.Other", "c")]);
        let lineage = acc.finalize("DW.dbo.Dim");
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].input_fields.len(), 2);
    }

    #[test]
    fn default_database_used_without_use_statement() {
        let ctx = ParseContext::new(ExtractOptions::default(), None);
        assert_eq!(ctx.current_database, "InfoTrackerDW");
    }
}
