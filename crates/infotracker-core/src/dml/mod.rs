//! DML & materialization handlers (spec.md §4.6): every statement shape that
//! can produce a new versioned dataset from a query body or another
//! procedure's result set — `SELECT ... INTO`, `INSERT ... SELECT`,
//! `INSERT ... EXEC`, `MERGE`, `UPDATE ... FROM`, and `OUTPUT INTO`.
//!
//! Each handler returns a [`MaterializationResult`] rather than an
//! [`crate::types::ObjectInfo`] directly: the caller (the procedure handler,
//! the script handler, or the top-level driver) decides whether the target
//! is a temp table (commit a new version and stop) or a persistent dataset
//! (register schema, possibly feed a [`crate::context::ProcAccumulator`]).

pub mod insert_exec;
pub mod insert_select;
pub mod merge;
pub mod output_into;
pub mod select_into;
pub mod update_from;

use crate::context::ParseContext;
use crate::resolver::is_temp_identifier;
use crate::types::{ColumnLineage, ColumnSchema, TableSchema};
use std::collections::BTreeSet;

/// The result of materializing one DML/DDL-ish write into a named target:
/// not yet committed anywhere, so the caller can route it to the temp
/// registry, the procedure accumulator, or straight into an [`crate::types::ObjectInfo`].
#[derive(Debug, Clone)]
pub struct MaterializationResult {
    /// Raw identifier as it appeared in the statement (used for temp-table
    /// version commits, which key off the written form).
    pub target_raw: String,
    pub is_temp: bool,
    pub namespace: String,
    pub qualified_name: String,
    pub columns: Vec<ColumnSchema>,
    pub lineage: Vec<ColumnLineage>,
    pub dependencies: BTreeSet<String>,
}

impl MaterializationResult {
    pub fn schema(&self) -> TableSchema {
        TableSchema::new(self.namespace.clone(), self.qualified_name.clone()).with_columns(self.columns.clone())
    }
}

/// Expands any temp-table references in `lineage` to their recorded base
/// sources (spec.md §4.6, P3) and derives the resulting dependency set,
/// excluding temp tables themselves.
pub fn expand_and_collect_deps(lineage: Vec<ColumnLineage>, ctx: &ParseContext) -> (Vec<ColumnLineage>, BTreeSet<String>) {
    let expanded = crate::registry::temp_registry::expand_lineage(lineage, &ctx.temp_registry);
    let deps = crate::ddl::view::deps_from_lineage(&expanded);
    (expanded, deps)
}

/// If `result`'s target is a temp table, commits a new version into
/// `ctx.temp_registry` and returns `None` — a temp write never escapes the
/// enclosing parse as its own emitted object. Otherwise returns `result`
/// unchanged for the caller to register/accumulate.
pub fn commit_if_temp(result: MaterializationResult, ctx: &mut ParseContext) -> Option<MaterializationResult> {
    if result.is_temp {
        let schema = result.schema();
        ctx.temp_registry.commit(&result.target_raw, schema, result.lineage, result.dependencies);
        return None;
    }
    Some(result)
}

pub(crate) fn is_temp_target(raw_name: &str) -> bool {
    is_temp_identifier(raw_name)
}
