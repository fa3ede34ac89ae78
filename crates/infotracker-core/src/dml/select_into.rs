//! `SELECT ... INTO <target>` (spec.md §4.6).
//!
//! `sqlparser` models the T-SQL `INTO` clause as `Select::into: Option<SelectInto>`
//! rather than as its own statement kind, so detection ([`into_target`]) and
//! lineage computation are split: the caller (procedure/script handlers) asks
//! whether a parsed `Query` carries an `INTO` clause before routing it here.
//!
//! If the target starts with `#`, namespace becomes the temp namespace and
//! the caller is expected to commit a new [`crate::registry::TempRegistry`]
//! version via [`super::commit_if_temp`]; otherwise it's a persistent target.

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::TEMP_NAMESPACE;
use sqlparser::ast::{Query, SetExpr};

/// Returns the raw `INTO` target name if `query`'s body is a bare `SELECT`
/// carrying an `INTO` clause, `None` otherwise.
pub fn into_target(query: &Query) -> Option<String> {
    match query.body.as_ref() {
        SetExpr::Select(select) => select.into.as_ref().map(|into| into.name.to_string()),
        _ => None,
    }
}

/// Computes lineage for the query and resolves the `INTO` target, without
/// committing anything to any registry — the caller decides persistence.
pub fn handle(into_name: &str, query: &Query, ctx: &mut ParseContext, env: &LineageEnv) -> MaterializationResult {
    let mut ctes = Default::default();
    let (lineage, schema_cols) = compute_query_lineage(query, ctx, env, &mut ctes);
    let (lineage, dependencies) = super::expand_and_collect_deps(lineage, ctx);

    let is_temp = super::is_temp_target(into_name);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), into_name.to_string())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(into_name, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    MaterializationResult {
        target_raw: into_name.to_string(),
        is_temp,
        namespace,
        qualified_name,
        columns: schema_cols,
        lineage,
        dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParseContext;
    use crate::parser::parse_statements;
    use crate::registry::{ObjectDbRegistry, SchemaRegistry};
    use crate::types::{Dialect, ExtractOptions};
    use sqlparser::ast::Statement;
    use std::collections::HashMap;

    fn env<'a>(schema_reg: &'a SchemaRegistry, db_reg: &'a ObjectDbRegistry, votes: &'a HashMap<String, u32>) -> LineageEnv<'a> {
        LineageEnv {
            schema_registry: schema_reg,
            object_db_registry: db_reg,
            db_votes: votes,
        }
    }

    #[test]
    fn select_into_temp_is_detected_and_committed() {
        let sql = "SELECT a.x, a.y INTO #t FROM dbo.A AS a JOIN dbo.B AS b ON a.id = b.id";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::Query(query) = &statements[0] else { panic!("expected query") };
        let target = into_target(query).unwrap();
        assert_eq!(target, "#t");

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));
        let result = handle(&target, query, &mut ctx, &e);
        assert!(result.is_temp);
        assert!(result.dependencies.contains("dbo.A"));

        let committed = super::super::commit_if_temp(result, &mut ctx);
        assert!(committed.is_none());
        assert!(ctx.temp_registry.contains("#t"));
    }
}
