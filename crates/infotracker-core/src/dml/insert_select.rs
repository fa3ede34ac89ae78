//! `INSERT INTO <target> [(cols)] SELECT ...` (spec.md §4.6).
//!
//! Matches `Statement::Insert { table, columns, source, .. }`. Output column
//! names come from the explicit column list when given; otherwise, if the
//! target's schema is already known (already-registered persistent table, or
//! a live temp-table version), its declared column order wins positionally,
//! matching plain T-SQL `INSERT` semantics (the source's own projection
//! aliases are irrelevant to the written column names). If neither is known,
//! the source's own output names are kept as the best available guess.

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::TEMP_NAMESPACE;
use sqlparser::ast::{Ident, Query};

pub fn handle(
    table_name: &str,
    explicit_columns: &[Ident],
    source: &Query,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> MaterializationResult {
    let mut ctes = Default::default();
    let (mut lineage, mut schema_cols) = compute_query_lineage(source, ctx, env, &mut ctes);

    let is_temp = super::is_temp_target(table_name);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), table_name.to_string())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(table_name, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let declared_names: Option<Vec<String>> = if !explicit_columns.is_empty() {
        Some(explicit_columns.iter().map(|c| c.value.clone()).collect())
    } else if is_temp {
        ctx.temp_registry.current_schema(table_name).map(|s| s.column_names())
    } else {
        env.schema_registry.get(&namespace, &qualified_name).map(|s| s.column_names())
    };

    if let Some(names) = declared_names {
        for (i, name) in names.iter().enumerate() {
            if let Some(col) = schema_cols.get_mut(i) {
                col.name = name.clone();
            }
            if let Some(l) = lineage.get_mut(i) {
                l.output_column = name.clone();
            }
        }
    }

    let (lineage, dependencies) = super::expand_and_collect_deps(lineage, ctx);

    MaterializationResult {
        target_raw: table_name.to_string(),
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
    fn explicit_column_list_overrides_output_names() {
        let sql = "INSERT INTO dbo.Target (A, B) SELECT o.OrderID, o.CustomerID FROM dbo.Orders AS o";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::Insert(insert) = &statements[0] else { panic!("expected insert") };
        let source = insert.source.as_ref().expect("insert select has a source query");

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let result = handle(&insert.table.to_string(), &insert.columns, source, &mut ctx, &e);
        assert_eq!(result.qualified_name, "dbo.Target");
        assert_eq!(result.lineage[0].output_column, "A");
        assert_eq!(result.lineage[1].output_column, "B");
        assert!(result.dependencies.contains("dbo.Orders"));
    }

    #[test]
    fn temp_target_schema_drives_positional_naming_on_redefinition() {
        let sql1 = "SELECT o.OrderID AS X INTO #t FROM dbo.Orders AS o";
        let stmts1 = parse_statements(sql1, Dialect::Mssql).unwrap();
        let Statement::Query(q1) = &stmts1[0] else { panic!("expected query") };

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let into_result = super::super::select_into::handle("#t", q1, &mut ctx, &e);
        super::super::commit_if_temp(into_result, &mut ctx);

        let sql2 = "INSERT INTO #t SELECT o.OrderID FROM dbo.OtherOrders AS o";
        let stmts2 = parse_statements(sql2, Dialect::Mssql).unwrap();
        let Statement::Insert(insert2) = &stmts2[0] else { panic!("expected insert") };
        let source2 = insert2.source.as_ref().unwrap();
        let result2 = handle("#t", &insert2.columns, source2, &mut ctx, &e);
        assert_eq!(result2.lineage[0].output_column, "X");
    }
}
