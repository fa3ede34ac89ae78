//! `CREATE VIEW` handler (spec.md §4.4).
//!
//! A view's body is an arbitrary `SELECT`/`UNION`; lineage and output schema
//! come straight from [`crate::select_lineage::compute_query_lineage`]. An
//! explicit header column list (`CREATE VIEW v (c1, c2) AS SELECT ...`)
//! overrides the body's own output names positionally.

use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::{ObjectInfo, ObjectType};
use sqlparser::ast::{Ident, Query};

/// Parses a `CREATE VIEW` statement into a registered [`ObjectInfo`].
pub fn handle_create_view(
    name: &sqlparser::ast::ObjectName,
    columns: &[Ident],
    query: &Query,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> ObjectInfo {
    let raw_name = name.to_string();
    let resolver_ctx = env.resolver_ctx(ctx);
    let resolved = resolver::resolve(&raw_name, "view", &resolver_ctx, env.object_db_registry, env.db_votes);

    let mut ctes = Default::default();
    let (mut lineage, mut schema_cols) = compute_query_lineage(query, ctx, env, &mut ctes);

    if !columns.is_empty() {
        // Positional override: the header's declared names win regardless of
        // what the body's own projection aliases resolved to.
        for (i, ident) in columns.iter().enumerate() {
            if let Some(col) = schema_cols.get_mut(i) {
                col.name = ident.value.clone();
            }
            if let Some(l) = lineage.get_mut(i) {
                l.output_column = ident.value.clone();
            }
        }
    }

    let mut schema = crate::types::TableSchema::new(resolved.namespace, resolved.qualified_name.clone());
    schema.columns = schema_cols;
    schema.renumber();

    let dependencies = deps_from_lineage(&lineage);

    ObjectInfo::new(resolved.qualified_name, ObjectType::View, schema)
        .with_lineage(lineage)
        .with_dependencies(dependencies)
}

/// Collects the distinct (non-temp) source tables a lineage's input fields
/// reference, as `schema.table` qualified dependency names.
pub fn deps_from_lineage(lineage: &[crate::types::ColumnLineage]) -> std::collections::BTreeSet<String> {
    lineage
        .iter()
        .flat_map(|l| l.input_fields.iter())
        .filter(|r| !r.is_temp())
        .map(|r| r.table_name.clone())
        .collect()
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
    fn s2_stg_orders_view() {
        let sql = "CREATE VIEW dbo.stg_orders AS \
            SELECT o.OrderID, o.CustomerID, CAST(o.OrderDate AS DATE) AS OrderDate, \
                   CASE WHEN o.OrderStatus IN ('shipped','delivered') THEN 1 ELSE 0 END AS IsFulfilled \
            FROM dbo.Orders AS o";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::CreateView { name, columns, query, .. } = &statements[0] else {
            panic!("expected CreateView")
        };

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let name_idents: Vec<Ident> = columns.iter().map(|c| c.name.clone()).collect();
        let obj = handle_create_view(name, &name_idents, query, &mut ctx, &e);

        assert_eq!(obj.qualified_name, "dbo.stg_orders");
        assert_eq!(obj.lineage.len(), 4);
        assert_eq!(obj.lineage[0].output_column, "OrderID");
        assert_eq!(obj.lineage[1].output_column, "CustomerID");
        assert_eq!(obj.lineage[2].output_column, "OrderDate");
        assert_eq!(obj.lineage[2].transformation_type, crate::types::TransformationKind::Cast);
        assert_eq!(obj.lineage[3].output_column, "IsFulfilled");
        assert_eq!(obj.lineage[3].transformation_type, crate::types::TransformationKind::Case);
        assert_eq!(obj.lineage[3].input_fields.len(), 1);
        assert_eq!(obj.lineage[3].input_fields[0].column_name, "OrderStatus");
        assert_eq!(obj.dependencies.len(), 1);
        assert!(obj.dependencies.contains("dbo.Orders"));
        assert!(obj.check_lineage_arity());
    }
}
