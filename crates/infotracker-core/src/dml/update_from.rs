//! `UPDATE <t> SET ... FROM <t> JOIN <src> ON ...` (spec.md §4.6).
//!
//! Matches `Statement::Update { table, assignments, from, .. }`, including
//! the `UpdateTableFromKind::{BeforeSet, AfterSet}` wrapper sqlparser 0.59
//! uses for the `FROM` clause's position relative to `SET`. Output is `<t>`;
//! each `SET` column's inputs are resolved against every alias visible in
//! the `FROM` clause (plus `<t>` itself, for self-referential updates).

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{build_alias_maps, classify_and_collect, AliasMaps, AliasTarget, LineageEnv};
use crate::types::{ColumnLineage, ColumnSchema, TEMP_NAMESPACE};
use sqlparser::ast::{Assignment, TableWithJoins, UpdateTableFromKind};

fn target_column_name(assignment: &Assignment) -> Option<String> {
    match &assignment.target {
        sqlparser::ast::AssignmentTarget::ColumnName(name) => Some(crate::util::last_segment(&name.to_string())),
        sqlparser::ast::AssignmentTarget::Tuple(_) => None,
    }
}

pub fn handle(
    table: &TableWithJoins,
    assignments: &[Assignment],
    from: &Option<UpdateTableFromKind>,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> MaterializationResult {
    let target_raw = match &table.relation {
        sqlparser::ast::TableFactor::Table { name, .. } => name.to_string(),
        other => other.to_string(),
    };

    let mut scope: Vec<TableWithJoins> = vec![table.clone()];
    if let Some(from_kind) = from {
        match from_kind {
            UpdateTableFromKind::BeforeSet(tables) | UpdateTableFromKind::AfterSet(tables) => {
                scope.extend(tables.iter().cloned());
            }
        }
    }

    let ctes = Default::default();
    let maps: AliasMaps = build_alias_maps(&scope, ctx, env, &ctes);

    let mut lineage = Vec::new();
    let mut columns = Vec::new();
    for assignment in assignments {
        let Some(name) = target_column_name(assignment) else { continue };
        let (kind, desc, inputs) = classify_and_collect(&assignment.value, &maps, None);
        columns.push(ColumnSchema::new(name.clone(), "unknown", true, columns.len()));
        lineage.push(ColumnLineage::new(name, inputs, kind, desc));
    }

    // `table` in T-SQL `UPDATE <alias> SET ... FROM <real> AS <alias> JOIN ...`
    // is often the bare alias, not a real name; the FROM-clause alias map
    // (already built above, same alias key, last write wins) carries the
    // real resolution, so prefer that over resolving `target_raw` itself.
    let is_temp = super::is_temp_target(&target_raw);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), target_raw.clone())
    } else if let Some(AliasTarget::Table(resolved)) = maps.get(&target_raw) {
        (resolved.namespace.clone(), resolved.qualified_name.clone())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(&target_raw, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let (lineage, dependencies) = super::expand_and_collect_deps(lineage, ctx);

    MaterializationResult {
        target_raw,
        is_temp,
        namespace,
        qualified_name,
        columns,
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
    fn update_from_resolves_set_values_against_join() {
        let sql = "UPDATE t SET t.Total = s.Amount FROM dbo.Target AS t JOIN dbo.Stage AS s ON t.ID = s.ID";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::Update { table, assignments, from, .. } = &statements[0] else {
            panic!("expected update")
        };

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let result = handle(table, assignments, from, &mut ctx, &e);
        assert_eq!(result.lineage.len(), 1);
        assert_eq!(result.lineage[0].output_column, "Total");
        assert_eq!(result.lineage[0].input_fields[0].column_name, "Amount");
        assert!(result.dependencies.contains("dbo.Stage"));
    }
}
