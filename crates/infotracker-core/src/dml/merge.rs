//! `MERGE INTO <t> USING <src> ON ... WHEN MATCHED THEN UPDATE ... WHEN NOT
//! MATCHED THEN INSERT ...` (spec.md §4.6).
//!
//! Matches `Statement::Merge { table, source, clauses, .. }` and
//! `MergeAction::{Update{assignments}, Insert(insert), Delete}` for
//! `sqlparser` 0.59. Output is `<t>`; each `SET`/insert column's inputs come from the
//! `<src>` side. A column touched by both an UPDATE and an INSERT clause
//! receives the union of both branches' inputs, per spec.md §4.6.

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{build_alias_maps, classify_and_collect, AliasMaps};
use crate::types::{ColumnLineage, ColumnReference, ColumnSchema, TransformationKind, TEMP_NAMESPACE};
use sqlparser::ast::{AssignmentTarget, MergeAction, MergeClause, MergeInsertKind, TableFactor, TableWithJoins};
use std::collections::HashMap;

struct Accumulated {
    kind: TransformationKind,
    desc: String,
    inputs: Vec<ColumnReference>,
}

fn target_column_name(target: &AssignmentTarget) -> Option<String> {
    match target {
        AssignmentTarget::ColumnName(name) => Some(crate::util::last_segment(&name.to_string())),
        AssignmentTarget::Tuple(_) => None,
    }
}

/// Merges a branch's classification into the accumulator for one output
/// column. Per spec.md §4.6 a column touched by both the UPDATE and INSERT
/// branches gets the union of their inputs; the first branch encountered
/// supplies the kind/description (the two branches are rarely used to build
/// conflicting transformation kinds for the same column in practice, and
/// spec.md doesn't call for resolving a conflict beyond the input union).
fn merge_into(acc: &mut HashMap<String, Accumulated>, order: &mut Vec<String>, name: String, kind: TransformationKind, desc: String, inputs: Vec<ColumnReference>) {
    let key = name.to_lowercase();
    if let Some(existing) = acc.get_mut(&key) {
        for input in inputs {
            if !existing.inputs.iter().any(|r| r == &input) {
                existing.inputs.push(input);
            }
        }
    } else {
        order.push(name);
        acc.insert(key, Accumulated { kind, desc, inputs });
    }
}

fn wrap(factor: &TableFactor) -> TableWithJoins {
    TableWithJoins {
        relation: factor.clone(),
        joins: Vec::new(),
    }
}

pub fn handle(
    table: &TableFactor,
    source: &TableFactor,
    clauses: &[MergeClause],
    ctx: &mut ParseContext,
    env: &crate::select_lineage::LineageEnv,
) -> MaterializationResult {
    let target_raw = match table {
        TableFactor::Table { name, .. } => name.to_string(),
        _ => String::new(),
    };

    let from = [wrap(table), wrap(source)];
    let ctes = Default::default();
    let maps: AliasMaps = build_alias_maps(&from, ctx, env, &ctes);

    let mut acc: HashMap<String, Accumulated> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for clause in clauses {
        match &clause.action {
            MergeAction::Update { assignments } => {
                for assignment in assignments {
                    let Some(name) = target_column_name(&assignment.target) else { continue };
                    let (kind, desc, inputs) = classify_and_collect(&assignment.value, &maps, None);
                    merge_into(&mut acc, &mut order, name, kind, desc, inputs);
                }
            }
            MergeAction::Insert(insert) => {
                if let MergeInsertKind::Values(values) = &insert.kind {
                    if let Some(row) = values.rows.first() {
                        for (col, expr) in insert.columns.iter().zip(row.iter()) {
                            let (kind, desc, inputs) = classify_and_collect(expr, &maps, None);
                            merge_into(&mut acc, &mut order, col.value.clone(), kind, desc, inputs);
                        }
                    }
                }
            }
            MergeAction::Delete => {}
        }
    }

    let lineage: Vec<ColumnLineage> = order
        .iter()
        .map(|name| {
            let entry = &acc[&name.to_lowercase()];
            ColumnLineage::new(name.clone(), entry.inputs.clone(), entry.kind, entry.desc.clone())
        })
        .collect();

    let is_temp = super::is_temp_target(&target_raw);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), target_raw.clone())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(&target_raw, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let columns: Vec<ColumnSchema> = lineage
        .iter()
        .enumerate()
        .map(|(i, l)| ColumnSchema::new(l.output_column.clone(), "unknown", true, i))
        .collect();

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
    use crate::select_lineage::LineageEnv;
    use crate::types::{Dialect, ExtractOptions};
    use sqlparser::ast::Statement;
    use std::collections::HashMap as StdHashMap;

    fn env<'a>(schema_reg: &'a SchemaRegistry, db_reg: &'a ObjectDbRegistry, votes: &'a StdHashMap<String, u32>) -> LineageEnv<'a> {
        LineageEnv {
            schema_registry: schema_reg,
            object_db_registry: db_reg,
            db_votes: votes,
        }
    }

    #[test]
    fn merge_update_and_insert_share_union_of_inputs() {
        let sql = "MERGE INTO dbo.Dim AS t \
            USING dbo.Stage AS s ON t.ID = s.ID \
            WHEN MATCHED THEN UPDATE SET t.Name = s.Name \
            WHEN NOT MATCHED THEN INSERT (ID, Name) VALUES (s.ID, s.FullName)";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::Merge { table, source, clauses, .. } = &statements[0] else {
            panic!("expected merge")
        };

        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = StdHashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let result = handle(table, source, clauses, &mut ctx, &e);
        assert_eq!(result.qualified_name, "dbo.Dim");

        // "Name" is written by both the UPDATE branch (from s.Name) and the
        // INSERT branch (from s.FullName): union of inputs, per spec.
        let name_lineage = result.lineage.iter().find(|l| l.output_column.eq_ignore_ascii_case("Name")).unwrap();
        assert_eq!(name_lineage.input_fields.len(), 2);

        let id_lineage = result.lineage.iter().find(|l| l.output_column.eq_ignore_ascii_case("ID")).unwrap();
        assert_eq!(id_lineage.input_fields[0].column_name, "ID");

        assert!(result.dependencies.contains("dbo.Stage"));
    }
}
