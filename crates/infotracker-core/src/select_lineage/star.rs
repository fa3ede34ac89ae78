//! `SELECT *` / `SELECT alias.*` expansion (spec.md §4.5, invariant P9: no
//! duplicate output column names after expansion).

use super::alias::{AliasMaps, AliasTarget};
use crate::context::ParseContext;
use crate::select_lineage::LineageEnv;
use crate::types::{ColumnLineage, ColumnReference, ColumnSchema, TransformationKind};

/// Expands `alias.*` (or an unqualified `*` when `qualifier` is `None`) into
/// one `(ColumnLineage, ColumnSchema)` pair per source column, skipping names
/// already produced earlier in the same projection list (first-seen wins).
pub fn expand_wildcard(
    qualifier: Option<&str>,
    maps: &AliasMaps,
    ctx: &ParseContext,
    env: &LineageEnv,
    seen_names: &mut std::collections::HashSet<String>,
    ordinal_start: usize,
) -> (Vec<ColumnLineage>, Vec<ColumnSchema>) {
    let mut lineage = Vec::new();
    let mut schema = Vec::new();

    let keys: Vec<String> = match qualifier {
        Some(q) => vec![q.to_lowercase()],
        None => maps.order.clone(),
    };

    for key in keys {
        let Some(target) = maps.by_key.get(&key) else { continue };
        match target {
            AliasTarget::Table(t) => {
                let columns = lookup_columns(&t.namespace, &t.qualified_name, t.is_temp, ctx, env);
                for col in columns {
                    if !seen_names.insert(col.name.to_lowercase()) {
                        continue;
                    }
                    let ordinal = schema.len() + ordinal_start;
                    schema.push(ColumnSchema::new(col.name.clone(), col.data_type.clone(), col.nullable, ordinal));
                    lineage.push(ColumnLineage::identity(
                        col.name.clone(),
                        ColumnReference::new(t.namespace.clone(), t.qualified_name.clone(), col.name.clone()),
                    ));
                }
            }
            AliasTarget::Derived(cols) => {
                for (name, inputs) in cols {
                    if !seen_names.insert(name.to_lowercase()) {
                        continue;
                    }
                    let ordinal = schema.len() + ordinal_start;
                    schema.push(ColumnSchema::new(name.clone(), "unknown", true, ordinal));
                    let entry = match inputs.as_slice() {
                        [single] => ColumnLineage::identity(name.clone(), single.clone()),
                        _ => ColumnLineage::new(name.clone(), inputs.clone(), TransformationKind::Expression, "passthrough via derived table"),
                    };
                    lineage.push(entry);
                }
            }
        }
    }

    (lineage, schema)
}

fn lookup_columns(
    namespace: &str,
    qualified_name: &str,
    is_temp: bool,
    ctx: &ParseContext,
    env: &LineageEnv,
) -> Vec<ColumnSchema> {
    if is_temp {
        if let Some(schema) = ctx.temp_registry.current_schema(qualified_name) {
            return schema.columns.clone();
        }
    }
    if let Some(cols) = ctx.cte_registry.columns(qualified_name) {
        return cols
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnSchema::new(name.clone(), "unknown", true, i))
            .collect();
    }
    if let Some(schema) = env.schema_registry.get(namespace, qualified_name) {
        return schema.columns.clone();
    }
    (1..=3)
        .map(|i| ColumnSchema::new(format!("unknown_{i}"), "unknown", true, i - 1))
        .collect()
}
