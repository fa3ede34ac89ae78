//! Alias-map construction (spec.md §4.5): turns a `FROM`/`JOIN` clause into a
//! lookup from every alias or bare table name in scope to what it resolves
//! to, so the projection walker can turn `o.OrderID` / bare `OrderID` into
//! [`ColumnReference`]s without re-walking the `FROM` clause per column.
//!
//! Grounded on spec.md §4.5's explicit description of "alias maps" as the
//! first step of select-lineage computation; there is no single Python
//! source file for this (`select_lineage.py` is not in the retrieved
//! original source pack), so the resolution order (explicit alias, then bare
//! table name, derived tables keyed by their required alias) follows
//! ordinary T-SQL scoping rules directly.

use super::{compute_query_lineage, CteScope, LineageEnv};
use crate::context::ParseContext;
use crate::resolver;
use crate::types::ColumnReference;
use sqlparser::ast::{Join, TableFactor, TableWithJoins};

/// What an alias or bare name in a `FROM` clause resolves to.
#[derive(Debug, Clone)]
pub enum AliasTarget {
    /// A real (or temp, or CTE) table: fully resolved namespace + qualified name.
    Table(ResolvedTable),
    /// A derived table (subquery in `FROM`): each output column paired with
    /// the base inputs that feed it, in projection order.
    Derived(Vec<(String, Vec<ColumnReference>)>),
}

#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub namespace: String,
    pub qualified_name: String,
    pub is_temp: bool,
}

/// Maps every alias/bare name visible in a `FROM` clause to its target, plus
/// the declaration order (needed for unqualified `SELECT *` expansion).
#[derive(Debug, Clone, Default)]
pub struct AliasMaps {
    pub by_key: std::collections::HashMap<String, AliasTarget>,
    pub order: Vec<String>,
}

impl AliasMaps {
    pub fn get(&self, key: &str) -> Option<&AliasTarget> {
        self.by_key.get(&key.to_lowercase())
    }

    fn insert(&mut self, key: String, target: AliasTarget) {
        let key = key.to_lowercase();
        if !self.by_key.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.by_key.insert(key, target);
    }
}

/// Builds the alias map for a `SELECT`'s `FROM` clause (including every
/// `JOIN`), recursing into derived tables and resolving bare table
/// references through the temp → CTE → schema registry chain, then the
/// namespace resolver for anything not yet known.
pub fn build_alias_maps(
    from: &[TableWithJoins],
    ctx: &mut ParseContext,
    env: &LineageEnv,
    ctes: &CteScope,
) -> AliasMaps {
    let mut maps = AliasMaps::default();
    for twj in from {
        add_table_factor(&twj.relation, &mut maps, ctx, env, ctes);
        for join in &twj.joins {
            add_join(join, &mut maps, ctx, env, ctes);
        }
    }
    maps
}

fn add_join(join: &Join, maps: &mut AliasMaps, ctx: &mut ParseContext, env: &LineageEnv, ctes: &CteScope) {
    add_table_factor(&join.relation, maps, ctx, env, ctes);
}

fn add_table_factor(
    factor: &TableFactor,
    maps: &mut AliasMaps,
    ctx: &mut ParseContext,
    env: &LineageEnv,
    ctes: &CteScope,
) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let raw_name = name.to_string();
            let key = alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_else(|| last_segment(&raw_name));

            if resolver::is_temp_identifier(&raw_name) {
                maps.insert(
                    key,
                    AliasTarget::Table(ResolvedTable {
                        namespace: crate::types::TEMP_NAMESPACE.to_string(),
                        qualified_name: raw_name,
                        is_temp: true,
                    }),
                );
                return;
            }

            if ctes.contains_key(&raw_name.to_lowercase()) {
                // CTEs resolve per-column via `ctes`, not through AliasTarget::Table;
                // surface them as a Derived target built from their recorded columns.
                let cols = ctes.get(&raw_name.to_lowercase()).cloned().unwrap_or_default();
                maps.insert(key, AliasTarget::Derived(cols));
                return;
            }

            let resolver_ctx = env.resolver_ctx(ctx);
            let resolved = resolver::resolve(&raw_name, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
            maps.insert(
                key,
                AliasTarget::Table(ResolvedTable {
                    namespace: resolved.namespace,
                    qualified_name: resolved.qualified_name,
                    is_temp: false,
                }),
            );
        }
        TableFactor::Derived { subquery, alias, .. } => {
            let mut nested = ctes.clone();
            let (lineage, schema) = compute_query_lineage(subquery, ctx, env, &mut nested);
            let names: Vec<String> = if let Some(alias) = alias {
                if !alias.columns.is_empty() {
                    alias.columns.iter().map(|c| c.name.value.clone()).collect()
                } else {
                    schema.iter().map(|c| c.name.clone()).collect()
                }
            } else {
                schema.iter().map(|c| c.name.clone()).collect()
            };
            let cols: Vec<(String, Vec<ColumnReference>)> = names
                .into_iter()
                .zip(lineage.into_iter().map(|l| l.input_fields))
                .collect();
            let key = alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_else(|| format!("derived_{}", maps.order.len()));
            maps.insert(key, AliasTarget::Derived(cols));
        }
        TableFactor::NestedJoin { table_with_joins, .. } => {
            add_table_factor(&table_with_joins.relation, maps, ctx, env, ctes);
            for join in &table_with_joins.joins {
                add_join(join, maps, ctx, env, ctes);
            }
        }
        // Table-valued functions, UNNEST, PIVOT, and friends carry no stable
        // column provenance we can trace; left unresolved so any column
        // reference against them collects zero inputs rather than a guess.
        _ => {}
    }
}

fn last_segment(dotted: &str) -> String {
    dotted
        .trim_start_matches('[')
        .trim_end_matches(']')
        .rsplit('.')
        .next()
        .unwrap_or(dotted)
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}
