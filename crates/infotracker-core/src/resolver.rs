//! Namespace & FQN resolver (spec.md §4.9).
//!
//! Ground truth is `original_source/src/infotracker/parser.py`'s `_ns_and_name`
//! (temp-table short-circuit, pseudo-catalog stripping, dbt-mode
//! normalization, registry-backed resolution for bare `schema.table`
//! references) together with `_infer_db_candidates_from_ast` /
//! `_infer_db_candidates_from_sql` / `_choose_db` (the majority-vote
//! fallback over DB prefixes observed elsewhere in the file). Resolution
//! order for a reference without an explicit database: explicit 3-part name
//! → `ObjectDbRegistry` → majority vote over catalogs seen in the same file
//! → current `USE` database / configured default.

use crate::registry::ObjectDbRegistry;
use crate::types::reference::namespace_for_database;
use std::collections::HashMap;

/// Pseudo-catalog prefixes the T-SQL parser sometimes surfaces as the first
/// dotted segment of an object name; these are never a database (spec.md
/// §4.9, P8, and the Design Notes' "pseudo-catalog prefix trap").
pub(crate) const PSEUDO_CATALOGS: &[&str] = &["view", "table", "function", "procedure", "storedprocedure"];

/// A resolved fully-qualified reference: a namespace URI plus a `schema.table`
/// qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub namespace: String,
    pub qualified_name: String,
}

/// Context the resolver needs beyond the raw identifier: whether the
/// enclosing parse is in dbt mode, the current `USE` database, and the
/// default database/schema from configuration.
pub struct ResolverContext<'a> {
    pub dbt_mode: bool,
    pub current_database: &'a str,
    pub default_database: &'a str,
    pub default_schema: &'a str,
}

/// Splits a dotted identifier into non-empty, bracket-stripped segments.
fn split_segments(identifier: &str) -> Vec<String> {
    identifier
        .split('.')
        .map(|p| p.trim().trim_start_matches('[').trim_end_matches(']').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Strips a leading pseudo-catalog segment ("View.", "Table.", "Procedure.",
/// "Function.") from `segments`, per spec.md's denylist requirement.
fn strip_pseudo_catalog(mut segments: Vec<String>) -> Vec<String> {
    if segments.len() >= 3 && PSEUDO_CATALOGS.contains(&segments[0].to_lowercase().as_str()) {
        segments.remove(0);
    }
    segments
}

/// Resolves `identifier` (any dotted form: bare name, `schema.table`, or
/// `db.schema.table`) into a namespace + `schema.table` qualified name.
///
/// `obj_type_hint` (`"table"`, `"view"`, `"function"`, `"procedure"`) is used
/// only to key the [`ObjectDbRegistry`] lookup; it never becomes part of the
/// resolved name itself.
pub fn resolve(
    identifier: &str,
    obj_type_hint: &str,
    ctx: &ResolverContext,
    registry: &ObjectDbRegistry,
    db_votes: &HashMap<String, u32>,
) -> ResolvedName {
    if is_temp_identifier(identifier) {
        return ResolvedName {
            namespace: crate::types::TEMP_NAMESPACE.to_string(),
            qualified_name: identifier.to_string(),
        };
    }

    let segments = strip_pseudo_catalog(split_segments(identifier));

    if ctx.dbt_mode {
        let last = segments.last().cloned().unwrap_or_else(|| identifier.to_string());
        let db = if ctx.current_database.is_empty() {
            ctx.default_database
        } else {
            ctx.current_database
        };
        return ResolvedName {
            namespace: namespace_for_database(db),
            qualified_name: format!("{}.{}", ctx.default_schema, last),
        };
    }

    if segments.len() >= 3 {
        let db = &segments[0];
        let qualified_name = segments[1..].join(".");
        return ResolvedName {
            namespace: namespace_for_database(db),
            qualified_name,
        };
    }

    let qualified_name = match segments.len() {
        2 => segments.join("."),
        1 => format!("{}.{}", ctx.default_schema, segments[0]),
        _ => identifier.to_string(),
    };

    let db = registry
        .try_resolve(obj_type_hint, &qualified_name)
        .or_else(|| majority_vote(db_votes))
        .unwrap_or_else(|| {
            if ctx.current_database.is_empty() {
                ctx.default_database.to_string()
            } else {
                ctx.current_database.to_string()
            }
        });

    ResolvedName {
        namespace: namespace_for_database(&db),
        qualified_name,
    }
}

pub fn is_temp_identifier(identifier: &str) -> bool {
    identifier.starts_with('#') || identifier.to_lowercase().contains("tempdb..#")
}

/// Majority vote over DB prefixes observed elsewhere in the file (spec.md
/// §4.9), requiring strict dominance just like [`ObjectDbRegistry`]'s soft
/// map, grounded on `_choose_db`'s `mc[0][1] > mc[1][1]` check.
fn majority_vote(votes: &HashMap<String, u32>) -> Option<String> {
    let mut ranked: Vec<(&String, &u32)> = votes.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    match ranked.as_slice() {
        [] => None,
        [(db, _)] => Some((*db).clone()),
        [(db, top), (_, second), ..] if top > second => Some((*db).clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(current: &'a str, default: &'a str) -> ResolverContext<'a> {
        ResolverContext {
            dbt_mode: false,
            current_database: current,
            default_database: default,
            default_schema: "dbo",
        }
    }

    #[test]
    fn temp_tables_short_circuit_to_temp_namespace() {
        let reg = ObjectDbRegistry::new("Default");
        let resolved = resolve("#staging", "table", &ctx("DW", "Default"), &reg, &HashMap::new());
        assert_eq!(resolved.namespace, crate::types::TEMP_NAMESPACE);
    }

    #[test]
    fn pseudo_catalog_prefix_never_becomes_database() {
        let reg = ObjectDbRegistry::new("Default");
        let resolved = resolve("View.dbo.V1", "view", &ctx("DW", "Default"), &reg, &HashMap::new());
        assert_eq!(resolved.namespace, namespace_for_database("DW"));
        assert_eq!(resolved.qualified_name, "dbo.V1");
    }

    #[test]
    fn three_part_name_uses_explicit_database() {
        let reg = ObjectDbRegistry::new("Default");
        let resolved = resolve("OtherDW.dbo.T", "table", &ctx("DW", "Default"), &reg, &HashMap::new());
        assert_eq!(resolved.namespace, namespace_for_database("OtherDW"));
        assert_eq!(resolved.qualified_name, "dbo.T");
    }

    #[test]
    fn bare_reference_falls_back_to_registry_then_votes_then_current_db() {
        let reg = ObjectDbRegistry::new("Default");
        let resolved = resolve("dbo.Shared", "table", &ctx("DW", "Default"), &reg, &HashMap::new());
        assert_eq!(resolved.namespace, namespace_for_database("DW"));
    }

    #[test]
    fn dbt_mode_ignores_db_schema_and_uses_defaults() {
        let reg = ObjectDbRegistry::new("Default");
        let mut c = ctx("DW", "Default");
        c.dbt_mode = true;
        let resolved = resolve("some_schema.stg_orders", "view", &c, &reg, &HashMap::new());
        assert_eq!(resolved.qualified_name, "dbo.stg_orders");
    }
}
