//! `... OUTPUT <select_items> INTO <sink> ...` (spec.md §4.6, §4.7).
//!
//! `sqlparser`'s `OutputClause::{Output, Returning}` exposes `select_items`
//! but not, as far as this codebase has ever needed to check, a field for the MSSQL-only
//! `INTO <sink> (<cols>)` target — T-SQL's `OUTPUT` is itself a
//! `sqlparser` extension grafted onto `INSERT`/`UPDATE`/`DELETE`/`MERGE`,
//! and the `INTO` target is the riskiest part of that extension to trust
//! sight-unseen. This handler is string-first on the raw (preprocessed)
//! statement text instead, matching spec.md §4.7's explicit "OUTPUT-INTO
//! extractors" fallback.
//!
//! `inserted.col`/`deleted.col` map to the enclosing DML's own target
//! table; `alias.col` maps through the alias map built for that
//! statement's `FROM`/`USING` clause; anything else falls back to a
//! self-reference against the DML target, per spec.md §4.6.

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::{AliasMaps, AliasTarget, LineageEnv};
use crate::types::{ColumnLineage, ColumnReference, ColumnSchema, TransformationKind, TEMP_NAMESPACE};
use crate::util::split_top_level;
use regex::Regex;
use std::sync::OnceLock;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

static_regex!(
    re_output_into,
    r"(?is)\bOUTPUT\s+(.+?)\s+INTO\s+([\w.\[\]#]+)\s*(\([^)]*\))?"
);
static_regex!(re_output_item, r"(?is)^\s*(?:(\w+)\s*\.\s*)?(\*|\[?\w+\]?)\s*(?:AS\s+(\w+))?\s*$");

/// One column of an `OUTPUT` list: its eventual output name, and (if it
/// could be parsed) the `qualifier.column` it reads.
#[derive(Debug, Clone)]
pub struct OutputItem {
    pub output_name: String,
    pub qualifier: Option<String>,
    pub column_name: String,
}

#[derive(Debug, Clone)]
pub struct DetectedOutputInto {
    pub sink_raw: String,
    pub items: Vec<OutputItem>,
}

/// Scans `text` for `OUTPUT <items> INTO <sink>`, parsing the item list by
/// top-level commas. Items that don't match the `[qualifier.]column [AS
/// alias]` shape (e.g. expressions) are kept with `column_name` set to the
/// raw text so callers can still fall back to a self-reference.
pub fn detect(text: &str) -> Option<DetectedOutputInto> {
    let caps = re_output_into().captures(text)?;
    let sink_raw = caps.get(2)?.as_str().to_string();
    let items_raw = caps.get(1)?.as_str();

    let items = split_top_level(items_raw, ',')
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .map(|raw| parse_output_item(raw.trim()))
        .collect();

    Some(DetectedOutputInto { sink_raw, items })
}

fn parse_output_item(raw: &str) -> OutputItem {
    if let Some(caps) = re_output_item().captures(raw) {
        let qualifier = caps.get(1).map(|m| m.as_str().to_string());
        let column = crate::util::strip_brackets(caps.get(2).map(|m| m.as_str()).unwrap_or(raw));
        let alias = caps.get(3).map(|m| m.as_str().to_string());
        let output_name = alias.unwrap_or_else(|| column.clone());
        OutputItem {
            output_name,
            qualifier,
            column_name: column,
        }
    } else {
        OutputItem {
            output_name: raw.to_string(),
            qualifier: None,
            column_name: raw.to_string(),
        }
    }
}

/// Resolves a detected `OUTPUT INTO` into a [`MaterializationResult`] for
/// the sink. `dml_target` is the already-resolved (namespace, qualified_name)
/// of the enclosing statement's own DML target, used for `inserted.`/
/// `deleted.` qualifiers and as the provenance fallback; `maps` is the
/// alias map built from that statement's `FROM`/`USING` clause, used for
/// any other qualifier.
pub fn handle(
    detected: &DetectedOutputInto,
    dml_target: (&str, &str),
    maps: &AliasMaps,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> MaterializationResult {
    let (dml_namespace, dml_qualified_name) = dml_target;

    let lineage: Vec<ColumnLineage> = detected
        .items
        .iter()
        .map(|item| {
            let input = resolve_item_input(item, dml_namespace, dml_qualified_name, maps);
            ColumnLineage::new(item.output_name.clone(), vec![input], TransformationKind::Identity, "captured via OUTPUT INTO")
        })
        .collect();

    let columns: Vec<ColumnSchema> = lineage
        .iter()
        .enumerate()
        .map(|(i, l)| ColumnSchema::new(l.output_column.clone(), "unknown", true, i))
        .collect();

    let is_temp = super::is_temp_target(&detected.sink_raw);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), detected.sink_raw.clone())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(&detected.sink_raw, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let (lineage, dependencies) = super::expand_and_collect_deps(lineage, ctx);

    MaterializationResult {
        target_raw: detected.sink_raw.clone(),
        is_temp,
        namespace,
        qualified_name,
        columns,
        lineage,
        dependencies,
    }
}

fn resolve_item_input(item: &OutputItem, dml_namespace: &str, dml_qualified_name: &str, maps: &AliasMaps) -> ColumnReference {
    match item.qualifier.as_deref() {
        Some(q) if q.eq_ignore_ascii_case("inserted") || q.eq_ignore_ascii_case("deleted") => {
            ColumnReference::new(dml_namespace, dml_qualified_name, item.column_name.clone())
        }
        Some(q) => match maps.get(q) {
            Some(AliasTarget::Table(t)) => ColumnReference::new(t.namespace.clone(), t.qualified_name.clone(), item.column_name.clone()),
            Some(AliasTarget::Derived(cols)) => cols
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&item.column_name))
                .and_then(|(_, inputs)| inputs.first().cloned())
                .unwrap_or_else(|| ColumnReference::new(dml_namespace, dml_qualified_name, item.column_name.clone())),
            None => ColumnReference::new(dml_namespace, dml_qualified_name, item.column_name.clone()),
        },
        None => ColumnReference::new(dml_namespace, dml_qualified_name, item.column_name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sink_and_splits_items() {
        let sql = "INSERT INTO dbo.T (A, B) OUTPUT inserted.A, inserted.B INTO dbo.AuditLog VALUES (1, 2)";
        let detected = detect(sql).unwrap();
        assert_eq!(detected.sink_raw, "dbo.AuditLog");
        assert_eq!(detected.items.len(), 2);
        assert_eq!(detected.items[0].qualifier.as_deref(), Some("inserted"));
        assert_eq!(detected.items[0].column_name, "A");
    }

    #[test]
    fn inserted_qualifier_maps_to_dml_target() {
        let item = OutputItem {
            output_name: "A".to_string(),
            qualifier: Some("inserted".to_string()),
            column_name: "A".to_string(),
        };
        let maps = AliasMaps::default();
        let input = resolve_item_input(&item, "mssql://localhost/DW", "dbo.T", &maps);
        assert_eq!(input.table_name, "dbo.T");
        assert_eq!(input.column_name, "A");
    }
}
