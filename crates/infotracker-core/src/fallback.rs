//! String fallbacks (spec.md §4.7): best-effort extraction for a file whose
//! text `sqlparser` can't turn into a statement list at all — a dialect
//! quirk the generic-dialect retry in [`crate::parser::parse_statements`]
//! still can't digest, a fragment of a larger batch, hand-edited SQL that
//! simply isn't valid. Per spec.md §7, this is the last resort before an
//! object is reported with no lineage at all: regex-driven extraction over
//! the raw (preprocessed) text, never another parse attempt.
//!
//! Three extractors are tried in order, each strictly more permissive (and
//! less precise) than the last:
//!
//! 1. the last top-level `SELECT` in the file, re-parsed on its own — often
//!    succeeds even when the surrounding batch doesn't, since the failure is
//!    usually an earlier statement's dialect quirk;
//! 2. an `INSERT INTO <target> (<cols>) SELECT ...` shape, read positionally:
//!    each explicit target column is paired with the projection item in the
//!    same position, and a bare `alias.column` projection becomes a
//!    best-effort (unresolved-alias) input reference;
//! 3. dependencies only: every `FROM`/`JOIN`/`EXEC` target in the text, with
//!    no lineage at all.

use crate::context::ParseContext;
use crate::resolver::{self, is_temp_identifier};
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::{ColumnLineage, ColumnReference, ObjectInfo, ObjectType, ReasonCode, TableSchema, TransformationKind};
use crate::util::{split_top_level, strip_brackets};
use regex::Regex;
use sqlparser::ast::Statement;
use std::collections::BTreeSet;
use std::sync::OnceLock;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

static_regex!(re_from_join, r"(?i)\b(?:FROM|JOIN)\s+([\w.\[\]#]+)");
static_regex!(re_exec_target, r"(?is)\bEXEC(?:UTE)?\s+([\w.\[\]]+)");
static_regex!(re_insert_cols, r"(?is)INSERT\s+INTO\s+([\w.\[\]#]+)\s*\(([^)]*)\)\s*SELECT\s+");
static_regex!(re_alias_dot_column, r"^([\w\[\]]+)\.([\w\[\]]+)$");

/// Entry point for the whole-file string-fallback path: `text` couldn't be
/// turned into a statement list by `sqlparser` at all. `object_hint` names
/// the file when no target table is recoverable from its text either.
pub fn handle_unparsable(text: &str, object_hint: &str, ctx: &mut ParseContext, env: &LineageEnv) -> ObjectInfo {
    if let Some(obj) = try_last_select(text, object_hint, ctx, env) {
        return obj;
    }
    if let Some(obj) = try_insert_column_list(text, ctx, env) {
        return obj;
    }

    ctx.warn(crate::types::issue_codes::NO_AST_PARSE, "file could not be parsed; recording dependencies only");
    let dependencies = collect_basic_dependencies(text);
    let schema = TableSchema::new(ctx.namespace(), object_hint.to_string());
    ObjectInfo::new(object_hint.to_string(), ObjectType::Unknown, schema)
        .with_dependencies(dependencies)
        .mark_fallback(ReasonCode::NoAstParse)
}

/// Tries to re-parse just the last top-level `SELECT` statement in the file
/// on its own. A batch-level parse failure is very often caused by one
/// earlier statement (a DECLARE/CURSOR/dialect quirk the preprocessor didn't
/// strip); the trailing `SELECT` is usually clean T-SQL by itself.
fn try_last_select(text: &str, object_hint: &str, ctx: &mut ParseContext, env: &LineageEnv) -> Option<ObjectInfo> {
    let fragment = split_top_level(text, ';')
        .into_iter()
        .rev()
        .find(|f| f.trim_start().to_uppercase().starts_with("SELECT"))?;

    let statements = crate::parser::parse_statements(&fragment, ctx.options.dialect).ok()?;
    let Statement::Query(query) = statements.into_iter().next()? else {
        return None;
    };

    let mut ctes = Default::default();
    let (lineage, schema_cols) = compute_query_lineage(&query, ctx, env, &mut ctes);
    let mut schema = TableSchema::new(ctx.namespace(), object_hint.to_string());
    schema.columns = schema_cols;
    schema.renumber();
    let dependencies = crate::ddl::view::deps_from_lineage(&lineage);

    Some(
        ObjectInfo::new(object_hint.to_string(), ObjectType::Unknown, schema)
            .with_lineage(lineage)
            .with_dependencies(dependencies)
            .mark_fallback(ReasonCode::NoAstParse),
    )
}

/// Reads an `INSERT INTO <target> (<cols>) SELECT <items> ...` shape
/// positionally, without parsing the `SELECT` list as expressions: each
/// explicit target column is paired with the projection item in the same
/// position. A bare `alias.column` item becomes an unresolved-alias input
/// reference (the alias text itself stands in for a table name, since there
/// is no `FROM` clause alias map to resolve it against); anything else
/// (an expression, a literal, a function call) gets no input at all and a
/// `Unknown` transformation kind.
fn try_insert_column_list(text: &str, ctx: &mut ParseContext, env: &LineageEnv) -> Option<ObjectInfo> {
    let caps = re_insert_cols().captures(text)?;
    let target_raw = strip_brackets(&caps[1]);
    let target_cols: Vec<String> = split_top_level(&caps[2], ',').into_iter().map(|c| strip_brackets(&c)).collect();
    if target_cols.is_empty() {
        return None;
    }

    let select_start = caps.get(0)?.end();
    let rest = &text[select_start..];
    let select_list_end = re_from_join().find(rest).map(|m| m.start()).unwrap_or(rest.len());
    let items: Vec<String> = split_top_level(&rest[..select_list_end], ',');
    if items.len() != target_cols.len() {
        return None;
    }

    let namespace = ctx.namespace();
    let lineage: Vec<ColumnLineage> = target_cols
        .iter()
        .zip(items.iter())
        .map(|(col, item)| {
            let trimmed = item.trim();
            match re_alias_dot_column().captures(trimmed) {
                Some(m) => {
                    let alias = strip_brackets(&m[1]);
                    let source_col = strip_brackets(&m[2]);
                    let input = ColumnReference::new(namespace.clone(), alias, source_col);
                    ColumnLineage::new(col.clone(), vec![input], TransformationKind::Identity, "fallback alias.column mapping")
                }
                None => ColumnLineage::new(col.clone(), Vec::new(), TransformationKind::Unknown, "unparsable projection in fallback"),
            }
        })
        .collect();

    let is_temp = is_temp_identifier(&target_raw);
    let (out_namespace, qualified_name) = if is_temp {
        (crate::types::TEMP_NAMESPACE.to_string(), target_raw.clone())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(&target_raw, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let mut schema = TableSchema::new(out_namespace, qualified_name.clone());
    for name in &target_cols {
        schema.push(name.clone(), "unknown", true);
    }

    let dependencies = collect_basic_dependencies(text);

    Some(
        ObjectInfo::new(qualified_name, ObjectType::Unknown, schema)
            .with_lineage(lineage)
            .with_dependencies(dependencies)
            .mark_fallback(ReasonCode::NoAstParse),
    )
}

/// Scans raw text for `FROM`/`JOIN`/`EXEC` targets, skipping temp tables and
/// subquery/derived-table openers (`(`). This is the last-resort dependency
/// scan spec.md §4.7 calls "basic dependencies": no lineage, just the read
/// edges a diff or impact query still needs.
fn collect_basic_dependencies(text: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for caps in re_from_join().captures_iter(text) {
        let name = strip_brackets(&caps[1]);
        if !name.is_empty() && !is_temp_identifier(&name) {
            deps.insert(name);
        }
    }
    for caps in re_exec_target().captures_iter(text) {
        let name = strip_brackets(&caps[1]);
        if !name.is_empty() && !is_temp_identifier(&name) {
            deps.insert(name);
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ObjectDbRegistry, SchemaRegistry};
    use crate::types::ExtractOptions;
    use std::collections::HashMap;

    fn env<'a>(schema_reg: &'a SchemaRegistry, db_reg: &'a ObjectDbRegistry, votes: &'a HashMap<String, u32>) -> LineageEnv<'a> {
        LineageEnv {
            schema_registry: schema_reg,
            object_db_registry: db_reg,
            db_votes: votes,
        }
    }

    #[test]
    fn last_select_recovers_when_preceding_noise_is_unparsable() {
        let sql = "EXEC sp_whatever_unsupported_syntax @@#garbage; SELECT o.OrderID FROM dbo.Orders AS o";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_unparsable(sql, "misc/odd", &mut ctx, &e);
        assert!(obj.is_fallback);
        assert_eq!(obj.reason_code, Some(ReasonCode::NoAstParse));
        assert_eq!(obj.lineage.len(), 1);
        assert!(obj.dependencies.contains("dbo.Orders"));
    }

    #[test]
    fn insert_column_list_maps_alias_dot_column_positionally() {
        let sql = "INSERT INTO dbo.Target (c1, c2) SELECT s.x, s.y FROM dbo.Stage AS s WHERE 1 /*!*/ = 1";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_unparsable(sql, "misc/odd", &mut ctx, &e);
        assert_eq!(obj.qualified_name, "dbo.Target");
        assert_eq!(obj.lineage.len(), 2);
        assert_eq!(obj.lineage[0].input_fields[0].table_name, "s");
        assert_eq!(obj.lineage[0].input_fields[0].column_name, "x");
    }

    #[test]
    fn falls_back_to_dependencies_only_when_nothing_recognizable() {
        let sql = "IF 1 = 1 EXEC dbo.usp_Helper";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_unparsable(sql, "misc/cond", &mut ctx, &e);
        assert_eq!(obj.object_type, ObjectType::Unknown);
        assert!(obj.lineage.is_empty());
        assert!(obj.dependencies.contains("dbo.usp_Helper"));
    }
}
