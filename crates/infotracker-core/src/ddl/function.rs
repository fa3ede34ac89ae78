//! `CREATE FUNCTION` handler (spec.md §4.4, §4.3's "string-first" note).
//!
//! `sqlparser`'s `Statement::CreateFunction` shape is not something this
//! codebase has ever needed to destructure (it's only ever matched with
//! `{ .. }` here), and a T-SQL scalar UDF/TVF body has enough
//! dialect-specific quirks (`RETURNS @t TABLE(...)`, bare `RETURN (SELECT
//! ...)`) that hand-parsing its re-rendered `Display` text is both simpler
//! and more robust than trusting an unverified field layout. This mirrors
//! spec.md §4.3's explicit call for the function handler to be
//! "string-first because of TVF RETURN quirks" and generalizes it to the
//! whole handler rather than only its trickiest branch.
//!
//! Three shapes, decided by the `RETURNS` clause:
//!   - scalar UDF (`RETURNS int`, `RETURNS nvarchar(50)`, ...): empty
//!     schema/lineage.
//!   - inline TVF (`RETURNS TABLE AS RETURN (SELECT ...)`): the returned
//!     `SELECT` is run straight through the select-lineage engine.
//!   - multi-statement TVF (`RETURNS @t TABLE(...)` with `INSERT INTO @t
//!     SELECT ...` in the body): the table-variable's column list becomes
//!     the function's schema; each INSERT's `SELECT` is run through the
//!     select-lineage engine and merged per output column via
//!     [`crate::context::ProcAccumulator`].

use crate::context::ParseContext;
use crate::parser::parse_statements;
use crate::resolver;
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::{ColumnLineage, ColumnSchema, Dialect, ObjectInfo, ObjectType, TableSchema, TransformationKind};
use crate::util::{find_matching_paren, split_top_level};
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

static_regex!(re_function_name, r"(?is)CREATE\s+(?:OR\s+ALTER\s+)?FUNCTION\s+([\w.\[\]]+)\s*\(");
static_regex!(re_mstvf_returns, r"(?is)RETURNS\s+(@\w+)\s+TABLE\s*(\()");
static_regex!(re_tvf_returns_table, r"(?is)RETURNS\s+TABLE\b");
static_regex!(re_inline_return, r"(?is)\bRETURN\b\s*\(?\s*(SELECT\b[\s\S]*)");
static_regex!(re_insert_into_tablevar, r"(?is)INSERT\s+INTO\s+(@\w+)\s*(\([^)]*\))?\s*(SELECT\b)");

/// Parses a `CREATE FUNCTION` statement (given its raw, preprocessed source
/// text — the whole `CREATE FUNCTION ... END` block) into an [`ObjectInfo`].
pub fn handle_create_function(text: &str, ctx: &mut ParseContext, env: &LineageEnv) -> ObjectInfo {
    let raw_name = re_function_name()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown_function".to_string());

    let resolver_ctx = env.resolver_ctx(ctx);
    let resolved = resolver::resolve(&raw_name, "function", &resolver_ctx, env.object_db_registry, env.db_votes);

    if let Some(caps) = re_mstvf_returns().captures(text) {
        let table_var = caps.get(1).unwrap().as_str();
        let open_idx = caps.get(2).unwrap().start();
        return handle_multi_statement_tvf(text, table_var, open_idx, resolved.namespace, resolved.qualified_name, ctx, env);
    }

    if re_tvf_returns_table().is_match(text) {
        return handle_inline_tvf(text, resolved.namespace, resolved.qualified_name, ctx, env);
    }

    // Scalar UDF: no tabular output, by definition.
    let schema = TableSchema::new(resolved.namespace, resolved.qualified_name.clone());
    ObjectInfo::new(resolved.qualified_name, ObjectType::Function, schema)
}

fn handle_inline_tvf(
    text: &str,
    namespace: String,
    qualified_name: String,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> ObjectInfo {
    let Some(caps) = re_inline_return().captures(text) else {
        ctx.warn(crate::types::issue_codes::UNSUPPORTED_CREATE_KIND, "inline TVF RETURN body not found");
        return ObjectInfo::new(qualified_name.clone(), ObjectType::Function, TableSchema::new(namespace, qualified_name));
    };
    let mut body = caps.get(1).unwrap().as_str().trim().to_string();
    // Strip a balanced trailing ")" left over from "RETURN (SELECT ...)" and
    // any trailing statement terminator/"END".
    if body.ends_with(')') {
        body.pop();
    }
    let body = body.trim_end_matches(';').trim_end();
    let body = body.strip_suffix("END").map(str::trim_end).unwrap_or(body);

    let statements = match parse_statements(body, ctx.options.dialect) {
        Ok(s) => s,
        Err(_) => {
            ctx.warn(crate::types::issue_codes::NO_AST_PARSE, "inline TVF body failed to parse");
            return ObjectInfo::new(qualified_name.clone(), ObjectType::Function, TableSchema::new(namespace, qualified_name));
        }
    };
    let Some(sqlparser::ast::Statement::Query(query)) = statements.into_iter().next() else {
        return ObjectInfo::new(qualified_name.clone(), ObjectType::Function, TableSchema::new(namespace, qualified_name));
    };

    let mut ctes = Default::default();
    let (lineage, schema_cols) = compute_query_lineage(&query, ctx, env, &mut ctes);
    let mut schema = TableSchema::new(namespace, qualified_name.clone());
    schema.columns = schema_cols;
    schema.renumber();
    let dependencies = crate::ddl::view::deps_from_lineage(&lineage);

    ObjectInfo::new(qualified_name, ObjectType::Function, schema)
        .with_lineage(lineage)
        .with_dependencies(dependencies)
}

fn handle_multi_statement_tvf(
    text: &str,
    table_var: &str,
    open_idx: usize,
    namespace: String,
    qualified_name: String,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> ObjectInfo {
    let mut schema = TableSchema::new(namespace.clone(), qualified_name.clone());
    if let Some(close_idx) = find_matching_paren(text, open_idx) {
        let col_defs = &text[open_idx + 1..close_idx];
        for (ordinal, def) in split_top_level(col_defs, ',').into_iter().enumerate() {
            let mut parts = def.split_whitespace();
            let Some(name) = parts.next() else { continue };
            let data_type: String = parts.collect::<Vec<_>>().join(" ").to_lowercase();
            let data_type = if data_type.is_empty() { "unknown".to_string() } else { data_type };
            schema.columns.push(ColumnSchema::new(crate::util::strip_brackets(name), data_type, true, ordinal));
        }
    }

    let mut accumulator: std::collections::HashMap<String, std::collections::BTreeSet<crate::types::ColumnReference>> =
        std::collections::HashMap::new();
    let mut dependencies = std::collections::BTreeSet::new();

    for caps in re_insert_into_tablevar().captures_iter(text) {
        let target = caps.get(1).unwrap().as_str();
        if !target.eq_ignore_ascii_case(table_var) {
            continue;
        }
        let explicit_cols: Option<Vec<String>> = caps.get(2).map(|m| {
            split_top_level(m.as_str().trim_start_matches('(').trim_end_matches(')'), ',')
                .into_iter()
                .map(|c| crate::util::strip_brackets(&c))
                .collect()
        });
        let select_start = caps.get(3).unwrap().start();
        let select_text = extract_one_statement(&text[select_start..]);

        let statements = match parse_statements(&select_text, Dialect::Generic) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let Some(sqlparser::ast::Statement::Query(query)) = statements.into_iter().next() else {
            continue;
        };
        let mut ctes = Default::default();
        let (lineage, _) = compute_query_lineage(&query, ctx, env, &mut ctes);
        dependencies.extend(crate::ddl::view::deps_from_lineage(&lineage));

        let names = explicit_cols.unwrap_or_else(|| schema.column_names());
        for (name, col_lineage) in names.into_iter().zip(lineage.into_iter()) {
            accumulator.entry(name).or_default().extend(col_lineage.input_fields);
        }
    }

    let lineage: Vec<ColumnLineage> = schema
        .column_names()
        .into_iter()
        .map(|name| {
            let inputs: Vec<crate::types::ColumnReference> =
                accumulator.get(&name).cloned().map(|s| s.into_iter().collect()).unwrap_or_default();
            ColumnLineage::new(name, inputs, TransformationKind::Identity, "multi-statement TVF output")
        })
        .collect();

    ObjectInfo::new(qualified_name, ObjectType::Function, schema)
        .with_lineage(lineage)
        .with_dependencies(dependencies)
}

/// Cuts `text` (starting at a `SELECT` keyword) down to one statement's worth
/// of text: up to the next top-level `;`, or the enclosing `END`, whichever
/// comes first.
fn extract_one_statement(text: &str) -> String {
    let mut depth = 0i32;
    let mut in_string = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            ';' if !in_string && depth == 0 => return text[..i].to_string(),
            _ => {}
        }
        if !in_string && depth == 0 && text[i..].to_uppercase().starts_with("END") && i > 0 {
            return text[..i].to_string();
        }
    }
    text.to_string()
}
