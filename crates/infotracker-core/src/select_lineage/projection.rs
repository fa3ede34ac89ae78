//! Per-projection classification (spec.md §3's closed `TransformationKind`
//! list, §4.5's classification rules) and the `SELECT` entry point that ties
//! alias maps, input collection, and star expansion together.

use super::alias::build_alias_maps;
use super::expr_inputs::collect_inputs;
use super::star::expand_wildcard;
use super::CteScope;
use crate::context::ParseContext;
use crate::parser::contains_hashbytes;
use crate::select_lineage::LineageEnv;
use crate::types::{ColumnLineage, ColumnReference, ColumnSchema, TransformationKind};
use sqlparser::ast::{BinaryOperator, Expr, Select, SelectItem, SelectItemQualifiedWildcardKind};

const AGGREGATE_FUNCTIONS: &[&str] = &["SUM", "COUNT", "AVG", "MIN", "MAX", "STDEV", "VAR", "STRING_AGG"];
const STRING_FUNCTIONS: &[&str] = &[
    "RIGHT", "LEFT", "SUBSTRING", "CHARINDEX", "LEN", "CONCAT", "REPLACE", "LTRIM", "RTRIM", "UPPER", "LOWER",
    "STUFF", "PATINDEX", "FORMAT",
];

/// Computes the full lineage + schema for one `SELECT` (no `WITH`, no set
/// operation — those are handled by the caller in `mod.rs`).
pub fn compute_select_lineage(
    select: &Select,
    ctx: &mut ParseContext,
    env: &LineageEnv,
    ctes: &CteScope,
) -> (Vec<ColumnLineage>, Vec<ColumnSchema>) {
    let maps = build_alias_maps(&select.from, ctx, env, ctes);

    let mut lineage = Vec::new();
    let mut schema = Vec::new();
    let mut seen_names = std::collections::HashSet::new();

    for (idx, item) in select.projection.iter().enumerate() {
        match item {
            SelectItem::Wildcard(_) => {
                let (l, s) = expand_wildcard(None, &maps, ctx, env, &mut seen_names, schema.len());
                lineage.extend(l);
                schema.extend(s);
            }
            SelectItem::QualifiedWildcard(kind, _) => {
                let qualifier = match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => Some(name.to_string()),
                    #[allow(unreachable_patterns)]
                    _ => None,
                };
                let (l, s) = expand_wildcard(qualifier.as_deref(), &maps, ctx, env, &mut seen_names, schema.len());
                lineage.extend(l);
                schema.extend(s);
            }
            SelectItem::UnnamedExpr(expr) => {
                let name = dedup_name(output_name(expr, idx), &mut seen_names);
                let (kind, desc, inputs) = classify_and_collect(expr, &maps, ctx.options.rename_hints.get(&name));
                let data_type = infer_type(expr, &inputs, ctx, env);
                schema.push(ColumnSchema::new(name.clone(), data_type, true, schema.len()));
                lineage.push(ColumnLineage::new(name, inputs, kind, desc));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let name = dedup_name(alias.value.clone(), &mut seen_names);
                let (kind, desc, inputs) = classify_and_collect(expr, &maps, ctx.options.rename_hints.get(&name));
                let data_type = infer_type(expr, &inputs, ctx, env);
                schema.push(ColumnSchema::new(name.clone(), data_type, true, schema.len()));
                lineage.push(ColumnLineage::new(name, inputs, kind, desc));
            }
        }
    }

    (lineage, schema)
}

fn dedup_name(name: String, seen: &mut std::collections::HashSet<String>) -> String {
    let key = name.to_lowercase();
    if seen.insert(key) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name}_{n}");
        if seen.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Classifies `expr`'s transformation kind and collects its input columns in
/// one pass, since both need the same alias-map-driven traversal.
///
/// `rename_hint` is the configured `infotracker.yml` rename mapping for this
/// output name (spec.md's Open Question decision, see DESIGN.md): when
/// present and the expression is a bare identity reference, the kind becomes
/// `RENAME` instead of `IDENTITY`.
pub fn classify_and_collect(
    expr: &Expr,
    maps: &super::AliasMaps,
    rename_hint: Option<&String>,
) -> (TransformationKind, String, Vec<ColumnReference>) {
    let inputs = collect_inputs(expr, maps);
    let kind = classify(expr, &inputs, rename_hint.is_some());
    let desc = describe(kind);
    (kind, desc, inputs)
}

fn classify(expr: &Expr, inputs: &[ColumnReference], has_rename_hint: bool) -> TransformationKind {
    if contains_hashbytes(expr) {
        return TransformationKind::Expression;
    }

    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            if has_rename_hint {
                TransformationKind::Rename
            } else if inputs.is_empty() {
                TransformationKind::Constant
            } else {
                TransformationKind::Identity
            }
        }
        Expr::Value(_) | Expr::TypedString { .. } => TransformationKind::Constant,
        Expr::Cast { expr: inner, .. } => {
            if matches!(inner.as_ref(), Expr::BinaryOp { op, .. } if is_arithmetic_op(op)) {
                TransformationKind::Arithmetic
            } else {
                TransformationKind::Cast
            }
        }
        Expr::Case { .. } => TransformationKind::Case,
        Expr::Function(func) if func.over.is_some() => TransformationKind::Window,
        Expr::Function(func) => {
            let name = func.name.to_string().to_uppercase();
            if name == "IIF" {
                TransformationKind::Case
            } else if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
                TransformationKind::Aggregation
            } else if STRING_FUNCTIONS.contains(&name.as_str()) {
                TransformationKind::StringParse
            } else {
                TransformationKind::Expression
            }
        }
        Expr::BinaryOp { op, .. } if is_arithmetic_op(op) => TransformationKind::Arithmetic,
        Expr::BinaryOp { op: BinaryOperator::StringConcat, .. } => TransformationKind::Concat,
        Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => TransformationKind::Expression,
        Expr::Nested(inner) => classify(inner, inputs, has_rename_hint),
        _ if inputs.is_empty() => TransformationKind::Constant,
        _ => TransformationKind::Expression,
    }
}

fn is_arithmetic_op(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo
    )
}

fn describe(kind: TransformationKind) -> String {
    match kind {
        TransformationKind::Identity => "direct column reference".to_string(),
        TransformationKind::Rename => "renamed via configured rename hint".to_string(),
        TransformationKind::Cast => "type cast".to_string(),
        TransformationKind::Case => "conditional expression".to_string(),
        TransformationKind::Aggregation => "aggregate function".to_string(),
        TransformationKind::Window => "window function".to_string(),
        TransformationKind::Arithmetic => "arithmetic expression".to_string(),
        TransformationKind::StringParse => "string manipulation".to_string(),
        TransformationKind::Concat => "string concatenation".to_string(),
        TransformationKind::Union => "UNION operation".to_string(),
        TransformationKind::Exec => "procedure execution".to_string(),
        TransformationKind::Constant => "constant/literal value".to_string(),
        TransformationKind::Unknown => "unrecognized expression".to_string(),
        TransformationKind::Expression => "computed expression".to_string(),
    }
}

/// Best-effort output name for an unaliased projection item, falling back to
/// a descriptive placeholder when the expression has no natural name
/// (spec.md §4.5).
fn output_name(expr: &Expr, idx: usize) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.clone()).unwrap_or_else(|| format!("expr_{idx}")),
        Expr::Function(func) if func.name.to_string().eq_ignore_ascii_case("hashbytes") => "hash_expr".to_string(),
        Expr::Cast { .. } => "cast_expr".to_string(),
        Expr::Case { .. } => "case_expr".to_string(),
        Expr::BinaryOp { op, .. } if is_arithmetic_op(op) => "calc_expr".to_string(),
        Expr::Function(func) if func.name.to_string().eq_ignore_ascii_case("coalesce") => "coalesce_expr".to_string(),
        _ => format!("expr_{idx}"),
    }
}

/// Best-effort output type: a cast's target type verbatim, an identity
/// reference's source type from whatever schema is known, otherwise
/// `"unknown"` rather than guessing (spec.md §4.5).
fn infer_type(expr: &Expr, inputs: &[ColumnReference], ctx: &ParseContext, env: &LineageEnv) -> String {
    if let Expr::Cast { data_type, .. } = expr {
        return data_type.to_string();
    }
    if let [only] = inputs {
        if only.is_temp() {
            if let Some(schema) = ctx.temp_registry.current_schema(&only.table_name) {
                if let Some(col) = schema.get_column(&only.column_name) {
                    return col.data_type.clone();
                }
            }
        } else if let Some(cols) = ctx.cte_registry.columns(&only.table_name) {
            if cols.iter().any(|c| c.eq_ignore_ascii_case(&only.column_name)) {
                return "unknown".to_string();
            }
        } else if let Some(schema) = env.schema_registry.get(&only.namespace, &only.table_name) {
            if let Some(col) = schema.get_column(&only.column_name) {
                return col.data_type.clone();
            }
        }
    }
    "unknown".to_string()
}
