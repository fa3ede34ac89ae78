//! The AST layer (spec.md §4.2): turns preprocessed T-SQL text into a
//! `sqlparser` AST, then applies a small set of T-SQL-specific rewrites that
//! make the rest of the pipeline's pattern matching simpler:
//!
//! - `CONVERT(type, expr [, style])` is rewritten to `CAST(expr AS type)` so
//!   downstream classification only has to special-case one cast shape.
//! - `HASHBYTES(...)` calls are tagged (not rewritten — there is no target
//!   type to cast to) so the select-lineage engine's classifier can force an
//!   `EXPRESSION` verdict instead of falling through to `UNKNOWN`.
//!
//! Parsing itself tries the requested dialect first and falls back to the
//! generic dialect when that fails (Mssql-then-Generic, since this project
//! is T-SQL-first rather than warehouse-SQL-first).

use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Query, Select, SelectItem,
    SetExpr, Statement,
};
use sqlparser::parser::Parser;

/// Parses `sql` into one or more statements, trying `dialect` first and
/// falling back to [`Dialect::Generic`] if that fails and a different
/// dialect was requested. Applies [`normalize_statements`] to the result.
pub fn parse_statements(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let primary = dialect.to_sqlparser_dialect();
    let mut statements = match Parser::parse_sql(primary.as_ref(), sql) {
        Ok(statements) => statements,
        Err(primary_err) => {
            if dialect == Dialect::Generic {
                return Err(primary_err.into());
            }
            let generic = Dialect::Generic.to_sqlparser_dialect();
            Parser::parse_sql(generic.as_ref(), sql).map_err(|_| ParseError::from(primary_err))?
        }
    };

    for stmt in &mut statements {
        normalize_statement(stmt);
    }
    Ok(statements)
}

/// Legacy single-dialect entry point, kept for call sites that already know
/// which dialect parsed successfully (e.g. re-parsing a fallback-extracted
/// fragment).
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let statements = Parser::parse_sql(sqlparser_dialect.as_ref(), sql)?;
    Ok(statements)
}

/// Parses a standalone expression fragment (no surrounding `SELECT`), used by
/// the DML handlers when they pull a `SET`/`WHEN MATCHED` clause's value text
/// back out of a re-rendered statement. Returns `None` rather than an error:
/// callers treat an unparsable fragment as a reason to fall back to
/// `EXPRESSION`/`UNKNOWN` classification, not to abort the whole statement.
pub fn parse_expr(text: &str, dialect: Dialect) -> Option<Expr> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let mut parser = Parser::new(sqlparser_dialect.as_ref()).try_with_sql(text).ok()?;
    let mut expr = parser.parse_expr().ok()?;
    normalize_expr(&mut expr);
    Some(expr)
}

/// Walks `stmt`'s embedded queries/expressions rewriting `CONVERT` to `CAST`
/// in place.
pub fn normalize_statement(stmt: &mut Statement) {
    match stmt {
        Statement::Query(query) => normalize_query(query),
        Statement::Insert(insert) => {
            if let Some(source) = insert.source.as_mut() {
                normalize_query(source);
            }
        }
        Statement::CreateView { query, .. } => normalize_query(query),
        Statement::CreateTable(ct) => {
            if let Some(query) = ct.query.as_mut() {
                normalize_query(query);
            }
        }
        Statement::Update {
            assignments,
            selection,
            ..
        } => {
            for assignment in assignments {
                normalize_expr(&mut assignment.value);
            }
            if let Some(expr) = selection {
                normalize_expr(expr);
            }
        }
        Statement::Merge { source: _, .. } => {
            // MERGE's USING clause and action expressions are walked by the
            // merge DML handler directly (it needs the clause structure, not
            // just the normalized expressions).
        }
        _ => {}
    }
}

fn normalize_query(query: &mut Query) {
    normalize_set_expr(&mut query.body);
    if let Some(with) = &mut query.with {
        for cte in &mut with.cte_tables {
            normalize_query(&mut cte.query);
        }
    }
}

fn normalize_set_expr(set_expr: &mut SetExpr) {
    match set_expr {
        SetExpr::Select(select) => normalize_select(select),
        SetExpr::Query(query) => normalize_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            normalize_set_expr(left);
            normalize_set_expr(right);
        }
        SetExpr::Values(values) => {
            for row in &mut values.rows {
                for expr in row {
                    normalize_expr(expr);
                }
            }
        }
        _ => {}
    }
}

fn normalize_select(select: &mut Select) {
    for item in &mut select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                normalize_expr(expr)
            }
            _ => {}
        }
    }
    if let Some(expr) = &mut select.selection {
        normalize_expr(expr);
    }
    if let Some(expr) = &mut select.having {
        normalize_expr(expr);
    }
}

/// Recursively rewrites `CONVERT(type, expr)` / `CONVERT(type, expr, style)`
/// into `CAST(expr AS type)` wherever it appears in `expr`'s subtree. The
/// `style` argument (a T-SQL formatting code, e.g. `CONVERT(varchar, x, 112)`)
/// has no `CAST` equivalent and is dropped — style-sensitive formatting is
/// out of scope for lineage, only the type change matters.
pub fn normalize_expr(expr: &mut Expr) {
    if let Expr::Convert {
        expr: inner,
        data_type: Some(data_type),
        ..
    } = expr
    {
        normalize_expr(inner);
        *expr = Expr::Cast {
            kind: sqlparser::ast::CastKind::Cast,
            expr: inner.clone(),
            data_type: data_type.clone(),
            format: None,
        };
        return;
    }

    match expr {
        Expr::BinaryOp { left, right, .. } => {
            normalize_expr(left);
            normalize_expr(right);
        }
        Expr::UnaryOp { expr: inner, .. } => normalize_expr(inner),
        Expr::Nested(inner) => normalize_expr(inner),
        Expr::Cast { expr: inner, .. } => normalize_expr(inner),
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                normalize_expr(operand);
            }
            for when in conditions {
                normalize_expr(&mut when.condition);
                normalize_expr(&mut when.result);
            }
            if let Some(else_result) = else_result {
                normalize_expr(else_result);
            }
        }
        Expr::Function(func) => normalize_function_args(func),
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => normalize_query(query),
        Expr::InSubquery { expr: inner, subquery, .. } => {
            normalize_expr(inner);
            normalize_query(subquery);
        }
        Expr::InList { expr: inner, list, .. } => {
            normalize_expr(inner);
            for item in list {
                normalize_expr(item);
            }
        }
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            normalize_expr(inner);
            normalize_expr(low);
            normalize_expr(high);
        }
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => normalize_expr(inner),
        Expr::Like { expr: inner, pattern, .. } | Expr::ILike { expr: inner, pattern, .. } => {
            normalize_expr(inner);
            normalize_expr(pattern);
        }
        _ => {}
    }
}

fn normalize_function_args(func: &mut Function) {
    if let FunctionArguments::List(list) = &mut func.args {
        for arg in &mut list.args {
            if let FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
            | FunctionArg::Named {
                arg: FunctionArgExpr::Expr(e),
                ..
            } = arg
            {
                normalize_expr(e);
            }
        }
    }
}

/// True if `expr`'s subtree contains a call to `HASHBYTES(...)`. Used by the
/// select-lineage engine to force an `EXPRESSION` transformation kind: a
/// hash digest is neither an identity, rename, nor simple cast, and has no
/// more specific closed-enum home.
pub fn contains_hashbytes(expr: &Expr) -> bool {
    match expr {
        Expr::Function(func) => {
            func.name.to_string().eq_ignore_ascii_case("hashbytes")
                || function_args_contain_hashbytes(func)
        }
        Expr::BinaryOp { left, right, .. } => contains_hashbytes(left) || contains_hashbytes(right),
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::Cast { expr: inner, .. }
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner) => contains_hashbytes(inner),
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            operand.as_deref().is_some_and(contains_hashbytes)
                || conditions
                    .iter()
                    .any(|w| contains_hashbytes(&w.condition) || contains_hashbytes(&w.result))
                || else_result.as_deref().is_some_and(contains_hashbytes)
        }
        _ => false,
    }
}

fn function_args_contain_hashbytes(func: &Function) -> bool {
    if let FunctionArguments::List(list) = &func.args {
        list.args.iter().any(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
            | FunctionArg::Named {
                arg: FunctionArgExpr::Expr(e),
                ..
            } => contains_hashbytes(e),
            _ => false,
        })
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_select() {
        let statements = parse_statements("SELECT * FROM dbo.Users", Dialect::Mssql).unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn falls_back_to_generic_when_mssql_parse_fails() {
        // Backtick-quoted identifiers aren't valid T-SQL but are accepted by
        // the generic dialect; this exercises the fallback path.
        let sql = "SELECT `col` FROM t";
        let result = parse_statements(sql, Dialect::Mssql);
        assert!(result.is_ok());
    }

    #[test]
    fn rewrites_convert_to_cast() {
        let mut statements =
            parse_statements("SELECT CONVERT(VARCHAR(10), OrderDate, 101) FROM dbo.Orders", Dialect::Mssql)
                .unwrap();
        let Statement::Query(query) = &mut statements[0] else {
            panic!("expected query")
        };
        let SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected select")
        };
        match &select.projection[0] {
            SelectItem::UnnamedExpr(Expr::Cast { .. }) => {}
            other => panic!("expected rewritten Cast, got {other:?}"),
        }
    }

    #[test]
    fn convert_rewrite_recurses_into_case() {
        let sql = "SELECT CASE WHEN 1 = 1 THEN CONVERT(INT, Total) ELSE 0 END FROM dbo.Orders";
        let mut statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::Query(query) = &mut statements[0] else {
            panic!("expected query")
        };
        let SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected select")
        };
        let SelectItem::UnnamedExpr(Expr::Case { conditions, .. }) = &select.projection[0] else {
            panic!("expected case expr")
        };
        assert!(matches!(conditions[0].result, Expr::Cast { .. }));
    }

    #[test]
    fn detects_hashbytes_calls() {
        let statements =
            parse_statements("SELECT HASHBYTES('SHA2_256', Email) FROM dbo.Users", Dialect::Mssql).unwrap();
        let Statement::Query(query) = &statements[0] else {
            panic!("expected query")
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            panic!("expected select")
        };
        let SelectItem::UnnamedExpr(expr) = &select.projection[0] else {
            panic!("expected expr")
        };
        assert!(contains_hashbytes(expr));
    }

    #[test]
    fn plain_identity_has_no_hashbytes() {
        let statements = parse_statements("SELECT Email FROM dbo.Users", Dialect::Mssql).unwrap();
        let Statement::Query(query) = &statements[0] else {
            panic!("expected query")
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            panic!("expected select")
        };
        let SelectItem::UnnamedExpr(expr) = &select.projection[0] else {
            panic!("expected expr")
        };
        assert!(!contains_hashbytes(expr));
    }
}
