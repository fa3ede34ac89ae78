//! Object router (spec.md §4.3): decides which handler owns a file by
//! counting its top-level `CREATE` statements.
//!
//! Follows spec.md §4.3's literal description ("count CREATE FUNCTION /
//! PROC[EDURE] / TABLE statements"). Unlike a dispatch-by-`Statement`-variant
//! match that handles every statement kind uniformly in one pass over one
//! object, this router decides up front which single handler should own the
//! *whole file*, since one InfoTracker input file is one SQL object (or,
//! failing that, a multi-statement script) rather than an arbitrary bag of
//! statements.

use sqlparser::ast::Statement;

/// Which handler should process a file, as decided by [`route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Table,
    View,
    Function,
    Procedure,
    /// More than one kind of CREATE (or several of the same kind with no
    /// clear primary), or no recognizable CREATE at all: fall through to the
    /// multi-statement script flow (dependencies + best-effort final SELECT).
    Script,
    /// dbt compiled-model mode: the file is treated as a SELECT-only model
    /// regardless of its statement shape (spec.md §4.3).
    DbtModel,
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub kind: RouteKind,
    /// Index into the statement list of the single object this route is
    /// about (the lone CREATE TABLE/VIEW/PROCEDURE, or the first CREATE
    /// FUNCTION when several are present). `None` for `Script`/`DbtModel`.
    pub primary_index: Option<usize>,
}

/// Routes a parsed file. `dbt_mode` short-circuits everything else per
/// spec.md §4.3's dbt-mode rule: the file is a compiled SELECT-only model,
/// named from a leading header comment or the file stem, not from its
/// statement shape.
pub fn route(statements: &[Statement], dbt_mode: bool) -> RouteResult {
    if dbt_mode {
        return RouteResult {
            kind: RouteKind::DbtModel,
            primary_index: None,
        };
    }

    let tables: Vec<usize> = indices_of(statements, is_persistent_create_table);
    let views: Vec<usize> = indices_of(statements, |s| matches!(s, Statement::CreateView { .. }));
    let functions: Vec<usize> = indices_of(statements, |s| matches!(s, Statement::CreateFunction { .. }));
    let procedures: Vec<usize> = indices_of(statements, |s| matches!(s, Statement::CreateProcedure { .. }));

    let total = tables.len() + views.len() + functions.len() + procedures.len();

    if total == 0 {
        return RouteResult {
            kind: RouteKind::Script,
            primary_index: None,
        };
    }

    if tables.len() == 1 && views.is_empty() && functions.is_empty() && procedures.is_empty() {
        return RouteResult {
            kind: RouteKind::Table,
            primary_index: Some(tables[0]),
        };
    }
    if views.len() == 1 && tables.is_empty() && functions.is_empty() && procedures.is_empty() {
        return RouteResult {
            kind: RouteKind::View,
            primary_index: Some(views[0]),
        };
    }
    if !functions.is_empty() && procedures.is_empty() && tables.is_empty() && views.is_empty() {
        // Multiple CREATE FUNCTIONs: process the first as primary (spec.md §4.3).
        return RouteResult {
            kind: RouteKind::Function,
            primary_index: Some(functions[0]),
        };
    }
    if procedures.len() == 1 && tables.is_empty() && views.is_empty() && functions.is_empty() {
        return RouteResult {
            kind: RouteKind::Procedure,
            primary_index: Some(procedures[0]),
        };
    }

    RouteResult {
        kind: RouteKind::Script,
        primary_index: None,
    }
}

/// `CREATE TABLE` statements targeting a local temp table (`#foo`) are
/// intermediate scaffolding inside a script, not "the" object of the file;
/// they don't count toward the single-table routing decision.
fn is_persistent_create_table(stmt: &Statement) -> bool {
    match stmt {
        Statement::CreateTable(ct) => !crate::resolver::is_temp_identifier(&ct.name.to_string()),
        _ => false,
    }
}

fn indices_of(statements: &[Statement], pred: impl Fn(&Statement) -> bool) -> Vec<usize> {
    statements
        .iter()
        .enumerate()
        .filter(|(_, s)| pred(s))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_statements;
    use crate::types::Dialect;

    #[test]
    fn single_table_routes_to_table_handler() {
        let stmts = parse_statements("CREATE TABLE dbo.T (a INT)", Dialect::Mssql).unwrap();
        let r = route(&stmts, false);
        assert_eq!(r.kind, RouteKind::Table);
        assert_eq!(r.primary_index, Some(0));
    }

    #[test]
    fn single_view_routes_to_view_handler() {
        let stmts = parse_statements("CREATE VIEW dbo.V AS SELECT 1 AS a", Dialect::Mssql).unwrap();
        let r = route(&stmts, false);
        assert_eq!(r.kind, RouteKind::View);
    }

    #[test]
    fn temp_table_creation_does_not_count_toward_table_routing() {
        let stmts = parse_statements(
            "CREATE TABLE #tmp (a INT); CREATE VIEW dbo.V AS SELECT a FROM #tmp",
            Dialect::Mssql,
        )
        .unwrap();
        let r = route(&stmts, false);
        assert_eq!(r.kind, RouteKind::View);
    }

    #[test]
    fn no_create_statements_is_a_script() {
        let stmts = parse_statements("SELECT 1", Dialect::Mssql).unwrap();
        let r = route(&stmts, false);
        assert_eq!(r.kind, RouteKind::Script);
    }

    #[test]
    fn dbt_mode_overrides_everything() {
        let stmts = parse_statements("CREATE TABLE dbo.T (a INT)", Dialect::Mssql).unwrap();
        let r = route(&stmts, true);
        assert_eq!(r.kind, RouteKind::DbtModel);
    }
}
