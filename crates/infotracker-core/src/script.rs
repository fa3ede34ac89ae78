//! Multi-statement script handler (spec.md §4.3's `RouteKind::Script` flow:
//! "no single CREATE wins the file, so fall through to dependencies + a
//! best-effort final result set").
//!
//! A script is a file with no recognizable primary object: a batch of
//! `USE`/`IF`/ad-hoc DML, a one-off migration, a file that's all temp-table
//! scaffolding. It's scanned with the exact same forward pass as a procedure
//! body (see [`crate::ddl::procedure::scan_fragments`]) — the same "last
//! persistent write wins, temp writes commit as they're seen" rule applies
//! equally to a script's top level as to a procedure's `BEGIN ... END` body,
//! since `sqlparser::Parser::parse_sql` fails the whole batch if even one
//! `;`-delimited statement in it is unparsable (a bare `INSERT ... EXEC`, an
//! `IF` block), and a script is exactly the kind of file likely to contain
//! one.

use crate::context::ParseContext;
use crate::ddl::procedure::{scan_fragments, FragmentScanResult};
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::types::{ObjectInfo, ObjectType, ReasonCode, TableSchema};

/// Runs the shared fragment scan over a whole script's (preprocessed) text
/// and builds the resulting [`ObjectInfo`]. `object_hint` names the file
/// when no persistent write and no final `SELECT` is found to name it
/// instead (`FileSource::object_hint`, or the file stem the CLI derives from
/// its path).
pub fn handle_script(text: &str, object_hint: &str, ctx: &mut ParseContext, env: &LineageEnv) -> ObjectInfo {
    let FragmentScanResult { last_output, last_select, dependencies } = scan_fragments(text, ctx, env);

    if let Some(out) = last_output {
        let lineage = ctx.proc_accumulator.finalize(&out.qualified_name);
        let mut schema = TableSchema::new(out.namespace, out.qualified_name.clone());
        for l in &lineage {
            let data_type = out
                .schema
                .get_column(&l.output_column)
                .map(|c| c.data_type.clone())
                .unwrap_or_else(|| "unknown".to_string());
            schema.push(l.output_column.clone(), data_type, true);
        }

        let obj = ObjectInfo::new(out.qualified_name, ObjectType::Script, schema)
            .with_lineage(lineage)
            .with_dependencies(dependencies);

        return if out.via_insert_exec {
            obj.mark_fallback(ReasonCode::InsertExecFallback)
        } else {
            obj
        };
    }

    if let Some(query) = last_select {
        let mut ctes = Default::default();
        let (lineage, schema_cols) = compute_query_lineage(&query, ctx, env, &mut ctes);
        let mut schema = TableSchema::new(ctx.namespace(), object_hint.to_string());
        schema.columns = schema_cols;
        schema.renumber();
        let deps = crate::ddl::view::deps_from_lineage(&lineage);

        return ObjectInfo::new(object_hint.to_string(), ObjectType::Script, schema)
            .with_lineage(lineage)
            .with_dependencies(deps)
            .mark_fallback(ReasonCode::OnlyProcedureResultset);
    }

    ctx.warn(crate::types::issue_codes::UNSUPPORTED_CREATE_KIND, "no materialized output or result set found in script");
    let schema = TableSchema::new(ctx.namespace(), object_hint.to_string());
    ObjectInfo::new(object_hint.to_string(), ObjectType::Script, schema).mark_fallback(ReasonCode::NoPersistentOutputDetected)
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
    fn script_with_persistent_insert_names_target() {
        let sql = "SELECT a.x, a.y INTO #stage FROM dbo.Source AS a; \
            INSERT INTO dbo.Target (c1, c2) SELECT s.x, s.y FROM #stage AS s;";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_script(sql, "migrations/001_load", &mut ctx, &e);
        assert_eq!(obj.qualified_name, "dbo.Target");
        assert_eq!(obj.object_type, ObjectType::Script);
        assert!(!obj.is_fallback);
        assert!(obj.dependencies.contains("dbo.Source"));
        assert!(obj.check_lineage_arity());
    }

    #[test]
    fn script_with_only_a_final_select_falls_back_to_resultset() {
        let sql = "USE DW; SELECT o.OrderID FROM dbo.Orders AS o;";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_script(sql, "reports/orders", &mut ctx, &e);
        assert_eq!(obj.qualified_name, "reports/orders");
        assert!(obj.is_fallback);
        assert_eq!(obj.reason_code, Some(ReasonCode::OnlyProcedureResultset));
        assert_eq!(obj.lineage.len(), 1);
    }

    #[test]
    fn script_with_no_recognizable_output_falls_back_to_unknown() {
        let sql = "IF @@ROWCOUNT > 0 PRINT 'ok'";
        let schema_reg = SchemaRegistry::new();
        let db_reg = ObjectDbRegistry::new("DW");
        let votes = HashMap::new();
        let e = env(&schema_reg, &db_reg, &votes);
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));

        let obj = handle_script(sql, "misc/noop", &mut ctx, &e);
        assert!(obj.is_fallback);
        assert_eq!(obj.reason_code, Some(ReasonCode::NoPersistentOutputDetected));
        assert!(obj.lineage.is_empty());
    }
}
