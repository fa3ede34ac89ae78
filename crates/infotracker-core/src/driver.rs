//! Per-file extraction driver (spec.md §4.2): the pipeline that turns one
//! [`FileSource`] into a finished [`ObjectInfo`], threading the preprocessor,
//! optional dbt templating, router, and handler dispatch together, then
//! feeding what it learned back into the cross-file registries.
//!
//! Grounded on `original_source/src/infotracker/parser.py`'s `SqlParser.parse_file`
//! (preprocess → detect database → parse → route → dispatch → learn) and,
//! for [`collect_db_votes`], on that same module's `_infer_db_candidates_from_sql`
//! regex scan for 3-part dotted identifiers.

use crate::context::ParseContext;
use crate::ddl;
use crate::fallback;
use crate::registry::{ObjectDbRegistry, SchemaRegistry};
use crate::resolver::{self, PSEUDO_CATALOGS};
use crate::router::{self, RouteKind};
use crate::script;
use crate::select_lineage::{compute_query_lineage, LineageEnv};
use crate::templater::{self, TemplateConfig, TemplateMode};
use crate::types::{
    issue_codes, namespace_for_database, ExtractOptions, FileSource, Issue, ObjectInfo, ObjectType,
    ReasonCode, TableSchema, TEMP_NAMESPACE,
};
use regex::Regex;
use sqlparser::ast::Statement;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One file's finished extraction: the object plus any diagnostics
/// accumulated along the way, each stamped with the file's name.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub object: ObjectInfo,
    pub issues: Vec<Issue>,
}

fn re_db_vote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)\.([A-Za-z_]\w*)\b").expect("static regex is valid"))
}

/// Scans raw (preprocessed) text for 3-part dotted identifiers
/// (`db.schema.table`), counting the leading segment as a vote for that
/// database. Pseudo-catalog prefixes and `tempdb` are never real databases
/// and never vote, matching the resolver's own exclusion list.
pub fn collect_db_votes(text: &str) -> HashMap<String, u32> {
    let mut votes = HashMap::new();
    for caps in re_db_vote().captures_iter(text) {
        let db = &caps[1];
        let lower = db.to_lowercase();
        if lower == "tempdb" || PSEUDO_CATALOGS.contains(&lower.as_str()) {
            continue;
        }
        *votes.entry(db.to_string()).or_insert(0) += 1;
    }
    votes
}

fn obj_type_hint(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Table => "table",
        ObjectType::View => "view",
        ObjectType::Function => "function",
        ObjectType::Procedure => "procedure",
        ObjectType::TempTable | ObjectType::Script | ObjectType::Unknown => "table",
    }
}

/// Recovers a database name from a `mssql://host/<database>` namespace URI.
fn database_from_namespace(namespace: &str) -> Option<&str> {
    namespace.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Derives a best-effort object name hint from a file path: the file stem,
/// stripped of its directory and extension. Used only when the caller
/// supplies no explicit `FileSource::object_hint`.
fn derive_hint(name: &str) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name).to_string()
}

/// Extracts one file into a finished [`ObjectInfo`], updating `schema_registry`
/// and `object_db_registry` with what was learned along the way (spec.md §4.2).
pub fn extract_file(
    source: &FileSource,
    options: &ExtractOptions,
    schema_registry: &mut SchemaRegistry,
    object_db_registry: &mut ObjectDbRegistry,
) -> ExtractedFile {
    let object_hint = source.object_hint.clone().unwrap_or_else(|| derive_hint(&source.name));

    let templated = if options.dbt_mode {
        let mut context = HashMap::new();
        context.insert("model_name".to_string(), serde_json::json!(object_hint));
        let config = TemplateConfig { mode: TemplateMode::Dbt, context };
        match templater::template_sql(&source.content, &config) {
            Ok(rendered) => rendered,
            Err(err) => {
                let schema = TableSchema::new(namespace_for_database(&options.default_database), object_hint.clone());
                let object = ObjectInfo::new(object_hint.clone(), ObjectType::Unknown, schema).mark_fallback(ReasonCode::DbtNoFinalSelect);
                return ExtractedFile {
                    object,
                    issues: vec![Issue::error(issue_codes::PARSE_ERROR, err.to_string()).with_source_name(source.name.clone())],
                };
            }
        }
    } else {
        source.content.clone()
    };

    let preprocessed = crate::preprocess::preprocess(&templated, &options.default_database);
    let db_votes = collect_db_votes(&preprocessed.text);
    let mut ctx = ParseContext::new(options.clone(), preprocessed.detected_database);

    let object = match crate::parser::parse_statements(&preprocessed.text, options.dialect) {
        Ok(statements) => {
            let env = LineageEnv {
                schema_registry,
                object_db_registry,
                db_votes: &db_votes,
            };
            dispatch(&statements, &preprocessed.text, &object_hint, options.dbt_mode, &mut ctx, &env)
        }
        Err(_) => {
            let env = LineageEnv {
                schema_registry,
                object_db_registry,
                db_votes: &db_votes,
            };
            fallback::handle_unparsable(&preprocessed.text, &object_hint, &mut ctx, &env)
        }
    };

    learn(&object, &ctx.current_database, object_db_registry);
    schema_registry.register(object.schema.clone());

    let source_name = source.name.clone();
    let mut issues = ctx.diagnostics;
    for issue in &mut issues {
        if issue.source_name.is_none() {
            issue.source_name = Some(source_name.clone());
        }
    }

    ExtractedFile { object, issues }
}

/// Routes the parsed statement list to the matching handler and runs it.
fn dispatch(
    statements: &[Statement],
    text: &str,
    object_hint: &str,
    dbt_mode: bool,
    ctx: &mut ParseContext,
    env: &LineageEnv,
) -> ObjectInfo {
    let route_result = router::route(statements, dbt_mode);

    match route_result.kind {
        RouteKind::Table => {
            let Statement::CreateTable(create) = &statements[route_result.primary_index.expect("Table route always carries a primary index")] else {
                unreachable!("router guarantees CreateTable at this index")
            };
            let resolver_ctx = env.resolver_ctx(ctx);
            ddl::handle_create_table(create, ctx, &resolver_ctx, env.object_db_registry, env.db_votes)
        }
        RouteKind::View => {
            let Statement::CreateView { name, columns, query, .. } = &statements[route_result.primary_index.expect("View route always carries a primary index")] else {
                unreachable!("router guarantees CreateView at this index")
            };
            let name_idents: Vec<sqlparser::ast::Ident> = columns.iter().map(|c| c.name.clone()).collect();
            ddl::handle_create_view(name, &name_idents, query, ctx, env)
        }
        RouteKind::Function => ddl::handle_create_function(text, ctx, env),
        RouteKind::Procedure => ddl::handle_create_procedure(text, ctx, env),
        RouteKind::Script => script::handle_script(text, object_hint, ctx, env),
        RouteKind::DbtModel => handle_dbt_model(statements, object_hint, ctx, env),
    }
}

/// dbt compiled-model mode (spec.md §4.3): the file is a SELECT-only model
/// named from `object_hint` regardless of its statement shape. The last
/// top-level `SELECT`/`UNION` query in the (already Jinja-rendered) file is
/// the model body; dbt compiles a model to exactly one final query, so
/// "last" and "only" coincide in practice.
fn handle_dbt_model(statements: &[Statement], object_hint: &str, ctx: &mut ParseContext, env: &LineageEnv) -> ObjectInfo {
    let resolver_ctx = env.resolver_ctx(ctx);
    let resolved = resolver::resolve(object_hint, "view", &resolver_ctx, env.object_db_registry, env.db_votes);

    let last_query = statements.iter().rev().find_map(|s| match s {
        Statement::Query(q) => Some(q.as_ref()),
        _ => None,
    });

    let Some(query) = last_query else {
        ctx.warn(issue_codes::UNSUPPORTED_CREATE_KIND, "dbt model has no final SELECT");
        let schema = TableSchema::new(resolved.namespace, resolved.qualified_name.clone());
        return ObjectInfo::new(resolved.qualified_name, ObjectType::View, schema).mark_fallback(ReasonCode::DbtNoFinalSelect);
    };

    let mut ctes = Default::default();
    let (lineage, schema_cols) = compute_query_lineage(query, ctx, env, &mut ctes);
    let mut schema = TableSchema::new(resolved.namespace, resolved.qualified_name.clone());
    schema.columns = schema_cols;
    schema.renumber();
    let dependencies = ddl::view::deps_from_lineage(&lineage);

    ObjectInfo::new(resolved.qualified_name, ObjectType::View, schema)
        .with_lineage(lineage)
        .with_dependencies(dependencies)
}

/// Feeds the finished object back into the persistent [`ObjectDbRegistry`]:
/// a genuine `CREATE`d table/view/function is hard evidence (spec.md §4.9),
/// while a procedure/script's discovered write target or a fallback object
/// is only as strong as "this got written to" (`learn_from_targets`).
/// Every dependency is weak evidence that it lives in the current database.
fn learn(object: &ObjectInfo, current_database: &str, object_db_registry: &mut ObjectDbRegistry) {
    if object.schema.namespace != TEMP_NAMESPACE {
        let type_hint = obj_type_hint(object.object_type);
        let database = database_from_namespace(&object.schema.namespace).unwrap_or(current_database);

        match object.object_type {
            ObjectType::Table | ObjectType::View | ObjectType::Function if !object.is_fallback => {
                object_db_registry.learn_from_create(type_hint, &object.qualified_name, database);
            }
            _ => {
                object_db_registry.learn_from_targets(type_hint, &object.qualified_name, database);
            }
        }
    }

    for dep in &object.dependencies {
        object_db_registry.learn_from_references("table", dep, current_database);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dialect;

    fn options() -> ExtractOptions {
        ExtractOptions {
            dialect: Dialect::Mssql,
            default_database: "InfoTrackerDW".to_string(),
            default_schema: "dbo".to_string(),
            dbt_mode: false,
            rename_hints: Default::default(),
        }
    }

    #[test]
    fn collects_votes_from_three_part_names_excluding_pseudo_catalogs() {
        let text = "SELECT * FROM DW.dbo.Orders o JOIN View.dbo.V v ON 1=1 JOIN tempdb.dbo.Scratch t ON 1=1";
        let votes = collect_db_votes(text);
        assert_eq!(votes.get("DW"), Some(&1));
        assert!(!votes.contains_key("View"));
        assert!(!votes.contains_key("tempdb"));
    }

    #[test]
    fn extracts_a_view_and_registers_it_for_future_lookups() {
        let source = FileSource::new(
            "models/stg_orders.sql",
            "CREATE VIEW dbo.stg_orders AS SELECT o.OrderID, o.CustomerID FROM dbo.Orders AS o",
        );
        let mut schema_registry = SchemaRegistry::new();
        let mut object_db_registry = ObjectDbRegistry::new("InfoTrackerDW");

        let result = extract_file(&source, &options(), &mut schema_registry, &mut object_db_registry);
        assert_eq!(result.object.qualified_name, "dbo.stg_orders");
        assert_eq!(result.object.object_type, ObjectType::View);
        assert!(schema_registry.contains("mssql://localhost/InfoTrackerDW", "dbo.stg_orders"));
        assert_eq!(object_db_registry.resolve("view", "dbo.stg_orders"), "InfoTrackerDW");
    }

    #[test]
    fn unparsable_file_falls_through_to_string_fallback() {
        let source = FileSource::new("misc/odd.sql", "EXEC sp_whatever_unsupported_syntax @@#garbage; SELECT o.OrderID FROM dbo.Orders AS o");
        let mut schema_registry = SchemaRegistry::new();
        let mut object_db_registry = ObjectDbRegistry::new("InfoTrackerDW");

        let result = extract_file(&source, &options(), &mut schema_registry, &mut object_db_registry);
        assert!(result.object.is_fallback);
        assert_eq!(result.object.reason_code, Some(ReasonCode::NoAstParse));
    }

    #[test]
    fn dbt_mode_names_the_model_from_the_object_hint() {
        let source = FileSource::new("models/stg_orders.sql", "SELECT o.OrderID FROM {{ ref('orders') }} AS o").with_object_hint("stg_orders");
        let mut opts = options();
        opts.dbt_mode = true;
        let mut schema_registry = SchemaRegistry::new();
        let mut object_db_registry = ObjectDbRegistry::new("InfoTrackerDW");

        let result = extract_file(&source, &opts, &mut schema_registry, &mut object_db_registry);
        assert_eq!(result.object.qualified_name, "dbo.stg_orders");
        assert!(result.object.dependencies.contains("orders"));
    }

    #[test]
    fn script_with_persistent_write_learns_it_as_a_target_not_a_create() {
        let source = FileSource::new(
            "migrations/001_load.sql",
            "SELECT a.x INTO #stage FROM dbo.Source AS a; INSERT INTO dbo.Target (c1) SELECT s.x FROM #stage AS s;",
        );
        let mut schema_registry = SchemaRegistry::new();
        let mut object_db_registry = ObjectDbRegistry::new("InfoTrackerDW");

        let result = extract_file(&source, &options(), &mut schema_registry, &mut object_db_registry);
        assert_eq!(result.object.qualified_name, "dbo.Target");
        assert!(result.object.dependencies.contains("dbo.Source"));
        assert_eq!(object_db_registry.resolve("table", "dbo.Source"), "InfoTrackerDW");
    }
}
