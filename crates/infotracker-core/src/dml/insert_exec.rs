//! `INSERT INTO <target> EXEC <proc>` (spec.md §4.6, §4.7).
//!
//! Non-standard T-SQL: `sqlparser` has no `Statement` shape for a bare
//! `INSERT INTO ... EXEC ...` (it isn't valid ANSI or Postgres-dialect
//! syntax), so this is always string-first, matching spec.md §4.7's listing
//! of "INSERT column list extractor" / EXEC-family constructs among the
//! regex-based fallbacks rather than the AST-driven handlers. The
//! preprocessor's `re_insert_exec_join` step (see `preprocess.rs`) has
//! already joined a split `INSERT INTO #x\nEXEC proc` onto one line by the
//! time this runs.
//!
//! Column-level provenance is unknowable without executing `<proc>`, so
//! each of the target's known columns gets a same-name passthrough lineage
//! of kind `EXEC` pointing at the called procedure; the caller marks the
//! resulting object with `ReasonCode::InsertExecFallback`.

use super::MaterializationResult;
use crate::context::ParseContext;
use crate::resolver;
use crate::select_lineage::LineageEnv;
use crate::types::{ColumnLineage, ColumnReference, TransformationKind, TEMP_NAMESPACE};
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
    re_insert_exec,
    r"(?is)INSERT\s+INTO\s+([\w.\[\]#]+)\s*(\([^)]*\))?\s*EXEC(?:UTE)?\s+([\w.\[\]]+)"
);

/// Matches `text` against the `INSERT INTO <target> EXEC <proc>` shape,
/// returning `(target_raw, proc_raw)` on a hit.
pub fn detect(text: &str) -> Option<(String, String)> {
    let caps = re_insert_exec().captures(text)?;
    let target = caps.get(1)?.as_str().to_string();
    let proc = caps.get(3)?.as_str().to_string();
    Some((target, proc))
}

pub fn handle(target_raw: &str, proc_raw: &str, ctx: &mut ParseContext, env: &LineageEnv) -> MaterializationResult {
    let is_temp = super::is_temp_target(target_raw);
    let (namespace, qualified_name) = if is_temp {
        (TEMP_NAMESPACE.to_string(), target_raw.to_string())
    } else {
        let resolver_ctx = env.resolver_ctx(ctx);
        let resolved = resolver::resolve(target_raw, "table", &resolver_ctx, env.object_db_registry, env.db_votes);
        (resolved.namespace, resolved.qualified_name)
    };

    let resolver_ctx = env.resolver_ctx(ctx);
    let resolved_proc = resolver::resolve(proc_raw, "procedure", &resolver_ctx, env.object_db_registry, env.db_votes);

    let known_columns: Vec<String> = if is_temp {
        ctx.temp_registry.current_schema(target_raw).map(|s| s.column_names()).unwrap_or_default()
    } else {
        env.schema_registry.get(&namespace, &qualified_name).map(|s| s.column_names()).unwrap_or_default()
    };

    let lineage: Vec<ColumnLineage> = known_columns
        .iter()
        .map(|name| {
            let input = ColumnReference::new(resolved_proc.namespace.clone(), resolved_proc.qualified_name.clone(), name.clone());
            ColumnLineage::new(name.clone(), vec![input], TransformationKind::Exec, "populated via INSERT...EXEC")
        })
        .collect();

    let columns = known_columns
        .iter()
        .enumerate()
        .map(|(i, name)| crate::types::ColumnSchema::new(name.clone(), "unknown", true, i))
        .collect();

    let mut dependencies = std::collections::BTreeSet::new();
    dependencies.insert(resolved_proc.qualified_name.clone());

    MaterializationResult {
        target_raw: target_raw.to_string(),
        is_temp,
        namespace,
        qualified_name,
        columns,
        lineage,
        dependencies,
    }
}
