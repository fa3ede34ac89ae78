//! [`ObjectInfo`] — the finalized description of one parsed SQL object.

use super::lineage::ColumnLineage;
use super::schema::TableSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Table,
    View,
    Function,
    Procedure,
    TempTable,
    Script,
    Unknown,
}

/// Reason codes surfaced to users (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    OnlyProcedureResultset,
    NoPersistentOutputDetected,
    UnknownDbContext,
    DbtNoFinalSelect,
    InsertExecFallback,
    NoAstParse,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnlyProcedureResultset => "ONLY_PROCEDURE_RESULTSET",
            Self::NoPersistentOutputDetected => "NO_PERSISTENT_OUTPUT_DETECTED",
            Self::UnknownDbContext => "UNKNOWN_DB_CONTEXT",
            Self::DbtNoFinalSelect => "DBT_NO_FINAL_SELECT",
            Self::InsertExecFallback => "INSERT_EXEC_FALLBACK",
            Self::NoAstParse => "NO_AST_PARSE",
        }
    }
}

/// The finalized description of a single SQL object: its schema, its
/// per-output-column lineage, and the datasets it depends on.
///
/// Invariant (spec.md §3): `|lineage| == |schema.columns|` whenever lineage is
/// present and `object_type != Table` (tables are sources and carry no
/// lineage by definition).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub qualified_name: String,
    pub object_type: ObjectType,
    pub schema: TableSchema,
    pub lineage: Vec<ColumnLineage>,
    pub dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    /// Override for the OpenLineage job path convention (`warehouse/sql/<hint>.sql`
    /// by default; dbt-mode objects use `dbt/models/<hint>.sql`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_path_override: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ObjectInfo {
    pub fn new(qualified_name: impl Into<String>, object_type: ObjectType, schema: TableSchema) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            object_type,
            schema,
            lineage: Vec::new(),
            dependencies: BTreeSet::new(),
            is_fallback: false,
            reason_code: None,
            job_path_override: None,
        }
    }

    pub fn with_lineage(mut self, lineage: Vec<ColumnLineage>) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn with_dependencies(mut self, deps: BTreeSet<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn mark_fallback(mut self, reason: ReasonCode) -> Self {
        self.is_fallback = true;
        self.reason_code = Some(reason);
        self
    }

    pub fn with_reason(mut self, reason: ReasonCode) -> Self {
        self.reason_code = Some(reason);
        self
    }

    /// Checks the P1 invariant: lineage arity matches schema arity, in order,
    /// for every non-table object.
    pub fn check_lineage_arity(&self) -> bool {
        if self.object_type == ObjectType::Table {
            return self.lineage.is_empty();
        }
        if self.lineage.is_empty() {
            // Objects where lineage could not be determined (fallback/unknown) are exempt.
            return true;
        }
        self.lineage.len() == self.schema.columns.len()
            && self
                .lineage
                .iter()
                .zip(self.schema.columns.iter())
                .all(|(l, c)| l.output_column.eq_ignore_ascii_case(&c.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::lineage::TransformationKind;
    use crate::types::reference::ColumnReference;

    #[test]
    fn table_has_no_lineage() {
        let mut schema = TableSchema::new("ns", "dbo.T");
        schema.push("a", "int", false);
        let obj = ObjectInfo::new("dbo.T", ObjectType::Table, schema);
        assert!(obj.check_lineage_arity());
    }

    #[test]
    fn view_arity_must_match_schema() {
        let mut schema = TableSchema::new("ns", "dbo.V");
        schema.push("a", "int", false);
        let lineage = vec![ColumnLineage::identity(
            "a",
            ColumnReference::in_database("DW", "dbo.T", "a"),
        )];
        let obj = ObjectInfo::new("dbo.V", ObjectType::View, schema).with_lineage(lineage);
        assert!(obj.check_lineage_arity());
    }
}
