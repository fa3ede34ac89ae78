//! [`TransformationKind`] and [`ColumnLineage`].

use super::reference::ColumnReference;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed classification of how an output column derives from its inputs.
///
/// This is a total match target everywhere it is produced (see
/// `select_lineage::projection::classify`) so that a new sqlparser `Expr`
/// variant cannot silently fall through to the wrong bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationKind {
    Identity,
    Rename,
    Cast,
    Case,
    Aggregation,
    Window,
    Arithmetic,
    StringParse,
    Concat,
    Expression,
    Union,
    Exec,
    Constant,
    Unknown,
}

impl TransformationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "IDENTITY",
            Self::Rename => "RENAME",
            Self::Cast => "CAST",
            Self::Case => "CASE",
            Self::Aggregation => "AGGREGATION",
            Self::Window => "WINDOW",
            Self::Arithmetic => "ARITHMETIC",
            Self::StringParse => "STRING_PARSE",
            Self::Concat => "CONCAT",
            Self::Expression => "EXPRESSION",
            Self::Union => "UNION",
            Self::Exec => "EXEC",
            Self::Constant => "CONSTANT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Lineage for one output column: its ordered input fields, the transformation
/// kind, and a human-readable description.
///
/// Invariant (spec.md §3): if `kind` is `Identity` or `Rename`, `input_fields`
/// has exactly one element. This is asserted in debug builds by
/// [`ColumnLineage::new`]'s callers (the select-lineage engine), not enforced
/// here, since fallback extractors sometimes build partial lineage before the
/// kind is finalized.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLineage {
    pub output_column: String,
    pub input_fields: Vec<ColumnReference>,
    pub transformation_type: TransformationKind,
    pub transformation_description: String,
}

impl ColumnLineage {
    pub fn new(
        output_column: impl Into<String>,
        input_fields: Vec<ColumnReference>,
        transformation_type: TransformationKind,
        transformation_description: impl Into<String>,
    ) -> Self {
        Self {
            output_column: output_column.into(),
            input_fields,
            transformation_type,
            transformation_description: transformation_description.into(),
        }
    }

    pub fn identity(output_column: impl Into<String>, input: ColumnReference) -> Self {
        Self::new(
            output_column,
            vec![input],
            TransformationKind::Identity,
            "direct column reference",
        )
    }

    /// Deduplicates `input_fields` while preserving first-seen order, per
    /// spec.md §5 ORDERING GUARANTEES.
    pub fn dedup_inputs_preserving_order(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.input_fields.retain(|r| seen.insert(r.clone_key()));
    }
}

impl ColumnReference {
    fn clone_key(&self) -> (String, String, String) {
        (
            self.namespace.to_lowercase(),
            self.table_name.to_lowercase(),
            self.column_name.to_lowercase(),
        )
    }
}
