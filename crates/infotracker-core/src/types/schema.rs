//! [`ColumnSchema`] and [`TableSchema`] — the schema half of the data model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema information for a single column.
///
/// `ordinal` is unique within the owning [`TableSchema`]; the invariant that
/// ordinals are a contiguous `0..N-1` permutation of column order is enforced
/// by [`TableSchema::push`] and checked by [`TableSchema::check_ordinals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub ordinal: usize,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            ordinal,
        }
    }
}

/// Schema information for a table, view, or any other dataset-shaped object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub namespace: String,
    /// The `schema.table` qualified name.
    pub qualified_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(namespace: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            qualified_name: qualified_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSchema>) -> Self {
        self.columns = columns;
        self.renumber();
        self
    }

    /// Appends a column, assigning it the next ordinal.
    pub fn push(&mut self, name: impl Into<String>, data_type: impl Into<String>, nullable: bool) {
        let ordinal = self.columns.len();
        self.columns
            .push(ColumnSchema::new(name, data_type, nullable, ordinal));
    }

    /// Re-assigns ordinals 0..N-1 in current vector order. Used after
    /// reordering/filtering columns (e.g. a view's explicit header column list).
    pub fn renumber(&mut self) {
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.ordinal = i;
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Checks the P1-adjacent invariant that ordinals form a contiguous
    /// `0..N-1` permutation of the column vector's order.
    pub fn check_ordinals(&self) -> bool {
        self.columns
            .iter()
            .enumerate()
            .all(|(i, c)| c.ordinal == i)
    }
}
