//! [`ColumnReference`] and the namespace URIs that anchor it.
//!
//! Namespaces follow the GLOSSARY's `mssql://localhost/<DB>` convention, with a
//! fixed URI for the ephemeral temp-table namespace. Equality/Hash/Ord on
//! `ColumnReference` are case-insensitive on all three parts per the data model
//! in spec.md §3, while `Serialize` preserves the original casing so emitted
//! documents stay readable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fixed namespace URI for temp tables (`#foo`), whose lifetime is the current
/// file's parse rather than a real database.
pub const TEMP_NAMESPACE: &str = "mssql://localhost/tempdb";

/// Builds the namespace URI for a database name, e.g. `mssql://localhost/InfoTrackerDW`.
pub fn namespace_for_database(database: &str) -> String {
    format!("mssql://localhost/{database}")
}

/// A reference to a specific column in a specific table, scoped to a namespace.
///
/// `table_name` is the `schema.table` qualified form (no database/catalog
/// component — that lives in `namespace`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnReference {
    pub namespace: String,
    pub table_name: String,
    pub column_name: String,
}

impl ColumnReference {
    pub fn new(
        namespace: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
        }
    }

    /// Reference into a persistent/table namespace given an explicit database.
    pub fn in_database(
        database: &str,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self::new(namespace_for_database(database), table_name, column_name)
    }

    /// Reference into the temp-table namespace.
    pub fn temp(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::new(TEMP_NAMESPACE, table_name, column_name)
    }

    pub fn is_temp(&self) -> bool {
        self.namespace == TEMP_NAMESPACE || self.table_name.starts_with('#')
    }

    fn normalized_key(&self) -> (String, String, String) {
        (
            self.namespace.to_lowercase(),
            self.table_name.to_lowercase(),
            self.column_name.to_lowercase(),
        )
    }

    pub fn to_uri(&self) -> String {
        format!("{}.{}.{}", self.namespace, self.table_name, self.column_name)
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl PartialEq for ColumnReference {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_key() == other.normalized_key()
    }
}
impl Eq for ColumnReference {}

impl Hash for ColumnReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_key().hash(state);
    }
}

impl PartialOrd for ColumnReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized_key().cmp(&other.normalized_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_equality() {
        let a = ColumnReference::in_database("DW", "dbo.Orders", "OrderID");
        let b = ColumnReference::in_database("dw", "DBO.ORDERS", "orderid");
        assert_eq!(a, b);
    }

    #[test]
    fn temp_namespace_is_fixed() {
        let r = ColumnReference::temp("#staging", "x");
        assert!(r.is_temp());
        assert_eq!(r.namespace, TEMP_NAMESPACE);
    }

    #[test]
    fn uri_roundtrip_shape() {
        let r = ColumnReference::in_database("InfoTrackerDW", "dbo.Orders", "OrderID");
        assert_eq!(
            r.to_uri(),
            "mssql://localhost/InfoTrackerDW.dbo.Orders.OrderID"
        );
    }
}
