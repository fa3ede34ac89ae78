//! Catalog YAML shape (spec.md §6) used to seed the [`crate::registry::SchemaRegistry`]
//! before extraction begins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub tables: Vec<CatalogTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTable {
    #[serde(default)]
    pub namespace: Option<String>,
    /// `schema.table` qualified name.
    pub name: String,
    #[serde(default)]
    pub columns: Vec<CatalogColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub ordinal: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_catalog_yaml() {
        let yaml = r#"
tables:
  - name: dbo.Customers
    columns:
      - name: CustomerID
        type: int
        nullable: false
      - name: Name
        type: nvarchar(100)
"#;
        let catalog: CatalogFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(catalog.tables.len(), 1);
        assert_eq!(catalog.tables[0].columns.len(), 2);
        assert_eq!(catalog.tables[0].columns[0].nullable, Some(false));
    }
}
