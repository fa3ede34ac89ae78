//! `CREATE TABLE` handler (spec.md §4.4).
//!
//! A table is a source: it gets a resolved qualified name and a column schema
//! but never any lineage (`ObjectInfo::lineage` stays empty by definition).

use crate::context::ParseContext;
use crate::resolver::{self, ResolverContext};
use crate::types::{ColumnSchema, ObjectInfo, ObjectType, TableSchema};
use sqlparser::ast::{ColumnOption, CreateTable, DataType};

/// Parses a `CREATE TABLE` statement into a registered [`ObjectInfo`].
pub fn handle_create_table(
    create: &CreateTable,
    ctx: &mut ParseContext,
    resolver_ctx: &ResolverContext,
    object_db_registry: &crate::registry::ObjectDbRegistry,
    db_votes: &std::collections::HashMap<String, u32>,
) -> ObjectInfo {
    let raw_name = create.name.to_string();
    let resolved = resolver::resolve(&raw_name, "table", resolver_ctx, object_db_registry, db_votes);

    let mut schema = TableSchema::new(resolved.namespace, resolved.qualified_name.clone());
    for (ordinal, col) in create.columns.iter().enumerate() {
        let nullable = column_is_nullable(col);
        let data_type = normalize_type(&col.data_type);
        schema.columns.push(ColumnSchema::new(col.name.value.clone(), data_type, nullable, ordinal));
    }

    if schema.columns.is_empty() {
        ctx.warn(crate::types::issue_codes::UNSUPPORTED_CREATE_KIND, "CREATE TABLE with no columns");
    }

    ObjectInfo::new(resolved.qualified_name, ObjectType::Table, schema)
}

/// A column is `NOT NULL` if it carries an explicit `NOT NULL` option, or a
/// `PRIMARY KEY` option (which implies not-null even without saying so).
/// An explicit `NULL` option always wins over any other inference.
pub(crate) fn column_is_nullable(col: &sqlparser::ast::ColumnDef) -> bool {
    let mut nullable = true;
    let mut explicit_null = false;
    for opt in &col.options {
        match &opt.option {
            ColumnOption::NotNull => nullable = false,
            ColumnOption::Null => explicit_null = true,
            ColumnOption::Unique { is_primary, .. } if *is_primary => nullable = false,
            _ => {}
        }
    }
    if explicit_null {
        return true;
    }
    nullable
}

/// Normalizes a DDL column type to the lowercase/aliased form spec.md §4.4
/// requires: `VARCHAR` family becomes `nvarchar`, `DECIMAL(p,s)` has its
/// whitespace stripped and is lowercased, everything else is lowercased
/// verbatim (sqlparser already renders precision/scale in parens).
pub fn normalize_type(data_type: &DataType) -> String {
    let rendered = data_type.to_string();
    let lower = rendered.to_lowercase();

    if matches!(
        data_type,
        DataType::Varchar(_) | DataType::CharVarying(_) | DataType::CharacterVarying(_)
    ) {
        return lower.replacen("varchar", "nvarchar", 1);
    }

    lower.replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_statements;
    use crate::registry::ObjectDbRegistry;
    use crate::types::{Dialect, ExtractOptions};
    use sqlparser::ast::Statement;
    use std::collections::HashMap;

    fn resolver_ctx<'a>(current: &'a str, default: &'a str) -> ResolverContext<'a> {
        ResolverContext {
            dbt_mode: false,
            current_database: current,
            default_database: default,
            default_schema: "dbo",
        }
    }

    #[test]
    fn s1_customers_table_schema() {
        let sql = "CREATE TABLE dbo.Customers (CustomerID INT NOT NULL PRIMARY KEY, Name NVARCHAR(100), Email NVARCHAR(255) NULL)";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::CreateTable(create) = &statements[0] else {
            panic!("expected CreateTable")
        };
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));
        let reg = ObjectDbRegistry::new("DW");
        let obj = handle_create_table(create, &mut ctx, &resolver_ctx("DW", "DW"), &reg, &HashMap::new());

        assert_eq!(obj.qualified_name, "dbo.Customers");
        assert_eq!(obj.object_type, ObjectType::Table);
        assert!(obj.lineage.is_empty());
        assert!(obj.dependencies.is_empty());

        let cols = &obj.schema.columns;
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "CustomerID");
        assert!(!cols[0].nullable);
        assert_eq!(cols[1].name, "Name");
        assert!(cols[1].nullable);
        assert_eq!(cols[2].name, "Email");
        assert!(cols[2].nullable);
        assert!(obj.check_lineage_arity());
    }

    #[test]
    fn normalizes_varchar_to_nvarchar() {
        let sql = "CREATE TABLE dbo.T (a VARCHAR(50))";
        let statements = parse_statements(sql, Dialect::Mssql).unwrap();
        let Statement::CreateTable(create) = &statements[0] else {
            panic!("expected CreateTable")
        };
        let mut ctx = ParseContext::new(ExtractOptions::default(), Some("DW".into()));
        let reg = ObjectDbRegistry::new("DW");
        let obj = handle_create_table(create, &mut ctx, &resolver_ctx("DW", "DW"), &reg, &HashMap::new());
        assert_eq!(obj.schema.columns[0].data_type, "nvarchar(50)");
    }
}
