//! SQL dialect tag threaded through preprocessing, parsing, and fallbacks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::{Dialect as SqlParserDialectTrait, GenericDialect, MsSqlDialect};

/// The SQL dialect used for parsing. InfoTracker is T-SQL-first; `Generic` exists
/// as the AST-layer fallback when strict `MsSql` parsing fails on a quirky file
/// (see `parser::parse_statements`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mssql,
    Generic,
}

impl Dialect {
    pub fn to_sqlparser_dialect(self) -> Box<dyn SqlParserDialectTrait> {
        match self {
            Dialect::Mssql => Box::new(MsSqlDialect {}),
            Dialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mssql() {
        assert_eq!(Dialect::default(), Dialect::Mssql);
    }
}
