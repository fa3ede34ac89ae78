//! The data model (spec.md §3): column references, schemas, lineage,
//! object info, plus the request/catalog/issue shapes around the edges.

pub mod catalog;
pub mod dialect;
pub mod issue;
pub mod lineage;
pub mod object;
pub mod reference;
pub mod request;
pub mod schema;

pub use catalog::{CatalogColumn, CatalogFile, CatalogTable};
pub use dialect::Dialect;
pub use issue::{issue_codes, Issue, Severity};
pub use lineage::{ColumnLineage, TransformationKind};
pub use object::{ObjectInfo, ObjectType, ReasonCode};
pub use reference::{namespace_for_database, ColumnReference, TEMP_NAMESPACE};
pub use request::{ExtractOptions, FileSource};
pub use schema::{ColumnSchema, TableSchema};
