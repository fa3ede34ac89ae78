//! Column-level lineage extraction engine for T-SQL.
//!
//! This crate is the pure core of the project: it never touches a
//! filesystem or a process exit code. Its only interface to the outside
//! world is [`types::FileSource`] in, [`types::ObjectInfo`] (plus
//! accumulated [`types::Issue`]s) out. The `infotracker-cli` crate is
//! responsible for globbing files, detecting encodings, loading config, and
//! turning results into an exit code.

pub mod context;
pub mod ddl;
pub mod diff;
pub mod dml;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod impact;
pub mod parser;
pub mod preprocess;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod script;
pub mod select_lineage;
pub mod templater;
pub mod types;
pub mod util;

pub use context::{ParseContext, ProcAccumulator};
pub use ddl::{handle_create_function, handle_create_procedure, handle_create_table, handle_create_view};
pub use diff::{ChangeKind, ChangeSeverity, ColumnChange, DiffReport};
pub use driver::{extract_file, ExtractedFile};
pub use emitter::{emit as emit_openlineage, with_warnings, OpenLineageDocument};
pub use error::ParseError;
pub use fallback::handle_unparsable;
pub use graph::{ColumnGraph, GraphEdge};
pub use impact::{parse_selector, walk as impact_walk, Direction, ImpactNode};
pub use parser::{parse_sql_with_dialect, parse_statements};
pub use preprocess::preprocess;
pub use resolver::{resolve as resolve_name, ResolvedName, ResolverContext};
pub use router::{route, RouteKind, RouteResult};
pub use script::handle_script;
pub use select_lineage::{compute_query_lineage, LineageEnv};

pub use types::{
    issue_codes, namespace_for_database, CatalogColumn, CatalogFile, CatalogTable, ColumnLineage,
    ColumnReference, ColumnSchema, Dialect, ExtractOptions, FileSource, Issue, ObjectInfo,
    ObjectType, ReasonCode, Severity, TableSchema, TransformationKind, TEMP_NAMESPACE,
};

pub use registry::{CteRegistry, ObjectDbRegistry, SchemaRegistry, TempRegistry};
