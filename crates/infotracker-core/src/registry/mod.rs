//! Symbol registries (spec.md §3): the mutable state threaded through
//! extraction. [`SchemaRegistry`] and [`ObjectDbRegistry`] are persistent
//! across a whole run; [`CteRegistry`] and [`TempRegistry`] are scoped to a
//! single parse/procedure and discarded once it finishes.

pub mod cte_registry;
pub mod object_db_registry;
pub mod schema_registry;
pub mod temp_registry;

pub use cte_registry::CteRegistry;
pub use object_db_registry::ObjectDbRegistry;
pub use schema_registry::SchemaRegistry;
pub use temp_registry::{normalize_temp_name, TempRegistry, TempVersion};
