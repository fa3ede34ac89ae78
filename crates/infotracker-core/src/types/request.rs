//! Per-file extraction input: normalized source text plus the hints the CLI
//! layer is responsible for supplying (spec.md §1's "I/O provider").

use super::dialect::Dialect;
use serde::{Deserialize, Serialize};

/// One file's normalized UTF-8 text plus an object-name hint, as handed to the
/// core by the CLI's encoding/globbing layer. This is the full interface the
/// core needs from the outside world — it never touches a filesystem itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// Path or script identifier used for job-path conventions and diagnostics.
    pub name: String,
    pub content: String,
    /// Best-effort object name hint derived from the file name/header
    /// (used by dbt mode and as a fallback `source_name` in emitted docs).
    #[serde(default)]
    pub object_hint: Option<String>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            object_hint: None,
        }
    }

    pub fn with_object_hint(mut self, hint: impl Into<String>) -> Self {
        self.object_hint = Some(hint.into());
        self
    }
}

/// Options controlling extraction of a single file, threaded through the
/// pipeline as part of the `ParseContext` (see `context::ParseContext`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub dialect: Dialect,
    /// Default database used when no USE statement and no registry hit resolves
    /// a reference (spec.md §4.9).
    pub default_database: String,
    /// Default schema used for unqualified table names.
    pub default_schema: String,
    /// dbt compiled-model mode (spec.md §4.3).
    pub dbt_mode: bool,
    /// Curated semantic-rename table (output name -> source name) used to
    /// upgrade an IDENTITY classification to RENAME (see SPEC_FULL.md §2).
    #[serde(default)]
    pub rename_hints: std::collections::BTreeMap<String, String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Mssql,
            default_database: "InfoTrackerDW".to_string(),
            default_schema: "dbo".to_string(),
            dbt_mode: false,
            rename_hints: std::collections::BTreeMap::new(),
        }
    }
}
