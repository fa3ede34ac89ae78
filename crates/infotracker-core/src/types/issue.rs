//! Non-fatal warnings/errors accumulated during a run (spec.md §7).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl Issue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            source_name: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            source_name: None,
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}

/// Machine-readable issue codes used across the engine.
pub mod issue_codes {
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const ENCODING_ERROR: &str = "ENCODING_ERROR";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const NO_AST_PARSE: &str = "NO_AST_PARSE";
    pub const UNSUPPORTED_CREATE_KIND: &str = "UNSUPPORTED_CREATE_KIND";
    pub const FALLBACK_USED: &str = "FALLBACK_USED";
    pub const CANCELLED: &str = "CANCELLED";
}
