use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to serialize {what}: {source}")]
    Serialization { what: &'static str, #[source] source: serde_json::Error },

    #[error("out-dir {0} is not a directory")]
    NotADirectory(PathBuf),
}
