//! Write-temp-then-rename helper (spec.md §5 "Resource discipline": the
//! `ObjectDbRegistry` persistent file, and by extension every other corpus
//! artifact this crate writes, is written atomically at the end of a
//! successful run).

use crate::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Writes `bytes` to `path` atomically: the content lands fully formed or
/// not at all, even if the process is killed mid-write. A sibling temp file
/// in the same directory is written and fsynced first, then renamed over
/// `path` (rename is atomic within a filesystem).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io { path: dir.to_path_buf(), source })?;

    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("out"),
        std::process::id()
    ));

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(source) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ExportError::Io { path: tmp_path, source });
    }

    std::fs::rename(&tmp_path, path).map_err(|source| ExportError::Io { path: path.to_path_buf(), source })
}
