//! SQL file discovery: walks `sql_dir`, applies `--include`/`--exclude`
//! globs plus a `.infotrackerignore` file, and returns paths relative to
//! `sql_dir` in a stable (sorted) order.
//!
//! Uses `walkdir` paired with `globset`, the standard glob-matching
//! combination for this kind of directory scan.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Builds a matcher: a path is selected if it matches `include` (or there is
/// no include list, meaning "everything") and matches neither `exclude` nor
/// the `.infotrackerignore` patterns.
pub struct FileMatcher {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl FileMatcher {
    pub fn new(include: &[String], exclude: &[String], ignore_patterns: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_glob_set(include)?)
        };
        let mut excludes: Vec<String> = exclude.to_vec();
        excludes.extend(ignore_patterns.iter().cloned());
        Ok(Self { include, exclude: build_glob_set(&excludes)? })
    }

    pub fn matches(&self, relative_path: &Path) -> bool {
        if self.exclude.is_match(relative_path) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(relative_path),
            None => true,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob pattern {pattern:?}"))?);
    }
    builder.build().context("failed to build glob matcher")
}

/// Parses a `.infotrackerignore` file: one glob per line, `#` comments,
/// blank lines skipped.
pub fn load_ignore_file(sql_dir: &Path) -> Result<Vec<String>> {
    let path = sql_dir.join(".infotrackerignore");
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(source).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Walks `sql_dir` for `*.sql` files matching `matcher`, returning paths
/// relative to `sql_dir` in sorted order (so processing order is
/// deterministic before the topological pass reorders it).
pub fn discover_sql_files(sql_dir: &Path, matcher: &FileMatcher) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(sql_dir).into_iter() {
        let entry = entry.context("failed to walk sql_dir")?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let relative = entry.path().strip_prefix(sql_dir).unwrap_or(entry.path()).to_path_buf();
        if matcher.matches(&relative) {
            paths.push(relative);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_sql_files_and_skips_non_sql() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("readme.md"), "hi").unwrap();
        let matcher = FileMatcher::new(&[], &[], &[]).unwrap();
        let files = discover_sql_files(dir.path(), &matcher).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.sql")]);
    }

    #[test]
    fn exclude_glob_filters_matching_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("staging")).unwrap();
        fs::write(dir.path().join("staging/x.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("keep.sql"), "SELECT 1").unwrap();
        let matcher = FileMatcher::new(&[], &["staging/**".to_string()], &[]).unwrap();
        let files = discover_sql_files(dir.path(), &matcher).unwrap();
        assert_eq!(files, vec![PathBuf::from("keep.sql")]);
    }

    #[test]
    fn ignore_file_patterns_parse_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".infotrackerignore"), "# comment\n\nlegacy/**\n").unwrap();
        let patterns = load_ignore_file(dir.path()).unwrap();
        assert_eq!(patterns, vec!["legacy/**".to_string()]);
    }
}
