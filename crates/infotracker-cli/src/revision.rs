//! Git revision provider for `diff --base <ref> --head <ref>` (spec.md §6).
//!
//! Reads SQL files out of a git tree object directly via `libgit2`, never
//! touching the working directory or index — no checkout, no stash, the
//! repository is left exactly as the user had it.

use anyhow::{Context, Result};
use git2::{Repository, Tree};
use std::path::{Path, PathBuf};

/// One SQL file's relative path and raw bytes as they existed at a revision.
pub struct RevisionFile {
    pub relative_path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Reads every `*.sql` file under `sql_dir` (relative to the repo root) as
/// it existed at `revision`, by walking that revision's git tree rather than
/// the working directory.
pub fn read_sql_at_revision(repo_path: &Path, revision: &str, sql_dir: &Path) -> Result<Vec<RevisionFile>> {
    let repo = Repository::discover(repo_path).with_context(|| format!("{} is not inside a git repository", repo_path.display()))?;
    let object = repo.revparse_single(revision).with_context(|| format!("unknown revision {revision:?}"))?;
    let commit = object.peel_to_commit().with_context(|| format!("{revision:?} does not resolve to a commit"))?;
    let tree = commit.tree().context("commit has no tree")?;

    let workdir = repo.workdir().context("repository has no working directory")?;
    let sql_dir_relative = sql_dir.strip_prefix(workdir).unwrap_or(sql_dir);

    let subtree = match navigate(&repo, &tree, sql_dir_relative)? {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };

    let mut files = Vec::new();
    collect_sql_files(&repo, &subtree, Path::new(""), &mut files)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn navigate<'repo>(repo: &'repo Repository, tree: &Tree<'repo>, relative: &Path) -> Result<Option<Tree<'repo>>> {
    let mut current = tree.clone();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.is_empty() || name == "." {
            continue;
        }
        let Some(entry) = current.get_name(&name) else {
            return Ok(None);
        };
        let object = entry.to_object(repo).context("failed to resolve tree entry")?;
        let Some(next) = object.as_tree() else {
            return Ok(None);
        };
        current = next.clone();
    }
    Ok(Some(current))
}

fn collect_sql_files(repo: &Repository, tree: &Tree, prefix: &Path, out: &mut Vec<RevisionFile>) -> Result<()> {
    for entry in tree.iter() {
        let name = entry.name().unwrap_or_default().to_string();
        let relative = prefix.join(&name);
        let object = entry.to_object(repo).context("failed to resolve tree entry")?;
        if let Some(subtree) = object.as_tree() {
            collect_sql_files(repo, subtree, &relative, out)?;
        } else if let Some(blob) = object.as_blob() {
            if relative.extension().and_then(|e| e.to_str()) == Some("sql") {
                out.push(RevisionFile { relative_path: relative, bytes: blob.content().to_vec() });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(dir).status().expect("git must be on PATH for this test");
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn reads_sql_files_from_a_commit_without_touching_the_worktree() {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["config", "user.name", "Test"]);
        std::fs::create_dir(dir.path().join("sql")).unwrap();
        std::fs::write(dir.path().join("sql/a.sql"), "CREATE TABLE dbo.A (x INT)").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "initial"]);

        let files = read_sql_at_revision(dir.path(), "HEAD", &dir.path().join("sql")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, PathBuf::from("a.sql"));
        assert!(String::from_utf8_lossy(&files[0].bytes).contains("CREATE TABLE"));
    }
}
