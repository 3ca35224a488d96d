//! Diff Parser — classifies file-level changes across a revision range (or between a base
//! revision and the working directory) into add/modify/delete operations, decomposing renames
//! into a delete + an add and copies into an add-only, matching `git diff --name-status`
//! semantics without spawning a `git` subprocess.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// One file-level change, already decomposed: a rename never appears as such, it's a
/// [`FileChange::Deleted`] of the old path plus a [`FileChange::Added`] of the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

/// Diff two revisions named by an opaque `from..to` or `from...to` range (e.g. `"HEAD~5..HEAD"`).
pub fn diff_range(project_root: &Path, range: &str) -> Result<Vec<FileChange>> {
    let repo = git2::Repository::open(project_root).context("failed to open git repository")?;
    let (from, to) = split_range(range)?;
    let from_tree = resolve_tree(&repo, &from)?;
    let to_tree = resolve_tree(&repo, &to)?;
    let mut diff = repo.diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)?;
    diff.find_similar(None)?;
    collect_changes(&diff)
}

/// Diff `base_commit`'s tree against the current working directory, including staged and
/// unstaged changes — for evolve-before-commit workflows.
pub fn diff_workdir(project_root: &Path, base_commit: &str) -> Result<Vec<FileChange>> {
    let repo = git2::Repository::open(project_root).context("failed to open git repository")?;
    let base_tree = resolve_tree(&repo, base_commit)?;
    let mut diff = repo.diff_tree_to_workdir_with_index(Some(&base_tree), None)?;
    diff.find_similar(None)?;
    collect_changes(&diff)
}

/// The current HEAD commit SHA, used to stamp `config.github.commit` after an encode/evolve.
pub fn head_sha(project_root: &Path) -> Result<String> {
    let repo = git2::Repository::open(project_root).context("failed to open git repository")?;
    let head = repo.head()?.peel_to_commit()?;
    Ok(head.id().to_string())
}

fn split_range(range: &str) -> Result<(String, String)> {
    if let Some((from, to)) = range.split_once("...") {
        return Ok((from.to_string(), to.to_string()));
    }
    if let Some((from, to)) = range.split_once("..") {
        return Ok((from.to_string(), to.to_string()));
    }
    anyhow::bail!("revision range `{range}` has no `..`/`...` separator")
}

fn resolve_tree<'repo>(repo: &'repo git2::Repository, revspec: &str) -> Result<git2::Tree<'repo>> {
    let object = repo
        .revparse_single(revspec)
        .with_context(|| format!("failed to resolve revision `{revspec}`"))?;
    let commit = object
        .peel_to_commit()
        .with_context(|| format!("`{revspec}` does not resolve to a commit"))?;
    Ok(commit.tree()?)
}

fn collect_changes(diff: &git2::Diff<'_>) -> Result<Vec<FileChange>> {
    let mut changes = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            match delta.status() {
                git2::Delta::Added | git2::Delta::Copied => {
                    if let Some(path) = delta.new_file().path() {
                        changes.push(FileChange::Added(path.to_path_buf()));
                    }
                }
                git2::Delta::Deleted => {
                    if let Some(path) = delta.old_file().path() {
                        changes.push(FileChange::Deleted(path.to_path_buf()));
                    }
                }
                git2::Delta::Modified => {
                    if let Some(path) = delta.new_file().path() {
                        changes.push(FileChange::Modified(path.to_path_buf()));
                    }
                }
                git2::Delta::Renamed => {
                    if let Some(path) = delta.old_file().path() {
                        changes.push(FileChange::Deleted(path.to_path_buf()));
                    }
                    if let Some(path) = delta.new_file().path() {
                        changes.push(FileChange::Added(path.to_path_buf()));
                    }
                }
                _ => {}
            }
            true
        },
        None,
        None,
        None,
    )?;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn commit_all(repo: &git2::Repository, message: &str, parent: Option<&git2::Commit<'_>>) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let parents: Vec<&git2::Commit<'_>> = parent.into_iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
    }

    #[test]
    fn added_modified_deleted_are_classified_across_two_commits() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("keep.py"), "a = 1\n").unwrap();
        fs::write(tmp.path().join("remove.py"), "b = 2\n").unwrap();
        let first = commit_all(&repo, "first", None);

        fs::write(tmp.path().join("keep.py"), "a = 2\n").unwrap();
        fs::remove_file(tmp.path().join("remove.py")).unwrap();
        fs::write(tmp.path().join("added.py"), "c = 3\n").unwrap();
        commit_all(&repo, "second", Some(&repo.find_commit(first).unwrap()));

        let changes = diff_range(tmp.path(), &format!("{first}..HEAD")).unwrap();
        assert!(changes.contains(&FileChange::Modified(PathBuf::from("keep.py"))));
        assert!(changes.contains(&FileChange::Deleted(PathBuf::from("remove.py"))));
        assert!(changes.contains(&FileChange::Added(PathBuf::from("added.py"))));
    }

    #[test]
    fn workdir_diff_sees_uncommitted_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();
        let base = commit_all(&repo, "base", None);

        fs::write(tmp.path().join("a.py"), "x = 2\n").unwrap();
        fs::write(tmp.path().join("untracked.py"), "y = 1\n").unwrap();

        let changes = diff_workdir(tmp.path(), &base.to_string()).unwrap();
        assert!(changes.contains(&FileChange::Modified(PathBuf::from("a.py"))));
        assert!(changes.contains(&FileChange::Added(PathBuf::from("untracked.py"))));
    }

    #[test]
    fn head_sha_matches_the_latest_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();
        let oid = commit_all(&repo, "only commit", None);

        assert_eq!(head_sha(tmp.path()).unwrap(), oid.to_string());
    }

    #[test]
    fn malformed_range_without_separator_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        assert!(diff_range(tmp.path(), "not-a-range").is_err());
    }
}
