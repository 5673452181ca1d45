//! Unified diff from a starting commit to HEAD.

use std::path::Path;

use git2::{DiffFormat, DiffOptions, Oid, Repository};
use tracing::debug;

use crate::error::GitError;

use super::range::resolve_since;

/// Diffs longer than this are cut so the polish prompt stays bounded.
pub const MAX_DIFF_CHARS: usize = 30_000;

const TRUNCATION_MARKER: &str = "\n... (diff truncated)";

/// Unified diff between `from` and HEAD, at most `max_chars` characters
/// plus a truncation marker.
pub fn diff_to_head(repo: &Repository, from: Oid, max_chars: usize) -> Result<String, GitError> {
    let from_tree = repo
        .find_commit(from)
        .and_then(|c| c.tree())
        .map_err(GitError::ParseCommit)?;
    let head_tree = repo
        .head()
        .and_then(|h| h.peel_to_tree())
        .map_err(|e| GitError::ReferenceNotFound("HEAD".to_string(), e))?;

    let mut options = DiffOptions::new();
    options.context_lines(3);
    let diff = repo
        .diff_tree_to_tree(Some(&from_tree), Some(&head_tree), Some(&mut options))
        .map_err(GitError::DiffFailed)?;

    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin());
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(GitError::DiffFailed)?;

    Ok(truncate(patch, max_chars))
}

/// Open the repository containing `path` and diff from `since` (or the
/// latest release tag) to HEAD.
pub fn collect_diff(path: &Path, since: Option<&str>) -> Result<String, GitError> {
    let repo = Repository::discover(path).map_err(GitError::OpenRepository)?;
    let start = resolve_since(&repo, since)?;
    debug!(since = %start.label, "Collecting diff");
    diff_to_head(&repo, start.commit, MAX_DIFF_CHARS)
}

fn truncate(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}
