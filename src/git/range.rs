//! Resolution of the starting point for a diff.

use git2::{Oid, Repository};
use tracing::{debug, warn};

use crate::error::GitError;

use super::tags::latest_release_tag;

/// Where the diff starts, and how that point was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinceRef {
    pub commit: Oid,
    /// The user's ref, the tag name, or `"root"`.
    pub label: String,
}

/// Resolve `since` to a commit.
///
/// Without an explicit ref the newest stable release tag reachable from HEAD
/// is used, and failing that the repository's root commit.
pub fn resolve_since(repo: &Repository, since: Option<&str>) -> Result<SinceRef, GitError> {
    if let Some(reference) = since {
        return Ok(SinceRef {
            commit: resolve_reference(repo, reference)?,
            label: reference.to_string(),
        });
    }

    if let Some(tag) = latest_release_tag(repo)? {
        return Ok(SinceRef {
            commit: tag.commit,
            label: tag.name,
        });
    }

    debug!("No release tag found, diffing from the root commit");
    Ok(SinceRef {
        commit: find_root_commit(repo)?,
        label: "root".to_string(),
    })
}

/// Resolve a tag, branch or commit hash to a commit id.
pub fn resolve_reference(repo: &Repository, reference: &str) -> Result<Oid, GitError> {
    let object = repo
        .revparse_single(reference)
        .map_err(|e| GitError::ReferenceNotFound(reference.to_string(), e))?;
    let commit = object.peel_to_commit().map_err(GitError::ParseCommit)?;
    Ok(commit.id())
}

fn find_root_commit(repo: &Repository) -> Result<Oid, GitError> {
    let head = repo
        .head()
        .map_err(|e| GitError::ReferenceNotFound("HEAD".to_string(), e))?;
    let head_commit = head.peel_to_commit().map_err(GitError::ParseCommit)?;

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk
        .push(head_commit.id())
        .map_err(GitError::RevwalkError)?;

    let mut root = head_commit.id();
    for oid in revwalk {
        match oid {
            Ok(oid) => root = oid,
            Err(e) => warn!("Error during revwalk: {}. Using last valid commit.", e),
        }
    }
    Ok(root)
}
