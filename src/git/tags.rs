//! Release tag discovery.

use std::collections::HashMap;

use git2::{Oid, Repository};
use semver::Version;
use tracing::{debug, warn};

use crate::error::GitError;

/// A tag and the commit it points at.
#[derive(Debug, Clone)]
pub struct ReleaseTag {
    pub name: String,
    pub commit: Oid,
    pub version: Option<Version>,
}

/// Semver version of a tag name, with or without a leading `v`.
pub fn parse_tag_version(name: &str) -> Option<Version> {
    Version::parse(name.strip_prefix('v').unwrap_or(name)).ok()
}

/// `X.Y.Z` or `vX.Y.Z` with no pre-release or build suffix.
fn is_stable(tag: &ReleaseTag) -> bool {
    tag.version
        .as_ref()
        .is_some_and(|v| v.pre.is_empty() && v.build.is_empty())
}

/// Every tag in the repository, peeled to the commit it names.
pub fn list_tags(repo: &Repository) -> Result<Vec<ReleaseTag>, GitError> {
    let mut tags = Vec::new();

    repo.tag_foreach(|oid, name_bytes| {
        let Ok(full_name) = std::str::from_utf8(name_bytes) else {
            warn!("Skipping tag with OID {} - name is not valid UTF-8", oid);
            return true;
        };
        let name = full_name.strip_prefix("refs/tags/").unwrap_or(full_name);

        // Annotated tags point at a tag object; lightweight ones at the commit.
        let commit = repo.find_tag(oid).map(|t| t.target_id()).unwrap_or(oid);

        tags.push(ReleaseTag {
            name: name.to_string(),
            commit,
            version: parse_tag_version(name),
        });
        true
    })
    .map_err(GitError::RevwalkError)?;

    Ok(tags)
}

/// The newest stable release tag reachable from HEAD.
///
/// Walks history from HEAD and stops at the first commit carrying a stable
/// semver tag, so tags on other branches are never picked up.
pub fn latest_release_tag(repo: &Repository) -> Result<Option<ReleaseTag>, GitError> {
    let Some(head) = repo.head().ok().and_then(|head| head.target()) else {
        return Ok(None);
    };

    let mut by_commit: HashMap<Oid, Vec<ReleaseTag>> = HashMap::new();
    for tag in list_tags(repo)?.into_iter().filter(is_stable) {
        by_commit.entry(tag.commit).or_default().push(tag);
    }
    if by_commit.is_empty() {
        debug!("No stable release tags in repository");
        return Ok(None);
    }

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head).map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
        .map_err(GitError::RevwalkError)?;

    for oid in revwalk {
        let oid = oid.map_err(GitError::RevwalkError)?;
        if let Some(tag) = by_commit
            .remove(&oid)
            .and_then(|tags| tags.into_iter().max_by(|a, b| a.version.cmp(&b.version)))
        {
            debug!(tag = %tag.name, "Found latest reachable release tag");
            return Ok(Some(tag));
        }
    }

    Ok(None)
}
