//! Git operations using git2-rs.

pub mod diff;
pub mod range;
pub mod tags;

pub use diff::{MAX_DIFF_CHARS, collect_diff, diff_to_head};
pub use range::{SinceRef, resolve_reference, resolve_since};
pub use tags::{ReleaseTag, latest_release_tag, list_tags, parse_tag_version};
