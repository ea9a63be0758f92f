//! Publication workflow for Briefing.
//!
//! Provides the `VersionControl` trait over the blog's working copy (with a
//! git CLI implementation), the `ReviewHost` trait over the hosting service
//! (with a GitHub REST implementation), and `PublicationWorkflow`, which
//! commits rendered posts, opens or reuses a review request, and merges it.

mod git;
mod host;
mod vcs;
mod workflow;

pub use git::GitCli;
pub use host::{GitHubHost, Mergeability, ReviewHost};
pub use vcs::{ConflictSide, GitOutcome, VersionControl};
pub use workflow::{MergeResult, Publication, PublicationWorkflow, PublishConfig};
