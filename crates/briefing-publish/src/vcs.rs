use std::path::Path;

use async_trait::async_trait;

use briefing_types::Result;

/// Structured result of one version-control verb.
///
/// A verb that ran but failed (non-zero exit) is `ok == false`, not an `Err`;
/// `Err` is reserved for not being able to run the verb at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutcome {
    pub ok: bool,
    /// Paths left unmerged by this verb, as reported by git.
    pub conflicted: Vec<String>,
    /// Paths the verb touched, when the verb reports them.
    pub changed_files: Vec<String>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl GitOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicted.is_empty()
    }
}

/// Which side wins when conflicts are resolved mechanically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    /// The checked-out branch (`HEAD`).
    Ours,
    /// The side being merged or applied.
    Theirs,
}

impl ConflictSide {
    pub fn as_flag(&self) -> &'static str {
        match self {
            ConflictSide::Ours => "--ours",
            ConflictSide::Theirs => "--theirs",
        }
    }
}

/// The verbs the publication workflow needs from the blog's working copy.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Whether the working copy has uncommitted or untracked changes.
    async fn has_local_changes(&self) -> Result<bool>;

    /// Stash tracked and untracked changes.
    async fn stash(&self) -> Result<GitOutcome>;

    /// Re-apply the latest stash. Conflicts are reported, not resolved.
    async fn stash_pop(&self) -> Result<GitOutcome>;

    async fn stash_drop(&self) -> Result<GitOutcome>;

    async fn checkout(&self, branch: &str) -> Result<GitOutcome>;

    async fn pull(&self, remote: &str, branch: &str) -> Result<GitOutcome>;

    async fn add(&self, path: &Path) -> Result<GitOutcome>;

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<GitOutcome>;

    async fn push(&self, remote: &str, branch: &str) -> Result<GitOutcome>;

    /// Merge `branch` into the current branch, preferring `branch` on
    /// conflicting hunks.
    async fn merge_preferring(&self, branch: &str) -> Result<GitOutcome>;

    /// Paths currently unmerged.
    async fn unmerged_paths(&self) -> Result<Vec<String>>;

    /// Take `side` for every path in `paths` and stage the result.
    async fn resolve_conflicts(&self, paths: &[String], side: ConflictSide) -> Result<GitOutcome>;
}
