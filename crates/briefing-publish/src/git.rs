use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use briefing_types::{BriefingError, Result};

use crate::vcs::{ConflictSide, GitOutcome, VersionControl};

/// [`VersionControl`] backed by the `git` executable, run in the blog
/// repository's working copy.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    program: String,
    identity: Option<(String, String)>,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: "git".to_string(),
            identity: None,
        }
    }

    /// Author and committer used for commits made by the workflow.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    async fn run(&self, args: &[&str]) -> Result<GitOutcome> {
        let mut cmd = tokio::process::Command::new(&self.program);
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={name}"))
                .arg("-c")
                .arg(format!("user.email={email}"));
        }
        cmd.args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            BriefingError::publication("git", format!("could not run git {}: {e}", args.join(" ")))
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr.trim());
        }

        if output.status.success() {
            tracing::debug!(args = %args.join(" "), "git ok");
            Ok(GitOutcome::success(text))
        } else {
            tracing::warn!(args = %args.join(" "), output = %text, "git failed");
            Ok(GitOutcome::failure(text))
        }
    }

    /// Run a verb that may leave unmerged paths and attach them to the outcome.
    async fn run_merging(&self, args: &[&str]) -> Result<GitOutcome> {
        let mut outcome = self.run(args).await?;
        if !outcome.ok {
            outcome.conflicted = self.unmerged_paths().await?;
        }
        Ok(outcome)
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl VersionControl for GitCli {
    async fn has_local_changes(&self) -> Result<bool> {
        let outcome = self.run(&["status", "--porcelain"]).await?;
        if !outcome.ok {
            return Err(BriefingError::publication("status", outcome.output));
        }
        Ok(!outcome.output.trim().is_empty())
    }

    async fn stash(&self) -> Result<GitOutcome> {
        self.run(&["stash", "push", "--include-untracked"]).await
    }

    async fn stash_pop(&self) -> Result<GitOutcome> {
        self.run_merging(&["stash", "pop"]).await
    }

    async fn stash_drop(&self) -> Result<GitOutcome> {
        self.run(&["stash", "drop"]).await
    }

    async fn checkout(&self, branch: &str) -> Result<GitOutcome> {
        self.run(&["checkout", branch]).await
    }

    async fn pull(&self, remote: &str, branch: &str) -> Result<GitOutcome> {
        self.run_merging(&["pull", "--no-rebase", remote, branch]).await
    }

    async fn add(&self, path: &Path) -> Result<GitOutcome> {
        let path = path.to_string_lossy();
        let mut outcome = self.run(&["add", "--", path.as_ref()]).await?;
        if outcome.ok {
            outcome.changed_files = vec![path.into_owned()];
        }
        Ok(outcome)
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<GitOutcome> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        let mut outcome = self.run(&args).await?;
        if outcome.ok {
            let files = self
                .run(&["diff-tree", "--no-commit-id", "--name-only", "-r", "HEAD"])
                .await?;
            outcome.changed_files = lines(&files.output);
        } else {
            outcome.conflicted = self.unmerged_paths().await?;
        }
        Ok(outcome)
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<GitOutcome> {
        self.run(&["push", remote, branch]).await
    }

    async fn merge_preferring(&self, branch: &str) -> Result<GitOutcome> {
        self.run_merging(&["merge", "--no-edit", "--strategy-option=theirs", branch])
            .await
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>> {
        let outcome = self
            .run(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        if !outcome.ok {
            return Err(BriefingError::publication("status", outcome.output));
        }
        Ok(lines(&outcome.output))
    }

    async fn resolve_conflicts(&self, paths: &[String], side: ConflictSide) -> Result<GitOutcome> {
        if paths.is_empty() {
            return Ok(GitOutcome::success(""));
        }

        let mut args = vec!["checkout", side.as_flag(), "--"];
        args.extend(paths.iter().map(String::as_str));
        let checkout = self.run(&args).await?;
        if !checkout.ok {
            return Ok(checkout);
        }

        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        let mut outcome = self.run(&args).await?;
        if outcome.ok {
            outcome.changed_files = paths.to_vec();
        }
        Ok(outcome)
    }
}
