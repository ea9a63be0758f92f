use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use briefing_types::{BriefingError, Category, PersistedArtifact, Result};

use crate::host::{Mergeability, ReviewHost};
use crate::vcs::{ConflictSide, GitOutcome, VersionControl};

/// Branches, remote, and timing of the publication workflow.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub remote: String,
    /// Branch the generated posts are committed to.
    pub integration_branch: String,
    /// Production branch the review request targets.
    pub base_branch: String,
    /// How long to wait for a rendered file that is not on disk yet.
    pub missing_file_delay: Duration,
    pub merge_poll_attempts: u32,
    pub merge_poll_interval: Duration,
    pub review_title: String,
    pub review_body: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            integration_branch: "develop".to_string(),
            base_branch: "master".to_string(),
            missing_file_delay: Duration::from_secs(2),
            merge_poll_attempts: 10,
            merge_poll_interval: Duration::from_secs(10),
            review_title: "Automated Blogpost Updates".to_string(),
            review_body: "This PR contains all weekly blogpost updates.".to_string(),
        }
    }
}

/// How a review request ended up merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// Merged through the host.
    Merged,
    /// The host reported conflicts; merged locally preferring the
    /// integration branch and pushed.
    ForceMerged,
}

/// What a `publish_artifacts` call committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub request: Option<u64>,
    /// Artifacts whose rendered file made it into the commit.
    pub committed: Vec<i64>,
    /// Artifacts left out because their rendered file could not be staged.
    pub dropped: Vec<i64>,
}

/// Commits rendered posts to the integration branch, opens or reuses the
/// review request into the base branch, and merges it.
///
/// The workflow owns the working copy for the duration of a call. It leaves
/// it on the integration branch after `publish` and on the base branch after
/// `merge`.
pub struct PublicationWorkflow {
    vcs: Arc<dyn VersionControl>,
    host: Arc<dyn ReviewHost>,
    config: PublishConfig,
}

impl PublicationWorkflow {
    pub fn new(vcs: Arc<dyn VersionControl>, host: Arc<dyn ReviewHost>) -> Self {
        Self {
            vcs,
            host,
            config: PublishConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PublishConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Commit and push `artifacts`, then return the review request that
    /// carries them, or `None` when there was nothing to commit.
    pub async fn publish(&self, artifacts: &[PersistedArtifact]) -> Result<Option<u64>> {
        Ok(self.publish_artifacts(artifacts).await?.request)
    }

    /// Like [`publish`](Self::publish), also reporting which artifacts were
    /// committed and which were dropped.
    pub async fn publish_artifacts(&self, artifacts: &[PersistedArtifact]) -> Result<Publication> {
        self.sync_integration().await?;

        if artifacts.is_empty() {
            tracing::info!("no rendered artifacts, nothing to publish");
            return Ok(Publication::default());
        }

        let mut publication = Publication::default();
        for persisted in artifacts {
            if self.stage(persisted).await? {
                publication.committed.push(persisted.id);
            } else {
                publication.dropped.push(persisted.id);
            }
        }

        let message = commit_message(artifacts);
        require(self.vcs.commit(&message, true).await?, "commit")?;
        tracing::info!(
            committed = publication.committed.len(),
            dropped = publication.dropped.len(),
            %message,
            "committed rendered artifacts"
        );

        let cfg = &self.config;
        require(
            self.vcs.push(&cfg.remote, &cfg.integration_branch).await?,
            "push",
        )?;

        self.sync_base().await?;
        require(self.vcs.checkout(&cfg.integration_branch).await?, "checkout")?;

        let number = match self
            .host
            .find_open_request(&cfg.integration_branch, &cfg.base_branch)
            .await?
        {
            Some(number) => {
                tracing::info!(pr = number, "reusing open review request");
                number
            }
            None => {
                self.host
                    .open_request(
                        &cfg.integration_branch,
                        &cfg.base_branch,
                        &cfg.review_title,
                        &cfg.review_body,
                    )
                    .await?
            }
        };

        publication.request = Some(number);
        Ok(publication)
    }

    /// Merge review request `number`, polling the host until it has computed
    /// mergeability.
    pub async fn merge(&self, number: u64) -> Result<MergeResult> {
        let cfg = &self.config;
        for attempt in 1..=cfg.merge_poll_attempts {
            match self.host.mergeability(number).await? {
                Mergeability::Clean => {
                    self.host
                        .merge(number, &format!("Auto-merging PR #{number}"))
                        .await?;
                    tracing::info!(pr = number, "review request merged");
                    self.refresh_base().await?;
                    return Ok(MergeResult::Merged);
                }
                Mergeability::Dirty => {
                    tracing::warn!(pr = number, "review request conflicts with base, force-merging");
                    self.force_merge().await?;
                    return Ok(MergeResult::ForceMerged);
                }
                Mergeability::Pending { state } => {
                    tracing::info!(pr = number, attempt, %state, "waiting for mergeability");
                    if attempt < cfg.merge_poll_attempts {
                        tokio::time::sleep(cfg.merge_poll_interval).await;
                    }
                }
            }
        }

        Err(BriefingError::publication(
            "merge",
            format!(
                "mergeability of #{number} unresolved after {} attempts",
                cfg.merge_poll_attempts
            ),
        ))
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Switch to the integration branch and bring it up to date, carrying any
    /// local drift across the switch. The remote wins every conflict.
    async fn sync_integration(&self) -> Result<()> {
        let cfg = &self.config;

        let stashed = if self.vcs.has_local_changes().await? {
            tracing::info!("stashing local changes before switching branches");
            require(self.vcs.stash().await?, "sync")?;
            true
        } else {
            false
        };

        require(self.vcs.checkout(&cfg.integration_branch).await?, "sync")?;
        self.pull_preferring_remote(&cfg.integration_branch, "sync").await?;

        if stashed {
            let pop = self.vcs.stash_pop().await?;
            if pop.has_conflicts() {
                tracing::warn!(files = ?pop.conflicted, "stash restore conflicted, keeping remote versions");
                require(
                    self.vcs
                        .resolve_conflicts(&pop.conflicted, ConflictSide::Ours)
                        .await?,
                    "sync",
                )?;
                require(self.vcs.stash_drop().await?, "sync")?;
            } else {
                require(pop, "sync")?;
            }
        }
        Ok(())
    }

    /// Stage the rendered file of `persisted`. Returns `false` when the file
    /// cannot be staged; the artifact is then left out of the commit.
    async fn stage(&self, persisted: &PersistedArtifact) -> Result<bool> {
        let Some(path) = persisted.artifact.rendered_file_path.as_deref() else {
            tracing::error!(artifact_id = persisted.id, "artifact has no rendered file");
            return Ok(false);
        };

        if !exists(path).await {
            tracing::warn!(artifact_id = persisted.id, path = %path.display(), "rendered file missing, waiting");
            tokio::time::sleep(self.config.missing_file_delay).await;
            if !exists(path).await {
                tracing::error!(artifact_id = persisted.id, path = %path.display(), "rendered file still missing");
                return Ok(false);
            }
        }

        let outcome = self.vcs.add(path).await?;
        if !outcome.ok {
            tracing::error!(artifact_id = persisted.id, output = %outcome.output, "staging failed");
        }
        Ok(outcome.ok)
    }

    async fn sync_base(&self) -> Result<()> {
        let cfg = &self.config;
        require(self.vcs.checkout(&cfg.base_branch).await?, "sync_base")?;
        self.pull_preferring_remote(&cfg.base_branch, "sync_base").await
    }

    /// After a host-side merge the local base branch is behind; failing to
    /// catch up does not undo the merge.
    async fn refresh_base(&self) -> Result<()> {
        if let Err(e) = self.sync_base().await {
            tracing::warn!(error = %e, "could not refresh base branch after merge");
        }
        Ok(())
    }

    async fn force_merge(&self) -> Result<()> {
        let cfg = &self.config;
        self.sync_base().await?;

        let merge = self.vcs.merge_preferring(&cfg.integration_branch).await?;
        if merge.has_conflicts() {
            self.resolve_and_commit(&merge.conflicted, ConflictSide::Theirs, "force_merge")
                .await?;
        } else {
            require(merge, "force_merge")?;
        }

        require(self.vcs.push(&cfg.remote, &cfg.base_branch).await?, "force_merge")?;
        tracing::info!(
            integration = %cfg.integration_branch,
            base = %cfg.base_branch,
            "force-merged and pushed"
        );
        Ok(())
    }

    async fn pull_preferring_remote(&self, branch: &str, stage: &str) -> Result<()> {
        let pull = self.vcs.pull(&self.config.remote, branch).await?;
        if pull.has_conflicts() {
            tracing::warn!(branch, files = ?pull.conflicted, "pull conflicted, keeping remote versions");
            self.resolve_and_commit(&pull.conflicted, ConflictSide::Theirs, stage)
                .await
        } else {
            require(pull, stage).map(|_| ())
        }
    }

    async fn resolve_and_commit(&self, paths: &[String], side: ConflictSide, stage: &str) -> Result<()> {
        require(self.vcs.resolve_conflicts(paths, side).await?, stage)?;
        require(
            self.vcs.commit("Auto-resolved merge conflicts", false).await?,
            stage,
        )?;
        Ok(())
    }
}

fn require(outcome: GitOutcome, stage: &str) -> Result<GitOutcome> {
    if outcome.ok {
        Ok(outcome)
    } else {
        Err(BriefingError::publication(stage, outcome.output))
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// `Publish AI, TECH Weekly Blogposts`: distinct categories in batch order.
fn commit_message(artifacts: &[PersistedArtifact]) -> String {
    let mut categories: Vec<Category> = Vec::new();
    for persisted in artifacts {
        if !categories.contains(&persisted.category()) {
            categories.push(persisted.category());
        }
    }
    let subjects = categories
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let period = artifacts
        .first()
        .map(|p| p.artifact.period.label())
        .unwrap_or("weekly");
    let mut label = period.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    format!("Publish {subjects} {label} Blogposts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use briefing_types::{ArtifactMetadata, ArtifactStatus, GeneratedArtifact, Mood, Period};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Mocks
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct MockVcs {
        calls: Mutex<Vec<String>>,
        local_changes: bool,
        pop_conflicts: Vec<String>,
        base_pull_conflicts: Vec<String>,
        fail_push: bool,
    }

    impl MockVcs {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn current_branch(&self) -> Option<String> {
            self.calls()
                .iter()
                .rev()
                .find_map(|c| c.strip_prefix("checkout ").map(String::from))
        }
    }

    #[async_trait]
    impl VersionControl for MockVcs {
        async fn has_local_changes(&self) -> Result<bool> {
            Ok(self.local_changes)
        }
        async fn stash(&self) -> Result<GitOutcome> {
            self.record("stash".into());
            Ok(GitOutcome::success(""))
        }
        async fn stash_pop(&self) -> Result<GitOutcome> {
            self.record("stash pop".into());
            if self.pop_conflicts.is_empty() {
                Ok(GitOutcome::success(""))
            } else {
                Ok(GitOutcome {
                    conflicted: self.pop_conflicts.clone(),
                    ..GitOutcome::failure("CONFLICT")
                })
            }
        }
        async fn stash_drop(&self) -> Result<GitOutcome> {
            self.record("stash drop".into());
            Ok(GitOutcome::success(""))
        }
        async fn checkout(&self, branch: &str) -> Result<GitOutcome> {
            self.record(format!("checkout {branch}"));
            Ok(GitOutcome::success(""))
        }
        async fn pull(&self, remote: &str, branch: &str) -> Result<GitOutcome> {
            self.record(format!("pull {remote} {branch}"));
            if branch == "master" && !self.base_pull_conflicts.is_empty() {
                return Ok(GitOutcome {
                    conflicted: self.base_pull_conflicts.clone(),
                    ..GitOutcome::failure("CONFLICT")
                });
            }
            Ok(GitOutcome::success(""))
        }
        async fn add(&self, path: &Path) -> Result<GitOutcome> {
            self.record(format!("add {}", path.display()));
            Ok(GitOutcome::success(""))
        }
        async fn commit(&self, message: &str, allow_empty: bool) -> Result<GitOutcome> {
            self.record(format!("commit[{allow_empty}] {message}"));
            Ok(GitOutcome::success(""))
        }
        async fn push(&self, remote: &str, branch: &str) -> Result<GitOutcome> {
            self.record(format!("push {remote} {branch}"));
            if self.fail_push {
                return Ok(GitOutcome::failure("rejected"));
            }
            Ok(GitOutcome::success(""))
        }
        async fn merge_preferring(&self, branch: &str) -> Result<GitOutcome> {
            self.record(format!("merge {branch}"));
            Ok(GitOutcome::success(""))
        }
        async fn unmerged_paths(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn resolve_conflicts(&self, paths: &[String], side: ConflictSide) -> Result<GitOutcome> {
            self.record(format!("resolve {} {}", side.as_flag(), paths.join(",")));
            Ok(GitOutcome::success(""))
        }
    }

    #[derive(Default)]
    struct MockHost {
        existing: Option<u64>,
        states: Mutex<VecDeque<Mergeability>>,
        opened: Mutex<Vec<(String, String, String)>>,
        merged: Mutex<Vec<(u64, String)>>,
        polls: Mutex<u32>,
    }

    #[async_trait]
    impl ReviewHost for MockHost {
        async fn find_open_request(&self, _head: &str, _base: &str) -> Result<Option<u64>> {
            Ok(self.existing)
        }
        async fn open_request(&self, head: &str, base: &str, title: &str, _body: &str) -> Result<u64> {
            self.opened
                .lock()
                .unwrap()
                .push((head.into(), base.into(), title.into()));
            Ok(42)
        }
        async fn mergeability(&self, _number: u64) -> Result<Mergeability> {
            *self.polls.lock().unwrap() += 1;
            Ok(self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Mergeability::Pending {
                    state: "unknown".into(),
                }))
        }
        async fn merge(&self, number: u64, commit_message: &str) -> Result<()> {
            self.merged
                .lock()
                .unwrap()
                .push((number, commit_message.into()));
            Ok(())
        }
    }

    fn artifact(id: i64, category: Category, path: Option<PathBuf>) -> PersistedArtifact {
        let now = chrono::Utc::now();
        PersistedArtifact {
            id,
            artifact: GeneratedArtifact {
                created_at: now,
                published_at: None,
                body_content: "<p>x</p>".into(),
                source_document_ids: ["m1".to_string()].into_iter().collect(),
                newsletter_sources: vec!["TLDR".into()],
                derived_word_count: 1,
                generator_model_id: "gpt-4o-mini".into(),
                tokens_consumed: 10,
                rendered_file_path: path,
                status: ArtifactStatus::MarkdownCreated,
                tags: vec![category.as_str().to_string()],
                prompt_text: "p".into(),
                category,
                period: Period::Weekly,
                mood: Mood::Professional,
                metadata: ArtifactMetadata {
                    title: "t".into(),
                    subtitle: None,
                    description: "d".into(),
                    author: "AI".into(),
                    image: None,
                    date: now,
                    slug: Some(format!("weekly-{}-news-{id}", category.slug_fragment())),
                },
            },
        }
    }

    fn rendered(dir: &Path, id: i64, category: Category) -> PersistedArtifact {
        let path = dir.join(format!("{id}.md"));
        std::fs::write(&path, "---\n---\n").unwrap();
        artifact(id, category, Some(path))
    }

    fn workflow(vcs: Arc<MockVcs>, host: Arc<MockHost>) -> PublicationWorkflow {
        PublicationWorkflow::new(vcs, host).with_config(PublishConfig {
            missing_file_delay: Duration::from_millis(10),
            merge_poll_interval: Duration::from_millis(10),
            merge_poll_attempts: 3,
            ..Default::default()
        })
    }

    // -----------------------------------------------------------------------
    // publish
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn empty_list_commits_nothing() {
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost::default());
        let result = workflow(vcs.clone(), host.clone()).publish(&[]).await.unwrap();

        assert_eq!(result, None);
        assert!(!vcs.calls().iter().any(|c| c.starts_with("commit")));
        assert!(!vcs.calls().iter().any(|c| c.starts_with("push")));
        assert!(host.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_commits_pushes_and_opens_request() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost::default());
        let artifacts = vec![
            rendered(dir.path(), 1, Category::Ai),
            rendered(dir.path(), 2, Category::Tech),
        ];

        let publication = workflow(vcs.clone(), host.clone())
            .publish_artifacts(&artifacts)
            .await
            .unwrap();

        assert_eq!(publication.request, Some(42));
        assert_eq!(publication.committed, vec![1, 2]);
        let calls = vcs.calls();
        assert!(calls.contains(&"commit[true] Publish AI, TECH Weekly Blogposts".to_string()));
        let push = calls.iter().position(|c| c == "push origin develop").unwrap();
        let base = calls.iter().position(|c| c == "checkout master").unwrap();
        assert!(push < base);
        assert_eq!(vcs.current_branch().as_deref(), Some("develop"));
        assert_eq!(
            host.opened.lock().unwrap().as_slice(),
            &[(
                "develop".to_string(),
                "master".to_string(),
                "Automated Blogpost Updates".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn existing_request_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost {
            existing: Some(7),
            ..Default::default()
        });

        let number = workflow(vcs, host.clone())
            .publish(&[rendered(dir.path(), 1, Category::Ai)])
            .await
            .unwrap();
        assert_eq!(number, Some(7));
        assert!(host.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_drops_only_that_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost::default());
        let artifacts = vec![
            rendered(dir.path(), 1, Category::Ai),
            artifact(2, Category::Tech, Some(dir.path().join("never-written.md"))),
        ];

        let publication = workflow(vcs.clone(), host)
            .publish_artifacts(&artifacts)
            .await
            .unwrap();

        assert_eq!(publication.committed, vec![1]);
        assert_eq!(publication.dropped, vec![2]);
        assert_eq!(vcs.calls().iter().filter(|c| c.starts_with("add ")).count(), 1);
        assert!(vcs.calls().iter().any(|c| c.starts_with("commit[true]")));
    }

    #[tokio::test]
    async fn local_drift_is_restored_and_remote_wins_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs {
            local_changes: true,
            pop_conflicts: vec!["_posts/weekly-ai-news-1.md".into()],
            ..Default::default()
        });
        let host = Arc::new(MockHost::default());

        workflow(vcs.clone(), host)
            .publish(&[rendered(dir.path(), 1, Category::Ai)])
            .await
            .unwrap();

        let calls = vcs.calls();
        let stash = calls.iter().position(|c| c == "stash").unwrap();
        let checkout = calls.iter().position(|c| c == "checkout develop").unwrap();
        let pop = calls.iter().position(|c| c == "stash pop").unwrap();
        assert!(stash < checkout && checkout < pop);
        assert!(calls.contains(&"resolve --ours _posts/weekly-ai-news-1.md".to_string()));
        assert!(calls.contains(&"stash drop".to_string()));
    }

    #[tokio::test]
    async fn base_pull_conflict_gets_resolution_commit() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs {
            base_pull_conflicts: vec!["index.md".into()],
            ..Default::default()
        });
        let host = Arc::new(MockHost::default());

        workflow(vcs.clone(), host)
            .publish(&[rendered(dir.path(), 1, Category::Ai)])
            .await
            .unwrap();

        let calls = vcs.calls();
        assert!(calls.contains(&"resolve --theirs index.md".to_string()));
        assert!(calls.contains(&"commit[false] Auto-resolved merge conflicts".to_string()));
    }

    #[tokio::test]
    async fn push_failure_is_a_publication_error() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs {
            fail_push: true,
            ..Default::default()
        });
        let host = Arc::new(MockHost::default());

        let err = workflow(vcs, host.clone())
            .publish(&[rendered(dir.path(), 1, Category::Ai)])
            .await
            .unwrap_err();
        assert!(matches!(err, BriefingError::Publication { ref stage, .. } if stage == "push"));
        assert!(host.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn commit_message_lists_distinct_categories() {
        let artifacts = vec![
            artifact(1, Category::Ai, None),
            artifact(2, Category::Ai, None),
            artifact(3, Category::Science, None),
        ];
        assert_eq!(
            commit_message(&artifacts),
            "Publish AI, SCIENCE Weekly Blogposts"
        );
    }

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn clean_request_merges_through_host() {
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost {
            states: Mutex::new(VecDeque::from([
                Mergeability::Pending {
                    state: "unknown".into(),
                },
                Mergeability::Clean,
            ])),
            ..Default::default()
        });

        let result = workflow(vcs.clone(), host.clone()).merge(42).await.unwrap();
        assert_eq!(result, MergeResult::Merged);
        assert_eq!(
            host.merged.lock().unwrap().as_slice(),
            &[(42, "Auto-merging PR #42".to_string())]
        );
        assert_eq!(vcs.current_branch().as_deref(), Some("master"));
    }

    #[tokio::test]
    async fn dirty_request_is_force_merged_locally() {
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost {
            states: Mutex::new(VecDeque::from([Mergeability::Dirty])),
            ..Default::default()
        });

        let result = workflow(vcs.clone(), host.clone()).merge(42).await.unwrap();
        assert_eq!(result, MergeResult::ForceMerged);
        assert!(host.merged.lock().unwrap().is_empty());
        let calls = vcs.calls();
        let merge = calls.iter().position(|c| c == "merge develop").unwrap();
        let push = calls.iter().position(|c| c == "push origin master").unwrap();
        assert!(merge < push);
    }

    #[tokio::test]
    async fn unresolved_mergeability_aborts() {
        let vcs = Arc::new(MockVcs::default());
        let host = Arc::new(MockHost::default());

        let err = workflow(vcs, host.clone()).merge(42).await.unwrap_err();
        assert!(matches!(err, BriefingError::Publication { ref stage, .. } if stage == "merge"));
        assert_eq!(*host.polls.lock().unwrap(), 3);
        assert!(host.merged.lock().unwrap().is_empty());
    }
}
