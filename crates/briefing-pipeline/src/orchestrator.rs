//! Pipeline orchestrator: one batch per category, then one publication for
//! everything the run rendered.
//!
//! A batch claims its documents by flipping their external state to `READ`.
//! Until its artifact reaches `MARKDOWN_CREATED`, any failure restores every
//! claimed document to the state it had before the run, so the next run
//! sees the same input again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use briefing_feed::{QueryWindow, SourceFeed};
use briefing_publish::{MergeResult, PublicationWorkflow};
use briefing_store::IdentityStore;
use briefing_types::{
    active_senders, ArtifactPatch, ArtifactStatus, BriefingError, Category, CategoryOutcome,
    DocumentState, NewsletterSource, OutcomeLabel, Period, PersistedArtifact, Result, RunReport,
    SourceDocument,
};

use crate::events::{EventEmitter, RunEvent};
use crate::generator::ArtifactGenerator;
use crate::render::Renderer;
use crate::retry::{execute_with_retry, BackoffPolicy};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after rendering; nothing is committed or merged.
    pub dry_run: bool,
    /// Extra generation attempts after a retryable service failure.
    pub generation_retries: usize,
    pub backoff: BackoffPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            generation_retries: 1,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// What one category batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub outcome: CategoryOutcome,
    /// The rendered artifact, when the batch got that far.
    pub artifact: Option<PersistedArtifact>,
    /// External ids of the documents the batch claimed.
    pub documents: Vec<String>,
}

impl BatchOutcome {
    fn skipped(outcome: CategoryOutcome) -> Self {
        Self {
            outcome,
            artifact: None,
            documents: Vec::new(),
        }
    }
}

pub struct Orchestrator {
    feed: Arc<dyn SourceFeed>,
    generator: ArtifactGenerator,
    store: Arc<IdentityStore>,
    renderer: Renderer,
    publisher: PublicationWorkflow,
    newsletters: Vec<NewsletterSource>,
    options: RunOptions,
    events: EventEmitter,
}

/// A claimed document and the state to restore on rollback.
struct Claim {
    external_id: String,
    prior: DocumentState,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

impl Orchestrator {
    pub fn new(
        feed: Arc<dyn SourceFeed>,
        generator: ArtifactGenerator,
        store: Arc<IdentityStore>,
        renderer: Renderer,
        publisher: PublicationWorkflow,
        newsletters: Vec<NewsletterSource>,
    ) -> Self {
        Self {
            feed,
            generator,
            store,
            renderer,
            publisher,
            newsletters,
            options: RunOptions::default(),
            events: EventEmitter::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    /// Run every category in `categories`, then publish and merge what was
    /// rendered. Failures are reported per category; the report is returned
    /// even when publication fails.
    pub async fn run(&self, categories: &[Category], period: Period) -> RunReport {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, %period, categories = categories.len(), dry_run = self.options.dry_run, "run started");
        self.events.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
            period,
            categories: categories.to_vec(),
        });

        let mut report = RunReport::new(period);
        let mut ready = self.recover(&mut report).await;

        for &category in categories {
            self.events.emit(RunEvent::BatchStarted { category });
            let batch = self.run_batch(category, period).await;
            if let Some(artifact) = batch.artifact {
                ready.push(artifact);
            }
            report.outcomes.push((category, batch.outcome));
        }

        if self.options.dry_run {
            tracing::info!(rendered = ready.len(), "dry run, skipping publication");
        } else if ready.is_empty() {
            tracing::info!("nothing rendered, skipping publication");
        } else {
            self.publish(&ready, &mut report).await;
        }

        let failed = report.outcomes.iter().filter(|(_, o)| o.is_failure()).count();
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            published = report.published_count(),
            failed,
            duration_ms,
            "run completed"
        );
        self.events.emit(RunEvent::RunCompleted {
            run_id,
            published: report.published_count(),
            failed,
            duration_ms,
        });
        report
    }

    /// Fetch, claim, generate, persist, and render one category.
    pub async fn run_batch(&self, category: Category, period: Period) -> BatchOutcome {
        let senders = active_senders(&self.newsletters, category);
        if senders.is_empty() {
            tracing::info!(%category, "no active newsletters, skipping");
            self.events.emit(RunEvent::BatchSkipped {
                category,
                reason: "no active newsletters".into(),
            });
            return BatchOutcome::skipped(CategoryOutcome::SkippedNoNewsletters);
        }

        let window = QueryWindow::for_period(senders, period);
        let fetched = match self.feed.fetch(&window).await {
            Ok(docs) => docs,
            Err(e) => return self.fail_batch(category, &[], e).await,
        };

        let batch = match self.unprocessed(fetched, category).await {
            Ok(batch) => batch,
            Err(e) => return self.fail_batch(category, &[], e).await,
        };
        if batch.is_empty() {
            tracing::info!(%category, "no unprocessed documents, skipping");
            self.events.emit(RunEvent::BatchSkipped {
                category,
                reason: "no unprocessed documents".into(),
            });
            return BatchOutcome::skipped(CategoryOutcome::SkippedNoEmails);
        }

        let mut claims = Vec::with_capacity(batch.len());
        for doc in &batch {
            if let Err(e) = self.feed.set_state(&doc.external_id, DocumentState::Read).await {
                return self.fail_batch(category, &claims, e).await;
            }
            claims.push(Claim {
                external_id: doc.external_id.clone(),
                prior: doc.state,
            });
        }
        tracing::info!(%category, count = claims.len(), "claimed documents");
        self.events.emit(RunEvent::DocumentsClaimed {
            category,
            count: claims.len(),
        });

        match self.produce(&batch, category, period).await {
            Ok(artifact) => {
                let documents: Vec<String> = claims.into_iter().map(|c| c.external_id).collect();
                self.settle_documents(&documents).await;
                let slug = artifact.slug().unwrap_or_default().to_string();
                BatchOutcome {
                    outcome: CategoryOutcome::Rendered {
                        artifact_id: artifact.id,
                        slug,
                    },
                    artifact: Some(artifact),
                    documents,
                }
            }
            Err(e) => self.fail_batch(category, &claims, e).await,
        }
    }

    // -----------------------------------------------------------------------
    // Batch steps
    // -----------------------------------------------------------------------

    /// Record every fetched document and keep the ones no artifact has
    /// consumed yet. Documents held by an unpublished artifact are left to
    /// recovery; generating them again would duplicate that artifact.
    async fn unprocessed(&self, fetched: Vec<SourceDocument>, category: Category) -> Result<Vec<SourceDocument>> {
        let held = self.held_documents().await?;
        let mut batch = Vec::with_capacity(fetched.len());
        for doc in fetched {
            let stored = self.store.record_source_document(&doc, category).await?;
            if stored.processed {
                tracing::debug!(%category, external_id = %doc.external_id, "already processed");
                continue;
            }
            if held.contains(&doc.external_id) {
                tracing::warn!(%category, external_id = %doc.external_id, "held by an unpublished artifact, awaiting recovery");
                continue;
            }
            batch.push(doc);
        }
        Ok(batch)
    }

    /// Source documents of every artifact that persisted but has not been
    /// published yet.
    async fn held_documents(&self) -> Result<HashSet<String>> {
        let mut held = HashSet::new();
        for status in [ArtifactStatus::Draft, ArtifactStatus::MarkdownCreated] {
            for artifact in self.store.artifacts_with_status(status).await? {
                if status == ArtifactStatus::Draft && artifact.slug().is_none() {
                    continue;
                }
                held.extend(artifact.artifact.source_document_ids);
            }
        }
        Ok(held)
    }

    /// Generate, persist, render, and move the artifact to `MARKDOWN_CREATED`.
    async fn produce(&self, batch: &[SourceDocument], category: Category, period: Period) -> Result<PersistedArtifact> {
        let generator = &self.generator;
        let generated = execute_with_retry(
            move || async move {
                generator
                    .generate(batch, category, period)
                    .await
                    .map_err(BriefingError::from)
            },
            self.options.generation_retries,
            &self.options.backoff,
            "generate",
        )
        .await?;

        let persisted = self.store.persist_artifact(generated).await?;
        self.events.emit(RunEvent::ArtifactPersisted {
            category,
            artifact_id: persisted.id,
            slug: persisted.slug().unwrap_or_default().to_string(),
        });

        self.render(persisted).await
    }

    /// Write the artifact's file and record it. Renders of a `DRAFT` also
    /// advance it to `MARKDOWN_CREATED`.
    async fn render(&self, persisted: PersistedArtifact) -> Result<PersistedArtifact> {
        let path = self.renderer.render(&persisted).await?;
        let updated = self
            .store
            .update_artifact(
                persisted.id,
                ArtifactPatch {
                    rendered_file_path: Some(path.clone()),
                    status: Some(ArtifactStatus::MarkdownCreated),
                    ..Default::default()
                },
            )
            .await?;
        self.events.emit(RunEvent::ArtifactRendered {
            artifact_id: updated.id,
            path: path.display().to_string(),
        });
        Ok(updated)
    }

    /// Mark documents consumed once their artifact is rendered. Past this
    /// point the batch is not rolled back, so failures are only logged.
    async fn settle_documents(&self, external_ids: &[String]) {
        if let Err(e) = self.store.mark_documents_processed(external_ids).await {
            tracing::error!(error = %e, documents = external_ids.len(), "could not mark documents processed");
        }
        if let Err(e) = self.feed.label_outcome(external_ids, OutcomeLabel::Parsed).await {
            tracing::warn!(error = %e, documents = external_ids.len(), "could not label documents parsed");
        }
    }

    async fn fail_batch(&self, category: Category, claims: &[Claim], error: BriefingError) -> BatchOutcome {
        let stage = error.stage().to_string();
        tracing::error!(%category, stage = %stage, error = %error, "batch failed");
        self.events.emit(RunEvent::BatchFailed {
            category,
            stage: stage.clone(),
            error: error.to_string(),
        });

        let restored = self.rollback(category, claims).await;
        if !claims.is_empty() {
            self.events.emit(RunEvent::BatchRolledBack { category, restored });
        }

        BatchOutcome {
            outcome: CategoryOutcome::GenerationFailedRolledBack {
                stage,
                reason: error.to_string(),
            },
            artifact: None,
            documents: claims.iter().map(|c| c.external_id.clone()).collect(),
        }
    }

    /// Restore every claimed document. Returns how many were restored.
    async fn rollback(&self, category: Category, claims: &[Claim]) -> usize {
        let mut restored = 0;
        for claim in claims {
            match self.feed.set_state(&claim.external_id, claim.prior).await {
                Ok(()) => restored += 1,
                Err(e) => tracing::error!(
                    %category,
                    external_id = %claim.external_id,
                    error = %e,
                    "could not restore document state"
                ),
            }
        }
        if !claims.is_empty() {
            tracing::warn!(%category, restored, claimed = claims.len(), "rolled back claimed documents");
        }
        restored
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    /// Artifacts an earlier run left short of publication, made ready again.
    ///
    /// A `DRAFT` that already has its slug failed between persistence and
    /// rendering; it is rendered now and its documents are settled so no
    /// batch regenerates them. A `MARKDOWN_CREATED` artifact is re-rendered
    /// only when its file is gone.
    async fn recover(&self, report: &mut RunReport) -> Vec<PersistedArtifact> {
        let mut ready = Vec::new();

        match self.store.artifacts_with_status(ArtifactStatus::Draft).await {
            Ok(drafts) => {
                for draft in drafts {
                    if draft.slug().is_none() {
                        tracing::warn!(artifact_id = draft.id, "draft without slug, leaving it alone");
                        continue;
                    }
                    let id = draft.id;
                    let documents: Vec<String> = draft.artifact.source_document_ids.iter().cloned().collect();
                    match self.render(draft).await {
                        Ok(rendered) => {
                            self.settle_documents(&documents).await;
                            self.recovered(report, &rendered, ArtifactStatus::Draft);
                            ready.push(rendered);
                        }
                        Err(e) => tracing::error!(artifact_id = id, error = %e, "could not recover draft"),
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "could not list draft artifacts"),
        }

        match self.store.artifacts_with_status(ArtifactStatus::MarkdownCreated).await {
            Ok(pending) => {
                for artifact in pending {
                    let on_disk = match artifact.artifact.rendered_file_path.as_deref() {
                        Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
                        None => false,
                    };
                    if on_disk {
                        self.recovered(report, &artifact, ArtifactStatus::MarkdownCreated);
                        ready.push(artifact);
                        continue;
                    }
                    let id = artifact.id;
                    match self.render(artifact).await {
                        Ok(rendered) => {
                            self.recovered(report, &rendered, ArtifactStatus::MarkdownCreated);
                            ready.push(rendered);
                        }
                        Err(e) => tracing::error!(artifact_id = id, error = %e, "could not re-render artifact"),
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "could not list rendered artifacts"),
        }

        ready
    }

    fn recovered(&self, report: &mut RunReport, artifact: &PersistedArtifact, from: ArtifactStatus) {
        tracing::info!(artifact_id = artifact.id, slug = ?artifact.slug(), from = %from, "carrying artifact forward");
        report.recovered.push(artifact.id);
        self.events.emit(RunEvent::ArtifactRecovered {
            artifact_id: artifact.id,
            from,
        });
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    async fn publish(&self, ready: &[PersistedArtifact], report: &mut RunReport) {
        self.events.emit(RunEvent::PublicationStarted {
            artifacts: ready.len(),
        });

        let publication = match self.publisher.publish_artifacts(ready).await {
            Ok(publication) => publication,
            Err(e) => return self.publication_failed(report, &e),
        };
        let Some(number) = publication.request else {
            let e = BriefingError::publication("publish", "no review request was opened");
            return self.publication_failed(report, &e);
        };
        report.review_request = Some(number);
        self.events.emit(RunEvent::ReviewRequestReady { number });

        match self.publisher.merge(number).await {
            Ok(result) => self.events.emit(RunEvent::Merged {
                number,
                forced: result == MergeResult::ForceMerged,
            }),
            Err(e) => return self.publication_failed(report, &e),
        }

        let committed: HashSet<i64> = publication.committed.iter().copied().collect();
        let published_at = Utc::now();
        for artifact in ready {
            let slug = artifact.slug().unwrap_or_default().to_string();
            if !committed.contains(&artifact.id) {
                set_outcome(
                    report,
                    artifact.id,
                    CategoryOutcome::PublishFailed {
                        artifact_id: artifact.id,
                        slug,
                        reason: "rendered file could not be staged".into(),
                    },
                );
                continue;
            }

            let patch = ArtifactPatch {
                status: Some(ArtifactStatus::Published),
                published_at: Some(published_at),
                ..Default::default()
            };
            if let Err(e) = self.store.update_artifact(artifact.id, patch).await {
                tracing::error!(artifact_id = artifact.id, error = %e, "merged but could not mark published");
                set_outcome(
                    report,
                    artifact.id,
                    CategoryOutcome::PublishFailed {
                        artifact_id: artifact.id,
                        slug,
                        reason: e.to_string(),
                    },
                );
                continue;
            }

            let documents: Vec<String> = artifact.artifact.source_document_ids.iter().cloned().collect();
            if let Err(e) = self.feed.label_outcome(&documents, OutcomeLabel::Published).await {
                tracing::warn!(artifact_id = artifact.id, error = %e, "could not label documents published");
            }
            tracing::info!(artifact_id = artifact.id, slug = %slug, pr = number, "artifact published");
            set_outcome(
                report,
                artifact.id,
                CategoryOutcome::Published {
                    artifact_id: artifact.id,
                    slug,
                },
            );
        }
    }

    /// Every rendered category becomes `PublishFailed`. Artifacts stay in
    /// `MARKDOWN_CREATED` and document states are left as they are.
    fn publication_failed(&self, report: &mut RunReport, error: &BriefingError) {
        tracing::error!(error = %error, "publication failed");
        self.events.emit(RunEvent::PublicationFailed {
            error: error.to_string(),
        });
        for (_, outcome) in report.outcomes.iter_mut() {
            if let CategoryOutcome::Rendered { artifact_id, slug } = outcome {
                *outcome = CategoryOutcome::PublishFailed {
                    artifact_id: *artifact_id,
                    slug: std::mem::take(slug),
                    reason: error.to_string(),
                };
            }
        }
    }
}

/// Replace the outcome of the category that produced `artifact_id`.
/// Recovered artifacts have no entry and are left out.
fn set_outcome(report: &mut RunReport, artifact_id: i64, outcome: CategoryOutcome) {
    if let Some((_, slot)) = report
        .outcomes
        .iter_mut()
        .find(|(_, o)| o.artifact_id() == Some(artifact_id))
    {
        *slot = outcome;
    }
}
