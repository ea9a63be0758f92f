use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use briefing_types::{
    format_slug, slug_counter_key, ArtifactMetadata, ArtifactPatch, ArtifactStatus, BriefingError,
    Category, DocumentState, GeneratedArtifact, Period, PersistedArtifact, Result, SourceDocument,
    StoredDocument,
};

use crate::codec::{
    decode_enum, decode_list, decode_opt_time, decode_set, decode_time, encode_list, encode_path,
    encode_set, encode_time,
};
use crate::counter::{self, AtomicCounter, CREATE_COUNTERS};

const CREATE_DOCUMENTS: &str = r#"
    CREATE TABLE IF NOT EXISTS source_documents (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id    TEXT    NOT NULL UNIQUE,
        sender_name    TEXT    NOT NULL,
        sender_address TEXT    NOT NULL,
        subject        TEXT    NOT NULL,
        received_at    TEXT    NOT NULL,
        body           TEXT    NOT NULL,
        category       TEXT    NOT NULL,
        processed      INTEGER NOT NULL DEFAULT 0,
        recorded_at    TEXT    NOT NULL DEFAULT (datetime('now'))
    )
"#;

const CREATE_ARTIFACTS: &str = r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at          TEXT    NOT NULL,
        published_at        TEXT,
        body_content        TEXT    NOT NULL,
        source_document_ids TEXT    NOT NULL,
        newsletter_sources  TEXT    NOT NULL,
        derived_word_count  INTEGER NOT NULL,
        generator_model_id  TEXT    NOT NULL,
        tokens_consumed     INTEGER NOT NULL,
        rendered_file_path  TEXT,
        status              TEXT    NOT NULL,
        tags                TEXT    NOT NULL,
        prompt_text         TEXT    NOT NULL,
        category            TEXT    NOT NULL,
        period              TEXT    NOT NULL,
        mood                TEXT    NOT NULL,
        title               TEXT    NOT NULL,
        subtitle            TEXT,
        description         TEXT    NOT NULL,
        author              TEXT    NOT NULL,
        image               TEXT,
        date                TEXT    NOT NULL,
        slug                TEXT    UNIQUE
    )
"#;

const SELECT_ARTIFACT: &str = r#"
    SELECT id, created_at, published_at, body_content, source_document_ids,
           newsletter_sources, derived_word_count, generator_model_id,
           tokens_consumed, rendered_file_path, status, tags, prompt_text,
           category, period, mood, title, subtitle, description, author,
           image, date, slug
    FROM artifacts
"#;

/// Durable identity and lifecycle state for documents and artifacts.
pub struct IdentityStore {
    pool: SqlitePool,
    /// External slug counter. `None` uses the `slug_counters` table inside
    /// the persisting transaction.
    counter: Option<Arc<dyn AtomicCounter>>,
}

impl IdentityStore {
    /// Open (creating if needed) the database at `database_url` and run the
    /// idempotent schema setup.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| BriefingError::persistence("connect", e))?
            .create_if_missing(true);

        // Every connection to an in-memory database is its own database, so
        // that single connection must never be closed.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| BriefingError::persistence("connect", e))?;

        Self::from_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for ddl in [CREATE_DOCUMENTS, CREATE_ARTIFACTS, CREATE_COUNTERS] {
            sqlx::query(ddl)
                .execute(&pool)
                .await
                .map_err(|e| BriefingError::persistence("schema", e))?;
        }
        Ok(Self {
            pool,
            counter: None,
        })
    }

    /// Assign slugs from `counter` instead of the database table.
    pub fn with_counter(mut self, counter: Arc<dyn AtomicCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Source documents
    // -----------------------------------------------------------------------

    /// Record a fetched document. Idempotent on `external_id`: a second call
    /// returns the existing row with `newly_recorded == false`.
    pub async fn record_source_document(
        &self,
        doc: &SourceDocument,
        category: Category,
    ) -> Result<StoredDocument> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO source_documents
                (external_id, sender_name, sender_address, subject, received_at, body, category)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.external_id)
        .bind(&doc.sender_name)
        .bind(&doc.sender_address)
        .bind(&doc.subject)
        .bind(encode_time(&doc.received_at))
        .bind(&doc.body)
        .bind(category.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("record_source_document", e))?
        .rows_affected()
            == 1;

        let row = sqlx::query(
            r#"
            SELECT id, external_id, sender_name, sender_address, subject,
                   received_at, body, category, processed
            FROM source_documents
            WHERE external_id = ?
            "#,
        )
        .bind(&doc.external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("record_source_document", e))?;

        let mut stored = document_from_row(&row)?;
        stored.document.state = doc.state;
        stored.newly_recorded = inserted;

        if inserted {
            tracing::debug!(external_id = %doc.external_id, category = %category, "recorded source document");
        }
        Ok(stored)
    }

    /// Flag documents whose artifact reached `MARKDOWN_CREATED`.
    pub async fn mark_documents_processed(&self, external_ids: &[String]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("mark_documents_processed", e))?;

        for id in external_ids {
            sqlx::query("UPDATE source_documents SET processed = 1 WHERE external_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error("mark_documents_processed", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| store_error("mark_documents_processed", e))
    }

    /// The recorded documents an artifact was generated from, in id order.
    pub async fn documents_for_artifact(&self, artifact_id: i64) -> Result<Vec<StoredDocument>> {
        let artifact = self.get_artifact(artifact_id).await?;

        let mut documents = Vec::new();
        for external_id in &artifact.artifact.source_document_ids {
            let row = sqlx::query(
                r#"
                SELECT id, external_id, sender_name, sender_address, subject,
                       received_at, body, category, processed
                FROM source_documents
                WHERE external_id = ?
                "#,
            )
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("documents_for_artifact", e))?;

            if let Some(row) = row {
                documents.push(document_from_row(&row)?);
            }
        }
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    // -----------------------------------------------------------------------
    // Artifacts
    // -----------------------------------------------------------------------

    /// Give `artifact` its id and then its slug, in one transaction.
    ///
    /// A slug already present on the artifact is kept; otherwise the next
    /// value of the `(category, period)` counter is used. On failure nothing
    /// is written, though an external counter may have advanced.
    pub async fn persist_artifact(&self, artifact: GeneratedArtifact) -> Result<PersistedArtifact> {
        let category = artifact.category;
        let result = self.persist_artifact_tx(artifact).await;
        match &result {
            Ok(persisted) => tracing::info!(
                artifact_id = persisted.id,
                slug = persisted.slug().unwrap_or_default(),
                category = %category,
                "persisted artifact"
            ),
            Err(e) => tracing::error!(category = %category, error = %e, "persisting artifact failed"),
        }
        result
    }

    async fn persist_artifact_tx(&self, mut artifact: GeneratedArtifact) -> Result<PersistedArtifact> {
        if artifact.source_document_ids.is_empty() {
            return Err(BriefingError::persistence(
                "persist_artifact",
                "artifact has no source documents",
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("persist_artifact", e))?;

        let id = insert_artifact(&mut tx, &artifact)
            .await
            .map_err(|e| store_error("persist_artifact", e))?;

        if artifact.metadata.slug.is_none() {
            let key = slug_counter_key(artifact.category, artifact.period);
            let n = match &self.counter {
                Some(counter) => counter.increment(&key).await?,
                None => counter::increment_in(&mut tx, &key)
                    .await
                    .map_err(|e| store_error("persist_artifact", e))?,
            };
            artifact.metadata.slug = Some(format_slug(artifact.category, artifact.period, n));
        }

        sqlx::query("UPDATE artifacts SET slug = ? WHERE id = ?")
            .bind(artifact.metadata.slug.as_deref())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("persist_artifact", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("persist_artifact", e))?;

        Ok(PersistedArtifact { id, artifact })
    }

    pub async fn get_artifact(&self, id: i64) -> Result<PersistedArtifact> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("get_artifact", e))?;
        fetch_artifact(&mut conn, id).await
    }

    /// All artifacts currently in `status`, oldest first.
    pub async fn artifacts_with_status(&self, status: ArtifactStatus) -> Result<Vec<PersistedArtifact>> {
        let rows = sqlx::query(&format!("{SELECT_ARTIFACT} WHERE status = ? ORDER BY id"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("artifacts_with_status", e))?;

        rows.iter().map(artifact_from_row).collect()
    }

    /// Move an artifact along the lifecycle. Re-applying the current status
    /// is a no-op; anything `can_transition_to` rejects fails with
    /// `InvalidTransition` and leaves the row untouched.
    pub async fn update_artifact_status(&self, id: i64, status: ArtifactStatus) -> Result<PersistedArtifact> {
        self.update_artifact(
            id,
            ArtifactPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// The one backwards move: return an artifact to `DRAFT` and forget its
    /// rendered file. Terminal artifacts cannot be reset.
    pub async fn reset_artifact_to_draft(&self, id: i64) -> Result<PersistedArtifact> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("reset_artifact_to_draft", e))?;

        let mut current = fetch_artifact(&mut tx, id).await?;
        let from = current.artifact.status;
        if from.is_terminal() {
            return Err(BriefingError::InvalidTransition {
                id,
                from,
                to: ArtifactStatus::Draft,
            });
        }

        sqlx::query("UPDATE artifacts SET status = ?, rendered_file_path = NULL WHERE id = ?")
            .bind(ArtifactStatus::Draft.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("reset_artifact_to_draft", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("reset_artifact_to_draft", e))?;

        tracing::warn!(artifact_id = id, from = %from, "artifact reset to DRAFT");
        current.artifact.status = ArtifactStatus::Draft;
        current.artifact.rendered_file_path = None;
        Ok(current)
    }

    /// Merge `patch` into the stored artifact field by field and write it back
    /// in one transaction. Fields the patch leaves `None` keep their stored
    /// value, and a slug that is already set is never replaced.
    pub async fn update_artifact(&self, id: i64, patch: ArtifactPatch) -> Result<PersistedArtifact> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("update_artifact", e))?;

        let mut current = fetch_artifact(&mut tx, id).await?;

        if let Some(next) = patch.status {
            let from = current.artifact.status;
            if !from.can_transition_to(next) {
                tracing::warn!(artifact_id = id, from = %from, to = %next, "rejected status change");
                return Err(BriefingError::InvalidTransition { id, from, to: next });
            }
        }

        patch.apply(&mut current.artifact);
        write_artifact(&mut tx, &current)
            .await
            .map_err(|e| store_error("update_artifact", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("update_artifact", e))?;

        tracing::debug!(artifact_id = id, status = %current.artifact.status, "updated artifact");
        Ok(current)
    }

    /// Current value of the slug counter for `(category, period)`.
    pub async fn slug_counter(&self, category: Category, period: Period) -> Result<u64> {
        let key = slug_counter_key(category, period);
        match &self.counter {
            Some(counter) => counter.load(&key).await,
            None => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(|e| store_error("slug_counter", e))?;
                counter::load_in(&mut conn, &key)
                    .await
                    .map_err(|e| store_error("slug_counter", e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn store_error(operation: &'static str, e: sqlx::Error) -> BriefingError {
    tracing::error!(operation, error = %e, "store operation failed");
    BriefingError::persistence(operation, e)
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| BriefingError::persistence("decode", format!("column {name}: {e}")))
}

fn document_from_row(row: &SqliteRow) -> Result<StoredDocument> {
    let received_at: String = column(row, "received_at")?;
    let category: String = column(row, "category")?;
    let processed: i64 = column(row, "processed")?;

    Ok(StoredDocument {
        id: column(row, "id")?,
        document: SourceDocument {
            external_id: column(row, "external_id")?,
            sender_name: column(row, "sender_name")?,
            sender_address: column(row, "sender_address")?,
            subject: column(row, "subject")?,
            received_at: decode_time("received_at", &received_at)?,
            body: column(row, "body")?,
            state: DocumentState::Unread,
        },
        category: decode_enum("category", &category)?,
        processed: processed != 0,
        newly_recorded: false,
    })
}

fn artifact_from_row(row: &SqliteRow) -> Result<PersistedArtifact> {
    let created_at: String = column(row, "created_at")?;
    let published_at: Option<String> = column(row, "published_at")?;
    let source_ids: String = column(row, "source_document_ids")?;
    let sources: String = column(row, "newsletter_sources")?;
    let tags: String = column(row, "tags")?;
    let status: String = column(row, "status")?;
    let category: String = column(row, "category")?;
    let period: String = column(row, "period")?;
    let mood: String = column(row, "mood")?;
    let date: String = column(row, "date")?;
    let word_count: i64 = column(row, "derived_word_count")?;
    let tokens: i64 = column(row, "tokens_consumed")?;
    let rendered: Option<String> = column(row, "rendered_file_path")?;

    Ok(PersistedArtifact {
        id: column(row, "id")?,
        artifact: GeneratedArtifact {
            created_at: decode_time("created_at", &created_at)?,
            published_at: decode_opt_time("published_at", published_at)?,
            body_content: column(row, "body_content")?,
            source_document_ids: decode_set("source_document_ids", &source_ids)?,
            newsletter_sources: decode_list("newsletter_sources", &sources)?,
            derived_word_count: word_count as u64,
            generator_model_id: column(row, "generator_model_id")?,
            tokens_consumed: tokens as u64,
            rendered_file_path: rendered.map(PathBuf::from),
            status: decode_enum("status", &status)?,
            tags: decode_list("tags", &tags)?,
            prompt_text: column(row, "prompt_text")?,
            category: decode_enum("category", &category)?,
            period: decode_enum("period", &period)?,
            mood: decode_enum("mood", &mood)?,
            metadata: ArtifactMetadata {
                title: column(row, "title")?,
                subtitle: column(row, "subtitle")?,
                description: column(row, "description")?,
                author: column(row, "author")?,
                image: column(row, "image")?,
                date: decode_time("date", &date)?,
                slug: column(row, "slug")?,
            },
        },
    })
}

async fn fetch_artifact(conn: &mut SqliteConnection, id: i64) -> Result<PersistedArtifact> {
    let row = sqlx::query(&format!("{SELECT_ARTIFACT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_error("get_artifact", e))?;

    match row {
        Some(row) => artifact_from_row(&row),
        None => Err(BriefingError::persistence(
            "get_artifact",
            format!("no artifact with id {id}"),
        )),
    }
}

async fn insert_artifact(
    conn: &mut SqliteConnection,
    artifact: &GeneratedArtifact,
) -> std::result::Result<i64, sqlx::Error> {
    let meta = &artifact.metadata;
    let result = sqlx::query(
        r#"
        INSERT INTO artifacts (
            created_at, published_at, body_content, source_document_ids,
            newsletter_sources, derived_word_count, generator_model_id,
            tokens_consumed, rendered_file_path, status, tags, prompt_text,
            category, period, mood, title, subtitle, description, author,
            image, date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(encode_time(&artifact.created_at))
    .bind(artifact.published_at.as_ref().map(encode_time))
    .bind(&artifact.body_content)
    .bind(encode_set(&artifact.source_document_ids))
    .bind(encode_list(&artifact.newsletter_sources))
    .bind(artifact.derived_word_count as i64)
    .bind(&artifact.generator_model_id)
    .bind(artifact.tokens_consumed as i64)
    .bind(encode_path(&artifact.rendered_file_path))
    .bind(artifact.status.as_str())
    .bind(encode_list(&artifact.tags))
    .bind(&artifact.prompt_text)
    .bind(artifact.category.as_str())
    .bind(artifact.period.label())
    .bind(artifact.mood.as_str())
    .bind(&meta.title)
    .bind(meta.subtitle.as_deref())
    .bind(&meta.description)
    .bind(&meta.author)
    .bind(meta.image.as_deref())
    .bind(encode_time(&meta.date))
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Write back every mutable column of a persisted artifact.
async fn write_artifact(
    conn: &mut SqliteConnection,
    persisted: &PersistedArtifact,
) -> std::result::Result<(), sqlx::Error> {
    let artifact = &persisted.artifact;
    let meta = &artifact.metadata;
    sqlx::query(
        r#"
        UPDATE artifacts SET
            published_at = ?, body_content = ?, rendered_file_path = ?,
            status = ?, tags = ?, title = ?, subtitle = ?, description = ?,
            author = ?, image = ?, date = ?, slug = ?
        WHERE id = ?
        "#,
    )
    .bind(artifact.published_at.as_ref().map(encode_time))
    .bind(&artifact.body_content)
    .bind(encode_path(&artifact.rendered_file_path))
    .bind(artifact.status.as_str())
    .bind(encode_list(&artifact.tags))
    .bind(&meta.title)
    .bind(meta.subtitle.as_deref())
    .bind(&meta.description)
    .bind(&meta.author)
    .bind(meta.image.as_deref())
    .bind(encode_time(&meta.date))
    .bind(meta.slug.as_deref())
    .bind(persisted.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::FileCounter;
    use briefing_types::{MetadataPatch, Mood};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn document(id: &str) -> SourceDocument {
        SourceDocument {
            external_id: id.into(),
            sender_name: "TLDR AI".into(),
            sender_address: "dan@tldrnewsletter.com".into(),
            subject: format!("Issue {id}"),
            received_at: Utc::now(),
            body: "OpenAI shipped a model.".into(),
            state: DocumentState::Unread,
        }
    }

    fn artifact(ids: &[&str]) -> GeneratedArtifact {
        let now = Utc::now();
        GeneratedArtifact {
            created_at: now,
            published_at: None,
            body_content: "<h2>x</h2>".into(),
            source_document_ids: ids.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            newsletter_sources: vec!["TLDR AI".into(), "Ben's Bites".into(), "TLDR AI".into()],
            derived_word_count: 1,
            generator_model_id: "gpt-4o-mini".into(),
            tokens_consumed: 1052,
            rendered_file_path: None,
            status: ArtifactStatus::Draft,
            tags: vec!["Weekly".into(), "AI".into(), "News".into()],
            prompt_text: "prompt".into(),
            category: Category::Ai,
            period: Period::Weekly,
            mood: Mood::Professional,
            metadata: ArtifactMetadata {
                title: "Weekly AI News Summary".into(),
                subtitle: Some("Models everywhere".into()),
                description: "What happened in AI".into(),
                author: "AI".into(),
                image: None,
                date: now,
                slug: None,
            },
        }
    }

    #[tokio::test]
    async fn record_source_document_is_idempotent() {
        let store = IdentityStore::in_memory().await.unwrap();
        let doc = document("m1");

        let first = store.record_source_document(&doc, Category::Ai).await.unwrap();
        let second = store.record_source_document(&doc, Category::Ai).await.unwrap();

        assert!(first.newly_recorded);
        assert!(!second.newly_recorded);
        assert_eq!(first.id, second.id);

        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM source_documents")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn persist_assigns_id_then_sequential_slugs() {
        let store = IdentityStore::in_memory().await.unwrap();

        let a = store.persist_artifact(artifact(&["m1"])).await.unwrap();
        let b = store.persist_artifact(artifact(&["m2"])).await.unwrap();
        let mut midweek = artifact(&["m3"]);
        midweek.period = Period::Midweek;
        let c = store.persist_artifact(midweek).await.unwrap();

        assert_eq!(a.slug(), Some("weekly-ai-news-1"));
        assert_eq!(b.slug(), Some("weekly-ai-news-2"));
        assert_eq!(c.slug(), Some("midweek-ai-news-1"));
        assert!(b.id > a.id);
        assert_eq!(a.status(), ArtifactStatus::Draft);
        assert_eq!(store.slug_counter(Category::Ai, Period::Weekly).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn persist_keeps_existing_slug() {
        let store = IdentityStore::in_memory().await.unwrap();
        let mut pre_slugged = artifact(&["m1"]);
        pre_slugged.metadata.slug = Some("weekly-ai-news-41".into());

        let persisted = store.persist_artifact(pre_slugged).await.unwrap();
        assert_eq!(persisted.slug(), Some("weekly-ai-news-41"));
        assert_eq!(store.slug_counter(Category::Ai, Period::Weekly).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persist_rejects_artifact_without_sources() {
        let store = IdentityStore::in_memory().await.unwrap();
        let err = store.persist_artifact(artifact(&[])).await.unwrap_err();
        assert!(matches!(err, BriefingError::Persistence { .. }));
        assert!(store
            .artifacts_with_status(ArtifactStatus::Draft)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn persisted_artifact_round_trips() {
        let store = IdentityStore::in_memory().await.unwrap();
        let original = artifact(&["m2", "m1", "m3"]);
        let persisted = store.persist_artifact(original.clone()).await.unwrap();
        let loaded = store.get_artifact(persisted.id).await.unwrap();

        assert_eq!(loaded.artifact.newsletter_sources, original.newsletter_sources);
        assert_eq!(loaded.artifact.tags, original.tags);
        assert_eq!(loaded.artifact.source_document_ids.len(), 3);
        assert_eq!(loaded.artifact.category, Category::Ai);
        assert_eq!(loaded.artifact.mood, Mood::Professional);
        assert_eq!(loaded.artifact.metadata.subtitle.as_deref(), Some("Models everywhere"));
        assert_eq!(loaded.slug(), persisted.slug());
        assert_eq!(loaded.artifact.tokens_consumed, 1052);

        let (raw_status, raw_category): (String, String) =
            sqlx::query_as("SELECT status, category FROM artifacts WHERE id = ?")
                .bind(persisted.id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(raw_status, "DRAFT");
        assert_eq!(raw_category, "AI");
    }

    #[tokio::test]
    async fn status_moves_forward_only() {
        let store = IdentityStore::in_memory().await.unwrap();
        let id = store.persist_artifact(artifact(&["m1"])).await.unwrap().id;

        let err = store
            .update_artifact_status(id, ArtifactStatus::Published)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefingError::InvalidTransition { .. }));

        store
            .update_artifact_status(id, ArtifactStatus::MarkdownCreated)
            .await
            .unwrap();
        // re-applying is fine
        store
            .update_artifact_status(id, ArtifactStatus::MarkdownCreated)
            .await
            .unwrap();

        let err = store
            .update_artifact_status(id, ArtifactStatus::Draft)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BriefingError::InvalidTransition {
                from: ArtifactStatus::MarkdownCreated,
                to: ArtifactStatus::Draft,
                ..
            }
        ));

        let published = store
            .update_artifact_status(id, ArtifactStatus::Published)
            .await
            .unwrap();
        assert_eq!(published.status(), ArtifactStatus::Published);
        assert!(store.reset_artifact_to_draft(id).await.is_err());
    }

    #[tokio::test]
    async fn reset_to_draft_clears_rendered_path() {
        let store = IdentityStore::in_memory().await.unwrap();
        let id = store.persist_artifact(artifact(&["m1"])).await.unwrap().id;
        store
            .update_artifact(
                id,
                ArtifactPatch {
                    status: Some(ArtifactStatus::MarkdownCreated),
                    rendered_file_path: Some(PathBuf::from("_posts/weekly-ai-news-1.md")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reset = store.reset_artifact_to_draft(id).await.unwrap();
        assert_eq!(reset.status(), ArtifactStatus::Draft);
        let loaded = store.get_artifact(id).await.unwrap();
        assert_eq!(loaded.status(), ArtifactStatus::Draft);
        assert!(loaded.artifact.rendered_file_path.is_none());
        assert_eq!(loaded.slug(), Some("weekly-ai-news-1"));
    }

    #[tokio::test]
    async fn update_merges_metadata_and_never_replaces_slug() {
        let store = IdentityStore::in_memory().await.unwrap();
        let id = store.persist_artifact(artifact(&["m1"])).await.unwrap().id;

        let updated = store
            .update_artifact(
                id,
                ArtifactPatch {
                    metadata: MetadataPatch {
                        image: Some("/assets/ai.png".into()),
                        slug: Some("something-else".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.slug(), Some("weekly-ai-news-1"));
        let loaded = store.get_artifact(id).await.unwrap();
        assert_eq!(loaded.artifact.metadata.image.as_deref(), Some("/assets/ai.png"));
        assert_eq!(loaded.artifact.metadata.description, "What happened in AI");
        assert_eq!(loaded.artifact.metadata.subtitle.as_deref(), Some("Models everywhere"));
        assert_eq!(loaded.slug(), Some("weekly-ai-news-1"));
    }

    #[tokio::test]
    async fn processed_flag_and_documents_for_artifact() {
        let store = IdentityStore::in_memory().await.unwrap();
        for id in ["m1", "m2", "m3"] {
            store.record_source_document(&document(id), Category::Ai).await.unwrap();
        }
        let persisted = store.persist_artifact(artifact(&["m1", "m2"])).await.unwrap();
        store
            .mark_documents_processed(&["m1".to_string(), "m2".to_string()])
            .await
            .unwrap();

        let docs = store.documents_for_artifact(persisted.id).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.document.external_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert!(docs.iter().all(|d| d.processed));

        let m3 = store.record_source_document(&document("m3"), Category::Ai).await.unwrap();
        assert!(!m3.processed);
    }

    #[tokio::test]
    async fn artifacts_with_status_filters() {
        let store = IdentityStore::in_memory().await.unwrap();
        let a = store.persist_artifact(artifact(&["m1"])).await.unwrap();
        let b = store.persist_artifact(artifact(&["m2"])).await.unwrap();
        store
            .update_artifact_status(b.id, ArtifactStatus::MarkdownCreated)
            .await
            .unwrap();

        let drafts = store.artifacts_with_status(ArtifactStatus::Draft).await.unwrap();
        let rendered = store
            .artifacts_with_status(ArtifactStatus::MarkdownCreated)
            .await
            .unwrap();
        assert_eq!(drafts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id]);
        assert_eq!(rendered.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id]);
    }

    #[tokio::test]
    async fn external_file_counter_assigns_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(FileCounter::new(dir.path().join("counters.json")));
        let store = IdentityStore::in_memory()
            .await
            .unwrap()
            .with_counter(counter.clone());

        let a = store.persist_artifact(artifact(&["m1"])).await.unwrap();
        let b = store.persist_artifact(artifact(&["m2"])).await.unwrap();
        assert_eq!(a.slug(), Some("weekly-ai-news-1"));
        assert_eq!(b.slug(), Some("weekly-ai-news-2"));
        assert_eq!(counter.load("AI-weekly").await.unwrap(), 2);
    }
}
