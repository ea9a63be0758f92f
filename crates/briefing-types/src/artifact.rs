use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BriefingError, Category, Mood, Period};

// ---------------------------------------------------------------------------
// ArtifactStatus: lifecycle state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Draft,
    MarkdownCreated,
    Published,
    Archived,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Draft => "DRAFT",
            ArtifactStatus::MarkdownCreated => "MARKDOWN_CREATED",
            ArtifactStatus::Published => "PUBLISHED",
            ArtifactStatus::Archived => "ARCHIVED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactStatus::Published | ArtifactStatus::Archived)
    }

    /// Whether the automated lifecycle allows moving from `self` to `next`.
    ///
    /// Re-applying the current status is allowed. The only backwards move,
    /// resetting to `DRAFT`, goes through the store's explicit reset and is
    /// not a transition.
    pub fn can_transition_to(&self, next: ArtifactStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self, next) {
            (ArtifactStatus::Draft, ArtifactStatus::MarkdownCreated) => true,
            (ArtifactStatus::MarkdownCreated, ArtifactStatus::Published) => true,
            (current, ArtifactStatus::Archived) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(ArtifactStatus::Draft),
            "MARKDOWN_CREATED" => Ok(ArtifactStatus::MarkdownCreated),
            "PUBLISHED" => Ok(ArtifactStatus::Published),
            "ARCHIVED" => Ok(ArtifactStatus::Archived),
            other => Err(BriefingError::Other(format!("unknown artifact status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact content
// ---------------------------------------------------------------------------

/// Header fields of a blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub author: String,
    pub image: Option<String>,
    pub date: DateTime<Utc>,
    /// Assigned once by the identity store, never reassigned.
    pub slug: Option<String>,
}

/// A generated blog post, before or after persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub body_content: String,
    /// External ids of the documents the artifact was generated from.
    pub source_document_ids: BTreeSet<String>,
    /// Sender names, in batch order.
    pub newsletter_sources: Vec<String>,
    pub derived_word_count: u64,
    pub generator_model_id: String,
    pub tokens_consumed: u64,
    pub rendered_file_path: Option<PathBuf>,
    pub status: ArtifactStatus,
    pub tags: Vec<String>,
    pub prompt_text: String,
    pub category: Category,
    /// Run bucket the artifact was generated for; part of its slug.
    pub period: Period,
    pub mood: Mood,
    pub metadata: ArtifactMetadata,
}

/// A [`GeneratedArtifact`] that has an identity in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArtifact {
    pub id: i64,
    pub artifact: GeneratedArtifact,
}

impl PersistedArtifact {
    pub fn slug(&self) -> Option<&str> {
        self.artifact.metadata.slug.as_deref()
    }

    pub fn status(&self) -> ArtifactStatus {
        self.artifact.status
    }

    pub fn category(&self) -> Category {
        self.artifact.category
    }
}

// ---------------------------------------------------------------------------
// Patches: partial updates merged field by field
// ---------------------------------------------------------------------------

/// Partial update of [`ArtifactMetadata`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub slug: Option<String>,
}

/// Partial update of a persisted artifact. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPatch {
    pub published_at: Option<DateTime<Utc>>,
    pub body_content: Option<String>,
    pub rendered_file_path: Option<PathBuf>,
    pub status: Option<ArtifactStatus>,
    pub tags: Option<Vec<String>>,
    pub metadata: MetadataPatch,
}

impl MetadataPatch {
    pub fn apply(self, metadata: &mut ArtifactMetadata) {
        if let Some(title) = self.title {
            metadata.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            metadata.subtitle = Some(subtitle);
        }
        if let Some(description) = self.description {
            metadata.description = description;
        }
        if let Some(author) = self.author {
            metadata.author = author;
        }
        if let Some(image) = self.image {
            metadata.image = Some(image);
        }
        if let Some(date) = self.date {
            metadata.date = date;
        }
        // A slug is assigned exactly once.
        if metadata.slug.is_none() {
            metadata.slug = self.slug;
        }
    }
}

impl ArtifactPatch {
    /// Merge this patch into `artifact`. Status is copied as-is; callers that
    /// need the lifecycle rules check them before applying.
    pub fn apply(self, artifact: &mut GeneratedArtifact) {
        if let Some(published_at) = self.published_at {
            artifact.published_at = Some(published_at);
        }
        if let Some(body) = self.body_content {
            artifact.body_content = body;
        }
        if let Some(path) = self.rendered_file_path {
            artifact.rendered_file_path = Some(path);
        }
        if let Some(status) = self.status {
            artifact.status = status;
        }
        if let Some(tags) = self.tags {
            artifact.tags = tags;
        }
        self.metadata.apply(&mut artifact.metadata);
    }
}
