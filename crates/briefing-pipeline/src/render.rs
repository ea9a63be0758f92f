//! Markdown renderer for persisted artifacts.

use std::path::{Path, PathBuf};

use briefing_types::{BriefingError, PersistedArtifact, Result};

/// Writes `{slug}.md` files into the blog's posts directory.
#[derive(Debug, Clone)]
pub struct Renderer {
    posts_dir: PathBuf,
}

impl Renderer {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
        }
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// Where `slug` is rendered to.
    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.posts_dir.join(format!("{slug}.md"))
    }

    /// Render `persisted` to disk and return the written path.
    ///
    /// The file is replaced atomically, so rendering the same artifact twice
    /// leaves one identical file behind.
    pub async fn render(&self, persisted: &PersistedArtifact) -> Result<PathBuf> {
        let Some(slug) = persisted.slug() else {
            return Err(BriefingError::Render {
                path: self.posts_dir.display().to_string(),
                message: format!("artifact {} has no slug", persisted.id),
            });
        };
        let dest = self.path_for(slug);
        let document = render_document(persisted)?;

        write_atomic(&dest, document.as_bytes()).await.map_err(|e| {
            tracing::error!(artifact_id = persisted.id, path = %dest.display(), error = %e, "render failed");
            BriefingError::Render {
                path: dest.display().to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::info!(artifact_id = persisted.id, slug = %slug, path = %dest.display(), "rendered artifact");
        Ok(dest)
    }
}

async fn write_atomic(dest: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("post.md");
    let tmp = parent.join(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Header block, a blank line, then the body verbatim.
pub fn render_document(persisted: &PersistedArtifact) -> Result<String> {
    let artifact = &persisted.artifact;
    let meta = &artifact.metadata;

    let header = [
        ("layout", "post".to_string()),
        ("category", artifact.category.as_str().to_string()),
        ("tags", serde_json::to_string(&artifact.tags)?),
        ("title", quoted(&meta.title)?),
        ("subtitle", quoted(meta.subtitle.as_deref().unwrap_or(""))?),
        ("date", meta.date.format("%Y-%m-%d").to_string()),
        ("author", quoted(&meta.author)?),
        ("image", quoted(meta.image.as_deref().unwrap_or(""))?),
        ("slug", quoted(persisted.slug().unwrap_or(""))?),
        ("description", quoted(&meta.description)?),
    ];

    let mut out = String::with_capacity(artifact.body_content.len() + 512);
    out.push_str("---\n");
    for (key, value) in header {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(&artifact.body_content);
    Ok(out)
}

// JSON string literals are valid double-quoted YAML scalars.
fn quoted(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use briefing_types::{ArtifactMetadata, ArtifactStatus, Category, GeneratedArtifact, Mood, Period};
    use chrono::{TimeZone, Utc};

    fn persisted(slug: Option<&str>) -> PersistedArtifact {
        let date = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        PersistedArtifact {
            id: 3,
            artifact: GeneratedArtifact {
                created_at: date,
                published_at: None,
                body_content: "<h1>Weekly AI News Summary</h1>\n<p>Models said \"hi\".</p>".into(),
                source_document_ids: ["m1".to_string()].into_iter().collect(),
                newsletter_sources: vec!["TLDR".into()],
                derived_word_count: 6,
                generator_model_id: "gpt-4o-mini".into(),
                tokens_consumed: 800,
                rendered_file_path: None,
                status: ArtifactStatus::Draft,
                tags: vec!["AI".into(), "News".into()],
                prompt_text: "prompt".into(),
                category: Category::Ai,
                period: Period::Weekly,
                mood: Mood::Professional,
                metadata: ArtifactMetadata {
                    title: "Weekly AI News Summary".into(),
                    subtitle: Some("Agents: everywhere".into()),
                    description: "A \"big\" week".into(),
                    author: "AI".into(),
                    image: None,
                    date,
                    slug: slug.map(str::to_string),
                },
            },
        }
    }

    #[test]
    fn header_fields_in_order() {
        let doc = render_document(&persisted(Some("weekly-ai-news-3"))).unwrap();
        let expected_header = "---\n\
layout: post\n\
category: AI\n\
tags: [\"AI\",\"News\"]\n\
title: \"Weekly AI News Summary\"\n\
subtitle: \"Agents: everywhere\"\n\
date: 2025-03-02\n\
author: \"AI\"\n\
image: \"\"\n\
slug: \"weekly-ai-news-3\"\n\
description: \"A \\\"big\\\" week\"\n\
---\n\n";
        assert!(doc.starts_with(expected_header), "got:\n{doc}");
        assert!(doc.ends_with("<p>Models said \"hi\".</p>"));
    }

    #[test]
    fn multiline_values_stay_on_one_header_line() {
        let mut artifact = persisted(Some("weekly-ai-news-3"));
        artifact.artifact.metadata.description = "first line\nsecond: line".into();
        let doc = render_document(&artifact).unwrap();

        let header = doc.split("---\n\n").next().unwrap();
        assert_eq!(header.lines().count(), 11);
        assert!(header.contains("description: \"first line\\nsecond: line\"\n"), "got:\n{header}");
    }

    #[tokio::test]
    async fn writes_slug_named_file_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(dir.path().join("_posts"));
        let artifact = persisted(Some("weekly-ai-news-3"));

        let first = renderer.render(&artifact).await.unwrap();
        let contents = std::fs::read_to_string(&first).unwrap();
        let second = renderer.render(&artifact).await.unwrap();

        assert_eq!(first, dir.path().join("_posts/weekly-ai-news-3.md"));
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), contents);
        let entries = std::fs::read_dir(dir.path().join("_posts")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn missing_slug_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(dir.path());
        let err = renderer.render(&persisted(None)).await.unwrap_err();
        assert!(matches!(err, BriefingError::Render { .. }));
    }

    #[tokio::test]
    async fn unwritable_destination_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("posts");
        std::fs::write(&blocker, "not a directory").unwrap();

        let renderer = Renderer::new(&blocker);
        let err = renderer.render(&persisted(Some("weekly-ai-news-1"))).await.unwrap_err();
        assert_eq!(err.stage(), "render");
    }
}
