//! Artifact generator: one service call per batch, validated into a draft.

use std::sync::Arc;

use chrono::Utc;
use serde_yaml::Value;

use briefing_feed::strip_markup;
use briefing_llm::{LlmClient, Request};
use briefing_types::{
    ArtifactMetadata, ArtifactStatus, Category, GeneratedArtifact, GenerationError, Mood, Period,
    SourceDocument,
};

use crate::templates::{build_prompt, template_for};

/// Model and header settings applied to every generated artifact.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub model: String,
    pub max_tokens: u32,
    pub author: String,
    pub image: Option<String>,
    pub mood: Mood,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1500,
            author: "AI".to_string(),
            image: None,
            mood: Mood::default(),
        }
    }
}

/// The fields a valid response must provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub subtitle: Option<String>,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
}

pub struct ArtifactGenerator {
    client: Arc<LlmClient>,
    settings: GeneratorSettings,
}

impl ArtifactGenerator {
    pub fn new(client: Arc<LlmClient>, settings: GeneratorSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Turn `batch` into a `DRAFT` artifact. Makes exactly one service call,
    /// never retries, never persists.
    pub async fn generate(
        &self,
        batch: &[SourceDocument],
        category: Category,
        period: Period,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let result = self.generate_inner(batch, category, period).await;
        if let Err(e) = &result {
            tracing::error!(category = %category, documents = batch.len(), error = %e, "generation failed");
        }
        result
    }

    async fn generate_inner(
        &self,
        batch: &[SourceDocument],
        category: Category,
        period: Period,
    ) -> Result<GeneratedArtifact, GenerationError> {
        if batch.is_empty() {
            return Err(GenerationError::Service {
                message: "refusing to generate from an empty batch".into(),
                retryable: false,
            });
        }

        let prompt = build_prompt(batch, category, period, self.settings.mood);
        let request = Request::prompt(&self.settings.model, &prompt).with_max_tokens(self.settings.max_tokens);

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| GenerationError::Service {
                retryable: e.is_retryable(),
                message: e.to_string(),
            })?;

        let parsed = parse_response(&response.text)?;
        let now = Utc::now();
        let model = if response.model.is_empty() {
            self.settings.model.clone()
        } else {
            response.model.clone()
        };
        let tags = if parsed.tags.is_empty() {
            vec![category.as_str().to_string()]
        } else {
            parsed.tags
        };

        tracing::info!(
            category = %category,
            documents = batch.len(),
            tokens = response.usage.total_tokens,
            "generated draft"
        );

        Ok(GeneratedArtifact {
            created_at: now,
            published_at: None,
            derived_word_count: count_words(&parsed.content),
            body_content: parsed.content,
            source_document_ids: batch.iter().map(|d| d.external_id.clone()).collect(),
            newsletter_sources: batch.iter().map(|d| d.sender_name.clone()).collect(),
            generator_model_id: model,
            tokens_consumed: response.usage.total_tokens,
            rendered_file_path: None,
            status: ArtifactStatus::Draft,
            tags,
            prompt_text: prompt,
            category,
            period,
            mood: self.settings.mood,
            metadata: ArtifactMetadata {
                title: template_for(category).title(period),
                subtitle: parsed.subtitle,
                description: parsed.description,
                author: self.settings.author.clone(),
                image: self.settings.image.clone(),
                date: now,
                slug: None,
            },
        })
    }
}

/// Validate a raw service response.
pub fn parse_response(text: &str) -> Result<ParsedResponse, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let body = strip_fences(trimmed);
    if body.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let value: Value = serde_yaml::from_str(body).map_err(|e| GenerationError::MalformedStructure {
        message: e.to_string(),
    })?;
    if !value.is_mapping() {
        return Err(GenerationError::MalformedStructure {
            message: format!("expected a mapping, got {}", kind(&value)),
        });
    }

    let required = |field: &str| -> Result<String, GenerationError> {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::MissingField {
                field: field.to_string(),
            })
    };

    let description = required("description")?;
    let content = required("content")?;
    let subtitle = value
        .get("subtitle")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let tags = value
        .get("tags")
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedResponse {
        subtitle,
        description,
        content,
        tags,
    })
}

/// Drop a surrounding ```` ``` ```` / ```` ```yaml ```` fence.
fn strip_fences(text: &str) -> &str {
    let mut body = text;
    if let Some(rest) = body.strip_prefix("```") {
        // The opening fence runs to the end of its line (language tag).
        body = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Whitespace-separated words of `content` once markup is removed.
pub fn count_words(content: &str) -> u64 {
    strip_markup(content).split_whitespace().count() as u64
}
