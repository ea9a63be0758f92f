//! TOML configuration for a Briefing deployment.
//!
//! Every section is optional and falls back to defaults. Secrets are never
//! read from the file: API tokens come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use briefing_feed::GmailLabels;
use briefing_publish::PublishConfig;
use briefing_types::{BriefingError, Category, Mood, NewsletterSource, Result};

use crate::generator::GeneratorSettings;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BriefingConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub blog: BlogConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    /// Allowlisted senders.
    #[serde(default = "default_newsletters")]
    pub newsletters: Vec<NewsletterSource>,

    /// Tone of every generated post.
    #[serde(default)]
    pub mood: Mood,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            blog: BlogConfig::default(),
            git: GitConfig::default(),
            feed: FeedConfig::default(),
            newsletters: default_newsletters(),
            mood: Mood::default(),
        }
    }
}

/// Generative service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard timeout on one generation call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a retryable generation failure.
    #[serde(default = "default_generation_retries")]
    pub generation_retries: usize,

    /// Override of the provider endpoint, mainly for self-hosted gateways.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            generation_retries: default_generation_retries(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Keep slug counters in this JSON file instead of the database.
    #[serde(default)]
    pub counter_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            counter_file: None,
        }
    }
}

/// The blog working copy and post headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlogConfig {
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Relative to `repo_path`.
    #[serde(default = "default_posts_dir")]
    pub posts_dir: PathBuf,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default)]
    pub image: Option<String>,
}

impl BlogConfig {
    pub fn posts_path(&self) -> PathBuf {
        self.repo_path.join(&self.posts_dir)
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            posts_dir: default_posts_dir(),
            author: default_author(),
            image: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_integration_branch")]
    pub integration_branch: String,

    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Owner and name of the hosted repository.
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_github_api")]
    pub api_base: String,

    #[serde(default = "default_missing_file_delay_ms")]
    pub missing_file_delay_ms: u64,

    #[serde(default = "default_merge_poll_attempts")]
    pub merge_poll_attempts: u32,

    #[serde(default = "default_merge_poll_interval_ms")]
    pub merge_poll_interval_ms: u64,

    /// Commit identity; the working copy's own config is used when unset.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            integration_branch: default_integration_branch(),
            base_branch: default_base_branch(),
            owner: String::new(),
            repo: String::new(),
            api_base: default_github_api(),
            missing_file_delay_ms: default_missing_file_delay_ms(),
            merge_poll_attempts: default_merge_poll_attempts(),
            merge_poll_interval_ms: default_merge_poll_interval_ms(),
            user_name: None,
            user_email: None,
        }
    }
}

/// Mailbox settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "default_gmail_api")]
    pub api_base: String,

    #[serde(default = "default_parsed_label")]
    pub parsed_label_id: String,

    #[serde(default = "default_published_label")]
    pub published_label_id: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base: default_gmail_api(),
            parsed_label_id: default_parsed_label(),
            published_label_id: default_published_label(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_generation_retries() -> usize {
    1
}

fn default_database_url() -> String {
    "sqlite://briefing.db".to_string()
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_posts_dir() -> PathBuf {
    PathBuf::from("_posts")
}

fn default_author() -> String {
    "AI".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_integration_branch() -> String {
    "develop".to_string()
}

fn default_base_branch() -> String {
    "master".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_missing_file_delay_ms() -> u64 {
    2_000
}

fn default_merge_poll_attempts() -> u32 {
    10
}

fn default_merge_poll_interval_ms() -> u64 {
    10_000
}

fn default_gmail_api() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_parsed_label() -> String {
    "PARSED".to_string()
}

fn default_published_label() -> String {
    "PUBLISHED".to_string()
}

fn default_newsletters() -> Vec<NewsletterSource> {
    vec![
        NewsletterSource {
            name: "TLDR".to_string(),
            address: "dan@tldrnewsletter.com".to_string(),
            category: Category::Ai,
            active: true,
        },
        NewsletterSource {
            name: "Ben's Bites".to_string(),
            address: "bensbites@substack.com".to_string(),
            category: Category::Ai,
            active: false,
        },
        NewsletterSource {
            name: "The Rundown".to_string(),
            address: "news@daily.therundown.ai".to_string(),
            category: Category::Ai,
            active: false,
        },
    ]
}

impl BriefingConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| BriefingError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (key, value) in [
            ("git.remote", &self.git.remote),
            ("git.integration_branch", &self.git.integration_branch),
            ("git.base_branch", &self.git.base_branch),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{key} must not be empty"));
            }
        }
        if self.git.integration_branch == self.git.base_branch {
            problems.push("git.integration_branch and git.base_branch must differ".to_string());
        }
        if self.git.merge_poll_attempts == 0 {
            problems.push("git.merge_poll_attempts must be at least 1".to_string());
        }
        if self.llm.max_tokens == 0 {
            problems.push("llm.max_tokens must be at least 1".to_string());
        }
        if self.llm.timeout_secs == 0 {
            problems.push("llm.timeout_secs must be at least 1".to_string());
        }
        for newsletter in &self.newsletters {
            if !is_plausible_address(&newsletter.address) {
                problems.push(format!(
                    "newsletter '{}' has malformed address '{}'",
                    newsletter.name, newsletter.address
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(BriefingError::Config(problems.join("; ")))
        }
    }

    pub fn publish_config(&self) -> PublishConfig {
        PublishConfig {
            remote: self.git.remote.clone(),
            integration_branch: self.git.integration_branch.clone(),
            base_branch: self.git.base_branch.clone(),
            missing_file_delay: Duration::from_millis(self.git.missing_file_delay_ms),
            merge_poll_attempts: self.git.merge_poll_attempts,
            merge_poll_interval: Duration::from_millis(self.git.merge_poll_interval_ms),
            ..PublishConfig::default()
        }
    }

    pub fn gmail_labels(&self) -> GmailLabels {
        GmailLabels {
            parsed: self.feed.parsed_label_id.clone(),
            published: self.feed.published_label_id.clone(),
        }
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            author: self.blog.author.clone(),
            image: self.blog.image.clone(),
            mood: self.mood,
        }
    }

    /// Categories with at least one active newsletter, in canonical order.
    pub fn active_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.newsletters.iter().any(|n| n.active && n.category == *c))
            .collect()
    }
}

fn is_plausible_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.chars().any(char::is_whitespace)
}
