use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use briefing_types::{BriefingError, Result};

/// The host's view of whether a review request can be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mergeability {
    Clean,
    /// The request conflicts with its base.
    Dirty,
    /// Not yet computed, or blocked for a reason that may clear up.
    Pending { state: String },
}

impl Mergeability {
    pub fn from_state(state: &str) -> Self {
        match state {
            "clean" => Mergeability::Clean,
            "dirty" => Mergeability::Dirty,
            other => Mergeability::Pending {
                state: other.to_string(),
            },
        }
    }
}

/// The review-request operations of a version-control host.
#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// An open request from `head` into `base`, if there is one.
    async fn find_open_request(&self, head: &str, base: &str) -> Result<Option<u64>>;

    async fn open_request(&self, head: &str, base: &str, title: &str, body: &str) -> Result<u64>;

    async fn mergeability(&self, number: u64) -> Result<Mergeability>;

    async fn merge(&self, number: u64, commit_message: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GitHub REST
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PullRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Pull {
    number: u64,
    head: PullRef,
    base: PullRef,
    #[serde(default)]
    mergeable_state: Option<String>,
}

/// [`ReviewHost`] over the GitHub pull-request API.
#[derive(Debug)]
pub struct GitHubHost {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    api_base: String,
}

impl GitHubHost {
    pub fn new(token: String, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            owner: owner.into(),
            repo: repo.into(),
            api_base: "https://api.github.com".to_string(),
        }
    }

    /// Read the token from `GH_TOKEN`.
    pub fn from_env(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let token = std::env::var("GH_TOKEN")
            .map_err(|_| BriefingError::Config("GH_TOKEN is not set".into()))?;
        Ok(Self::new(token, owner, repo))
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    fn pulls_url(&self) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_base, self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "briefing")
    }

    async fn send(&self, stage: &str, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| BriefingError::publication(stage, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error(stage, status, &body))
    }
}

fn map_error(stage: &str, status: reqwest::StatusCode, body: &str) -> BriefingError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string());
    BriefingError::publication(stage, format!("GitHub returned HTTP {}: {message}", status.as_u16()))
}

#[async_trait]
impl ReviewHost for GitHubHost {
    async fn find_open_request(&self, head: &str, base: &str) -> Result<Option<u64>> {
        let response = self
            .send(
                "review_request",
                self.request(reqwest::Method::GET, self.pulls_url())
                    .query(&[("state", "open"), ("base", base), ("per_page", "100")]),
            )
            .await?;

        let pulls: Vec<Pull> = response
            .json()
            .await
            .map_err(|e| BriefingError::publication("review_request", e))?;

        Ok(pulls
            .into_iter()
            .find(|p| p.head.name == head && p.base.name == base)
            .map(|p| p.number))
    }

    async fn open_request(&self, head: &str, base: &str, title: &str, body: &str) -> Result<u64> {
        let response = self
            .send(
                "review_request",
                self.request(reqwest::Method::POST, self.pulls_url()).json(&json!({
                    "title": title,
                    "head": head,
                    "base": base,
                    "body": body,
                })),
            )
            .await?;

        let pull: Pull = response
            .json()
            .await
            .map_err(|e| BriefingError::publication("review_request", e))?;
        tracing::info!(pr = pull.number, head, base, "opened review request");
        Ok(pull.number)
    }

    async fn mergeability(&self, number: u64) -> Result<Mergeability> {
        let response = self
            .send(
                "merge",
                self.request(reqwest::Method::GET, format!("{}/{number}", self.pulls_url())),
            )
            .await?;

        let pull: Pull = response
            .json()
            .await
            .map_err(|e| BriefingError::publication("merge", e))?;
        Ok(Mergeability::from_state(
            pull.mergeable_state.as_deref().unwrap_or("unknown"),
        ))
    }

    async fn merge(&self, number: u64, commit_message: &str) -> Result<()> {
        self.send(
            "merge",
            self.request(
                reqwest::Method::PUT,
                format!("{}/{number}/merge", self.pulls_url()),
            )
            .json(&json!({ "commit_message": commit_message })),
        )
        .await?;
        Ok(())
    }
}
