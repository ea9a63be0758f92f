use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use briefing_types::BriefingError;

use crate::{DynProvider, ProviderAdapter, Request, Response};

/// Hard cutoff applied to every generation call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

pub trait Middleware: Send + Sync {
    fn before(&self, _request: &mut Request) {}
    fn after(&self, _request: &Request, _response: &mut Response) {}
}

// ---------------------------------------------------------------------------
// Built-in middleware: LoggingMiddleware
// ---------------------------------------------------------------------------

pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn before(&self, request: &mut Request) {
        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        tracing::info!(
            model = %request.model,
            messages = request.messages.len(),
            prompt_chars,
            "LLM request"
        );
    }

    fn after(&self, _request: &Request, response: &mut Response) {
        tracing::info!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            finish = ?response.finish_reason,
            "LLM response"
        );
    }
}

// ---------------------------------------------------------------------------
// Built-in middleware: UsageTrackingMiddleware
// ---------------------------------------------------------------------------

/// Accumulates token usage across calls. Clones share the same counters.
#[derive(Clone, Default)]
pub struct UsageTrackingMiddleware {
    total_input: Arc<AtomicU64>,
    total_output: Arc<AtomicU64>,
    calls: Arc<AtomicU64>,
}

impl UsageTrackingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.total_input.load(Ordering::Relaxed)
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.total_output.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Middleware for UsageTrackingMiddleware {
    fn after(&self, _request: &Request, response: &mut Response) {
        self.total_input
            .fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.total_output
            .fetch_add(response.usage.output_tokens, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// LlmClient
// ---------------------------------------------------------------------------

pub struct LlmClient {
    providers: HashMap<String, DynProvider>,
    default_provider: Option<String>,
    middleware: Vec<Box<dyn Middleware>>,
    timeout: Duration,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            middleware: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Register a provider. The first one registered serves requests that
    /// do not name a provider.
    pub fn register_provider(&mut self, provider: impl ProviderAdapter + 'static) {
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, DynProvider::new(provider));
    }

    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(m));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn complete(&self, request: &Request) -> Result<Response, BriefingError> {
        let provider = self.resolve_provider(request)?;
        let mut req = request.clone();

        for m in &self.middleware {
            m.before(&mut req);
        }

        let mut resp = match tokio::time::timeout(self.timeout, provider.complete(&req)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    provider = provider.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "LLM request timed out"
                );
                return Err(BriefingError::RequestTimeout {
                    provider: provider.name().to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        for m in &self.middleware {
            m.after(&req, &mut resp);
        }

        Ok(resp)
    }

    fn resolve_provider(&self, request: &Request) -> Result<&DynProvider, BriefingError> {
        if let Some(ref provider_name) = request.provider {
            return self.providers.get(provider_name).ok_or_else(|| {
                BriefingError::Config(format!("Provider '{}' not registered", provider_name))
            });
        }

        self.default_provider
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .ok_or_else(|| BriefingError::Config("No providers registered".to_string()))
    }

    /// Create from environment variables (detect available API keys).
    pub fn from_env() -> Result<Self, BriefingError> {
        let mut client = Self::new();

        match crate::OpenAiAdapter::from_env() {
            Ok(adapter) => client.register_provider(adapter),
            Err(_) => {
                return Err(BriefingError::Config(
                    "No LLM provider API keys found in environment (set OPENAI_API_KEY)"
                        .to_string(),
                ))
            }
        }

        Ok(client)
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
