//! Shared types, errors, and lifecycle rules for the Briefing publication pipeline.
//!
//! This crate provides the foundational types used across all other Briefing crates:
//! - `BriefingError`: unified error taxonomy, with `GenerationError` for model output
//! - `Category`, `Period`, `Mood`: closed sets that partition and flavour each run
//! - `SourceDocument`, `StoredDocument`: newsletter emails before and after recording
//! - `GeneratedArtifact`, `PersistedArtifact`, `ArtifactStatus`: blog posts and their lifecycle
//! - `CategoryOutcome`, `RunReport`: what a run reports back per category

mod artifact;
mod category;
mod document;
mod outcome;

pub use artifact::*;
pub use category::*;
pub use document::*;
pub use outcome::*;

/// Failure modes of a single generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Generative service returned an empty response")]
    EmptyResponse,

    #[error("Generated response is not a mapping: {message}")]
    MalformedStructure { message: String },

    #[error("Generated response is missing required field '{field}'")]
    MissingField { field: String },

    #[error("Generative service call failed: {message}")]
    Service { message: String, retryable: bool },
}

/// Unified error type for all Briefing subsystems.
#[derive(Debug, thiserror::Error)]
pub enum BriefingError {
    // === Source feed ===
    #[error("Fetching source documents failed: {message}")]
    Fetch { message: String },

    // === Generation ===
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    // === Generative provider ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    // === Identity & state store ===
    #[error("Persistence failed during {operation}: {message}")]
    Persistence { operation: String, message: String },

    #[error("Artifact {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: ArtifactStatus,
        to: ArtifactStatus,
    },

    // === Rendering ===
    #[error("Rendering '{path}' failed: {message}")]
    Render { path: String, message: String },

    // === Publication ===
    #[error("Publication failed at {stage}: {message}")]
    Publication { stage: String, message: String },

    // === Generic ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl BriefingError {
    /// Shorthand for a persistence failure tagged with the store operation.
    pub fn persistence(operation: impl Into<String>, message: impl ToString) -> Self {
        BriefingError::Persistence {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a publication failure tagged with the workflow stage.
    pub fn publication(stage: impl Into<String>, message: impl ToString) -> Self {
        BriefingError::Publication {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BriefingError::RateLimited { .. }
                | BriefingError::RequestTimeout { .. }
                | BriefingError::ProviderError {
                    retryable: true,
                    ..
                }
                | BriefingError::Generation(GenerationError::Service {
                    retryable: true,
                    ..
                })
        )
    }

    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BriefingError::AuthError { .. }
                | BriefingError::Config(_)
                | BriefingError::InvalidTransition { .. }
        )
    }

    /// The pipeline stage an error belongs to, used as the `stage` field in logs
    /// and category outcomes.
    pub fn stage(&self) -> &'static str {
        match self {
            BriefingError::Fetch { .. } => "fetch",
            BriefingError::Generation(_)
            | BriefingError::ProviderError { .. }
            | BriefingError::RateLimited { .. }
            | BriefingError::AuthError { .. }
            | BriefingError::RequestTimeout { .. } => "generate",
            BriefingError::Persistence { .. } | BriefingError::InvalidTransition { .. } => {
                "persist"
            }
            BriefingError::Render { .. } => "render",
            BriefingError::Publication { .. } => "publish",
            BriefingError::Config(_) => "config",
            BriefingError::Io(_) | BriefingError::Json(_) | BriefingError::Other(_) => "internal",
        }
    }
}

/// A convenience alias for `Result<T, BriefingError>`.
pub type Result<T> = std::result::Result<T, BriefingError>;
