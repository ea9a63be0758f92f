//! The Briefing publication pipeline.
//!
//! This crate drives newsletters from the source feed to a merged blog post:
//! the artifact generator and its category templates, the renderer, the
//! orchestrator with its rollback contract, retry and event plumbing, and the
//! TOML configuration that wires it all together.

pub mod config;
pub mod events;
pub mod generator;
pub mod orchestrator;
pub mod render;
pub mod retry;
pub mod templates;

pub use config::{BlogConfig, BriefingConfig, FeedConfig, GitConfig, LlmConfig, StoreConfig};
pub use events::{EventEmitter, RunEvent};
pub use generator::{count_words, parse_response, ArtifactGenerator, GeneratorSettings, ParsedResponse};
pub use orchestrator::{BatchOutcome, Orchestrator, RunOptions};
pub use render::{render_document, Renderer};
pub use retry::{execute_with_retry, BackoffPolicy};
pub use templates::{build_prompt, format_document, template_for, CategoryTemplate};
