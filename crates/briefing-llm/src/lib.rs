//! Generative-service client for Briefing.
//!
//! Provides the `ProviderAdapter` trait, `DynProvider` wrapper, a middleware
//! chain, and `LlmClient`, which routes requests by provider and enforces a
//! hard timeout on every call.

mod client;
mod openai;
mod provider;
mod types;

pub use client::*;
pub use openai::OpenAiAdapter;
pub use provider::*;
pub use types::*;
