//! GroundQA LLM: completion providers for knowledge-graph-grounded answering.
//!
//! The pipeline treats the language model as an opaque request/response
//! service. This crate owns that boundary:
//!
//! - [`LLMProvider`]: the single async completion seam every stage calls
//! - [`UnifiedClient`]: HTTP clients for Gemini, OpenAI, Anthropic and local
//!   OpenAI-compatible servers, selected from [`LLMConfig`]
//! - [`MockProvider`]: scripted in-process double for tests
//!
//! A missing credential is reported by [`LLMConfig::from_lookup`] as
//! [`ConfigError::NoProviderConfigured`]; callers treat it as fatal at startup.

pub mod llm;
pub mod providers;

use std::sync::Arc;

pub use llm::providers::{
    parse_timeout_secs, ConfigError, LLMConfig, Provider, UnifiedClient,
    DEFAULT_LLM_TIMEOUT_SECS,
};
pub use llm::{
    CompletionRequest, CompletionResponse, FinishReason, LLMError, LLMProvider, Message, Role,
    Usage,
};
pub use providers::{MockProvider, MockReply};

/// Build a shareable provider from configuration.
pub fn create_provider(config: LLMConfig) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    Ok(Arc::new(UnifiedClient::from_config(config)?))
}
