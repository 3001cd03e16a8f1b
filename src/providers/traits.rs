//! Provider trait definitions for the assistant backend
//!
//! The chat endpoint forwards a prompt to a third-party generative-language
//! API and returns the generated text. Each backend implements
//! `AssistantProvider` so handlers never depend on a concrete client.

use async_trait::async_trait;
use thiserror::Error;

/// Provider error types
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A single-shot text generation backend
#[async_trait]
pub trait AssistantProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &'static str;

    /// Model identifier in use
    fn model(&self) -> &str;

    /// Generate a reply for one prompt; no conversation state is kept
    async fn generate(&self, prompt: &str) -> ProviderResult<String>;
}
