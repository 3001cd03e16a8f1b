//! Assistant provider integration
//!
//! Forwards chat prompts to a generative-language API through a
//! rate-limited HTTP client.

pub mod traits;
pub mod http_client;
pub mod gemini;

pub use traits::{AssistantProvider, ProviderError};
#[cfg(test)]
pub use traits::ProviderResult;
pub use gemini::GeminiProvider;
