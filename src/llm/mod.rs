//! LLM backends used by the crew.

mod ollama;

pub use ollama::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend could not be reached at all.
    #[error("LLM backend unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Model '{0}' is not available on the backend")]
    ModelNotFound(String),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from LLM backend: {0}")]
    InvalidResponse(String),

    #[error("LLM request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// A chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Name of the model behind this client, for logs.
    fn model(&self) -> &str;

    /// Send a system prompt and a user prompt, return the reply text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Check the backend is up and serves the configured model.
    async fn health_check(&self) -> Result<()>;
}
