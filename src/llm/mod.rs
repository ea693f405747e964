//! Language-model completion.
//!
//! [`LanguageModel`] is the seam the answer composer calls through;
//! [`gemini::GeminiModel`] is the production implementation.
pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a completion backend.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model returned no text")]
    EmptyResponse,
}

/// A text-completion capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
