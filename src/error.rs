//! Error taxonomy for the RAG core.
//!
//! Every failure a chat request can hit is one of these variants. The HTTP
//! layer maps `InvalidQuery` to `400` and everything else to `500`.
use thiserror::Error;

use crate::embedder::EmbedderError;

/// Errors raised by the index, retriever, composer and service.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("index build failed: {0}")]
    IndexBuild(String),

    #[error("index load failed: {0}")]
    IndexLoad(String),

    #[error("index contains no documents")]
    IndexEmpty,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("completion failed: {0}")]
    Completion(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience result alias for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
