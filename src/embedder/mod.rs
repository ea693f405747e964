/// Embedder trait and shared types for text embedding.
///
/// Two implementations exist: [`onnx::OnnxEmbedder`] runs the
/// all-MiniLM-L6-v2 sentence model locally, [`hashing::HashingEmbedder`]
/// is a dependency-free lexical embedder for offline runs and tests.
pub mod download;
pub mod hashing;
pub mod onnx;
pub mod tokenizer;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::EmbedderConfig;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("input too long: {tokens} tokens exceeds the limit of {max}")]
    InputTooLong { tokens: usize, max: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`. Calls may block (model inference) and must not be made
/// directly on an async worker thread.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    ///
    /// The empty string yields a defined vector. Input above the model's
    /// length limit fails with [`EmbedderError::InputTooLong`].
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the model, stored alongside persisted vectors.
    fn name(&self) -> &str;
}

/// Construct the embedder selected by `config.provider`.
///
/// For the ONNX provider this may download model files, which blocks;
/// call it from a blocking context.
pub fn from_config(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>, EmbedderError> {
    if config.dimensions == 0 {
        return Err(EmbedderError::ModelLoadFailed(
            "embedding dimensions must be greater than 0".to_string(),
        ));
    }

    match config.provider.as_str() {
        "hashing" => {
            info!(dimensions = config.dimensions, "Using hashing embedder");
            Ok(Arc::new(hashing::HashingEmbedder::new(
                config.dimensions,
                config.max_input_tokens,
            )))
        }
        "onnx" => {
            let model_dir = Path::new(&config.model_dir);
            if config.auto_download {
                download::download_model_files(model_dir)
                    .map_err(|e| EmbedderError::ModelLoadFailed(format!("{e:#}")))?;
            }
            let embedder = onnx::OnnxEmbedder::new(
                model_dir,
                &config.model_name,
                config.dimensions,
                config.max_input_tokens,
            )?;
            Ok(Arc::new(embedder))
        }
        other => Err(EmbedderError::ModelLoadFailed(format!(
            "unknown embedder provider: {other}"
        ))),
    }
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return;
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    for v in vec.iter_mut() {
        *v *= inv_norm;
    }
}
