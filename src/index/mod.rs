//! In-memory vector index with cosine-similarity search.
//!
//! The index is built once (from a corpus or a persisted snapshot) and is
//! read-only afterwards, so it can be shared through `Arc` and searched
//! concurrently without locking.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::error::{RagError, Result};

pub mod store;

/// Scalar metadata value attached to a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A unit of retrievable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A search hit paired with its cosine similarity.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct IndexEntry {
    pub(crate) document: Document,
    pub(crate) vector: Vec<f32>,
}

/// Documents and their embeddings, in insertion order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    embedder_name: String,
    corpus_fingerprint: String,
}

/// Hex SHA-256 over the documents' content and metadata, in order.
///
/// Two corpora with the same fingerprint produce the same index for a given
/// embedder.
pub fn corpus_fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        let metadata = serde_json::to_vec(&doc.metadata).unwrap_or_default();
        hasher.update((doc.content.len() as u64).to_le_bytes());
        hasher.update(doc.content.as_bytes());
        hasher.update((metadata.len() as u64).to_le_bytes());
        hasher.update(&metadata);
    }
    format!("{:x}", hasher.finalize())
}

impl VectorIndex {
    /// Embed every document and construct a ready-to-query index.
    pub fn build(documents: Vec<Document>, embedder: &dyn Embedder) -> Result<Self> {
        if documents.is_empty() {
            return Err(RagError::IndexBuild("no documents to index".to_string()));
        }

        let dimensions = embedder.dimensions();
        let corpus_fingerprint = corpus_fingerprint(&documents);
        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| RagError::IndexBuild(format!("embedding failed: {e}")))?;

        if vectors.len() != documents.len() {
            return Err(RagError::IndexBuild(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let mut entries = Vec::with_capacity(documents.len());
        for (position, (document, vector)) in documents.into_iter().zip(vectors).enumerate() {
            if vector.len() != dimensions {
                return Err(RagError::IndexBuild(format!(
                    "document {position} embedded to {} dimensions, expected {dimensions}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(RagError::IndexBuild(format!(
                    "document {position} embedded to a non-finite vector"
                )));
            }
            entries.push(IndexEntry { document, vector });
        }

        info!(
            documents = entries.len(),
            dimensions,
            embedder = embedder.name(),
            "Built vector index"
        );

        Ok(Self {
            entries,
            dimensions,
            embedder_name: embedder.name().to_string(),
            corpus_fingerprint,
        })
    }

    /// Reassemble an index from persisted parts. Callers validate the
    /// vectors first.
    pub(crate) fn from_entries(
        entries: Vec<IndexEntry>,
        dimensions: usize,
        embedder_name: String,
        corpus_fingerprint: String,
    ) -> Self {
        Self {
            entries,
            dimensions,
            embedder_name,
            corpus_fingerprint,
        }
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Name of the embedder whose vectors this index holds.
    #[must_use]
    pub fn embedder_name(&self) -> &str {
        &self.embedder_name
    }

    /// [`corpus_fingerprint`] of the documents this index was built from.
    #[must_use]
    pub fn corpus_fingerprint(&self) -> &str {
        &self.corpus_fingerprint
    }

    /// Return the `k` documents most similar to `query`, most similar first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Document>> {
        Ok(self
            .search_scored(query, k)?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    /// Like [`search`](Self::search), with the cosine similarity of each hit.
    ///
    /// Equal scores keep insertion order.
    pub fn search_scored(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if self.entries.is_empty() {
            return Err(RagError::IndexEmpty);
        }
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.vector, query)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!(k, hits = scored.len(), "search complete");

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredDocument {
                document: self.entries[i].document.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude or the result is not
/// finite. Never returns -0.0, so a zero score always ties with another.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity + 0.0
    } else {
        0.0
    }
}
