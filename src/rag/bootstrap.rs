//! Startup routine that guarantees a queryable index before serving.
//!
//! Probe the configured directory, load the snapshot if one exists, and
//! otherwise embed the seed corpus and persist it. Everything here blocks;
//! async callers run it through `spawn_blocking`.
use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::IndexConfig;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::index::store::{self, IndexLocation};
use crate::index::{Document, VectorIndex, corpus_fingerprint};

/// Documents indexed on first start when no seed corpus file is configured.
pub fn seed_documents() -> Vec<Document> {
    vec![
        Document::new("This is a sample document about AI development."),
        Document::new("Another document about cloud computing."),
    ]
}

/// Read a seed corpus: a JSON array of `{"content": ..., "metadata": {...}}`.
pub fn load_seed_corpus(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        RagError::IndexBuild(format!("cannot read seed corpus {}: {e}", path.display()))
    })?;
    let documents: Vec<Document> = serde_json::from_str(&raw).map_err(|e| {
        RagError::IndexBuild(format!("invalid seed corpus {}: {e}", path.display()))
    })?;
    if documents.is_empty() {
        return Err(RagError::IndexBuild(format!(
            "seed corpus {} contains no documents",
            path.display()
        )));
    }
    Ok(documents)
}

fn corpus(config: &IndexConfig) -> Result<Vec<Document>> {
    match &config.seed_corpus {
        Some(path) => load_seed_corpus(Path::new(path)),
        None => Ok(seed_documents()),
    }
}

/// Load the persisted index, or build and save a fresh one.
///
/// A snapshot that fails to load, or that was built from a different corpus
/// than the one configured now, is replaced. If the corpus cannot be read,
/// a loadable snapshot is kept. A failed save is logged and the built index
/// is still returned, so the next start rebuilds it.
pub fn ensure_index(config: &IndexConfig, embedder: &dyn Embedder) -> Result<VectorIndex> {
    let dir = Path::new(&config.path);
    let documents = corpus(config);

    match store::probe(dir) {
        IndexLocation::Present(path) => match store::load(dir, embedder) {
            Ok(index) => match &documents {
                Ok(docs) if corpus_fingerprint(docs) != index.corpus_fingerprint() => {
                    warn!(path = %path.display(), "Seed corpus changed since the index was built, rebuilding");
                }
                Ok(_) => {
                    info!(
                        path = %path.display(),
                        documents = index.len(),
                        "Loaded existing vector index"
                    );
                    return Ok(index);
                }
                Err(e) => {
                    warn!(error = %e, "Seed corpus unreadable, keeping existing index");
                    return Ok(index);
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Existing index unusable, rebuilding");
            }
        },
        IndexLocation::Absent(path) => {
            info!(path = %path.display(), "No vector index found, building");
        }
    }

    let index = VectorIndex::build(documents?, embedder)?;
    if let Err(e) = store::save(&index, dir) {
        error!(error = %e, "Failed to persist vector index; serving in-memory copy");
    }
    Ok(index)
}
