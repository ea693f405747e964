use std::sync::Arc;

use tracing::debug;

use crate::embedder::Embedder;
use crate::error::Result;
use crate::index::{Document, VectorIndex};

/// Turns a query string into the `k` most relevant documents.
///
/// Every call embeds the query afresh; nothing is cached between calls.
/// Embedding blocks, so async callers run this on the blocking pool.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { index, embedder, k }
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed(query)?;
        let documents = self.index.search(&query_vector, self.k)?;
        debug!(k = self.k, hits = documents.len(), "retrieved documents");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::hashing::HashingEmbedder;
    use crate::error::RagError;

    fn retriever(k: usize) -> Retriever {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let docs = vec![
            Document::new("AI development basics"),
            Document::new("cloud computing overview"),
            Document::new("AI assistants for customer support"),
        ];
        let index = VectorIndex::build(docs, embedder.as_ref()).unwrap();
        Retriever::new(Arc::new(index), embedder, k)
    }

    #[test]
    fn test_retrieve_ranks_matching_document_first() {
        let docs = retriever(4).retrieve("Tell me about AI").unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs[0].content.contains("AI"));
        assert_eq!(docs[2].content, "cloud computing overview");
    }

    #[test]
    fn test_retrieve_respects_k() {
        let docs = retriever(1).retrieve("cloud").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "cloud computing overview");
    }

    #[test]
    fn test_retrieve_propagates_embedding_error() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(384, 2));
        let index = VectorIndex::build(vec![Document::new("short")], embedder.as_ref()).unwrap();
        let retriever = Retriever::new(Arc::new(index), embedder, 4);

        let err = retriever.retrieve("far too many words here").unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
